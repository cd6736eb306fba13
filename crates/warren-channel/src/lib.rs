//! Broker connection and channel lifecycle for warren.
//!
//! A [`ChannelFactory`] owns the single broker connection of a client and
//! hands out channels multiplexed over it. When the connection drops and the
//! underlying client supports automatic recovery, channel requests suspend
//! until the broker link is re-established instead of failing:
//!
//! ```text
//! create_channel ──► connection open? ──yes──► new channel
//!                          │ no
//!                          ▼
//!              closed by application? ──yes──► ChannelAvailability
//!                          │ no
//!                          ▼
//!                   recoverable? ──no──► ChannelAvailability
//!                          │ yes
//!                          ▼
//!               wait for RecoveryEvent (cancellable)
//! ```
//!
//! The broker protocol itself lives behind the [`BrokerConnection`] and
//! [`BrokerChannel`] traits. Enable the `testing` feature for an in-memory
//! implementation that records every channel call.

pub mod broker;
pub mod error;
pub mod factory;
pub mod recovery;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use broker::{
    BasicConsumer, BrokerChannel, BrokerConnection, CloseReason, ConnectionFactory, Delivery,
    ShutdownInitiator,
};
pub use error::{ChannelError, Result};
pub use factory::ChannelFactory;
pub use recovery::{RecoveryEvent, RecoveryListener};
