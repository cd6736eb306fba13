//! Configuration model for warren messaging operations.
//!
//! Every messaging operation runs with a configuration that is produced by a
//! factory (usually derived from the message type through
//! [`NamingConventions`]) and then optionally adjusted by a caller-supplied
//! action operating on a builder:
//!
//! ```text
//! MessageType ──► ConfigurationFactory ──► default configuration
//!                                               │
//!                     caller action (optional) ─┤ builder
//!                                               ▼
//!                                      final configuration
//! ```
//!
//! The crate also holds [`ClientConfiguration`], the broker connection
//! settings shared by the whole client.

pub mod client;
pub mod consume;
pub mod error;
pub mod exchange;
pub mod factory;
pub mod message_type;
pub mod naming;
pub mod publish;
pub mod queue;
pub mod request;

pub use client::{ClientConfiguration, GeneralExchangeConfiguration, GeneralQueueConfiguration};
pub use consume::{
    ConsumeConfiguration, ConsumeConfigurationBuilder, ConsumerConfiguration,
    ConsumerConfigurationBuilder,
};
pub use error::{ConfigError, Result};
pub use exchange::{ExchangeDeclaration, ExchangeDeclarationBuilder, ExchangeType};
pub use factory::{
    ConsumerConfigurationFactory, ConventionConfigurationFactory, PublisherConfigurationFactory,
    QueueDeclarationFactory, RequestConfigurationFactory, RespondConfigurationFactory,
    DIRECT_REPLY_TO_QUEUE,
};
pub use message_type::MessageType;
pub use naming::NamingConventions;
pub use publish::{
    BasicProperties, BasicPublishConfiguration, BasicReturn, DeliveryMode,
    PublisherConfiguration, PublisherConfigurationBuilder, ReturnCallback,
};
pub use queue::{QueueDeclaration, QueueDeclarationBuilder};
pub use request::{RequestConfiguration, RequestConfigurationBuilder};
