//! Messaging operations for warren.
//!
//! This crate supplies the middleware that turns the generic pipeline of
//! `warren-pipe` into concrete operations, and the [`BusClient`] that
//! builds and runs them:
//!
//! - configuration steps that merge factory defaults with a caller's
//!   configuration action (publish, consume, request, respond, queue)
//! - broker steps that obtain a channel and declare, publish or acknowledge
//! - the explicit acknowledgement step, aware of channel recovery
//! - state machine retrieval
//! - global execution id enrichment, spliced in through stage markers
//!
//! Preset chains for each operation live in [`pipes`].

pub mod client;
pub mod middleware;
pub mod pipes;
pub mod services;
pub mod state_machine;

pub use client::BusClient;
pub use services::OperationServices;
pub use state_machine::{
    InMemoryActivator, SharedStateMachine, StateMachine, StateMachineActivator, StateMachineType,
};
