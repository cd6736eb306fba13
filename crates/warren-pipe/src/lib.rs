//! Middleware pipeline for warren messaging operations.
//!
//! Every operation (publish, subscribe, request, respond, declare, state
//! machine) is an ordered chain of [`Middleware`] sharing one
//! [`PipeContext`]. Each step reads and writes well-known context entries
//! (see [`keys`]) and either calls the next step, returns early, or fails.
//!
//! ```text
//! PipeBuilder ──build──► Pipe [A ─► B ─► C ─► ...]
//!                              │     │     │
//!                              ▼     ▼     ▼
//!                           PipeContext (typed key/value bag)
//! ```
//!
//! Cross-cutting steps are spliced into a base chain through
//! [`StageMarker`]s: a middleware registered for a stage runs right after
//! the last step of the base chain that carries that marker.

pub mod acknowledgement;
pub mod builder;
pub mod context;
pub mod error;
pub mod handler;
pub mod keys;
pub mod middleware;

pub use acknowledgement::Acknowledgement;
pub use builder::{Pipe, PipeBuilder};
pub use context::PipeContext;
pub use error::{PipeError, Result};
pub use handler::{HandlerFuture, MessageHandler, message_handler};
pub use keys::{ConfigurationAction, Message, PipeKey, configuration_action};
pub use middleware::{Middleware, Next, StageMarker, StageMarkerMiddleware};
