//! Operation middleware.
//!
//! Each middleware takes its collaborators and an options struct at
//! construction. Options hold optional closures that override how the step
//! reads its inputs from the context; `None` keeps the default lookup of the
//! well-known key.

use std::sync::Arc;

use warren_pipe::PipeContext;

pub mod basic_publish;
pub mod channel_creation;
pub mod consumer_configuration;
pub mod exchange_declare;
pub mod explicit_ack;
pub mod global_execution_id;
pub mod handler_invocation;
pub mod publish_configuration;
pub mod queue_declaration;
pub mod request_configuration;
pub mod respond_configuration;
pub mod retrieve_state_machine;

pub use basic_publish::BasicPublishMiddleware;
pub use channel_creation::{ChannelCreationMiddleware, ChannelCreationOptions};
pub use consumer_configuration::{ConsumerConfigurationMiddleware, ConsumerConfigurationOptions};
pub use exchange_declare::ExchangeDeclareMiddleware;
pub use explicit_ack::{ExplicitAckMiddleware, ExplicitAckOptions};
pub use global_execution_id::{
    AppendGlobalExecutionIdMiddleware, AppendGlobalExecutionIdOptions,
    ExecutionIdRoutingMiddleware, ExecutionIdRoutingOptions, WildcardRoutingKeyMiddleware,
    WildcardRoutingKeyOptions,
};
pub use handler_invocation::HandlerInvocationMiddleware;
pub use publish_configuration::{PublishConfigurationMiddleware, PublishConfigurationOptions};
pub use queue_declaration::{QueueDeclarationMiddleware, QueueDeclareMiddleware};
pub use request_configuration::{RequestConfigurationMiddleware, RequestConfigurationOptions};
pub use respond_configuration::{RespondConfigurationMiddleware, RespondConfigurationOptions};
pub use retrieve_state_machine::{RetrieveStateMachineMiddleware, RetrieveStateMachineOptions};

/// Reads a value out of the context.
pub type ContextFn<T> = Arc<dyn Fn(&PipeContext) -> T + Send + Sync>;

/// Box a closure as a [`ContextFn`].
pub fn context_fn<T>(f: impl Fn(&PipeContext) -> T + Send + Sync + 'static) -> ContextFn<T> {
    Arc::new(f)
}
