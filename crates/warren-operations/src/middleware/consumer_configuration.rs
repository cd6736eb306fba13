//! Resolves the consumer configuration of a consuming operation.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use warren_config::{
    ConsumerConfiguration, ConsumerConfigurationBuilder, ConsumerConfigurationFactory, MessageType,
};
use warren_pipe::keys::{
    CONSUME_CONFIGURATION, CONSUMER_CONFIGURATION, EXCHANGE_DECLARATION, MESSAGE_TYPE,
    QUEUE_DECLARATION, ROUTING_KEY,
};
use warren_pipe::{Middleware, Next, PipeContext, PipeError, Result, configuration_action};

use super::{ContextFn, context_fn};

#[derive(Clone, Default)]
pub struct ConsumerConfigurationOptions {
    /// Defaults to the name in `QueueDeclaration`.
    pub queue_fn: Option<ContextFn<Option<String>>>,
    /// Defaults to the name in `ExchangeDeclaration`.
    pub exchange_fn: Option<ContextFn<Option<String>>>,
    /// Defaults to `RoutingKey`.
    pub routing_key_fn: Option<ContextFn<Option<String>>>,
    /// Defaults to `MessageType`.
    pub message_type_fn: Option<ContextFn<Option<MessageType>>>,
}

/// Produces the `ConsumerConfiguration` and the entries derived from it.
///
/// Resolution prefers the message type; otherwise a queue name is required
/// and exchange and routing key default to empty.
pub struct ConsumerConfigurationMiddleware {
    factory: Arc<dyn ConsumerConfigurationFactory>,
    queue_fn: ContextFn<Option<String>>,
    exchange_fn: ContextFn<Option<String>>,
    routing_key_fn: ContextFn<Option<String>>,
    message_type_fn: ContextFn<Option<MessageType>>,
}

impl ConsumerConfigurationMiddleware {
    pub fn new(
        factory: Arc<dyn ConsumerConfigurationFactory>,
        options: ConsumerConfigurationOptions,
    ) -> Self {
        Self {
            factory,
            queue_fn: options.queue_fn.unwrap_or_else(|| {
                context_fn(|ctx| ctx.get_ref(QUEUE_DECLARATION).map(|q| q.name.clone()))
            }),
            exchange_fn: options.exchange_fn.unwrap_or_else(|| {
                context_fn(|ctx| ctx.get_ref(EXCHANGE_DECLARATION).map(|e| e.name.clone()))
            }),
            routing_key_fn: options
                .routing_key_fn
                .unwrap_or_else(|| context_fn(|ctx| ctx.get(ROUTING_KEY))),
            message_type_fn: options
                .message_type_fn
                .unwrap_or_else(|| context_fn(|ctx| ctx.get(MESSAGE_TYPE))),
        }
    }

    fn resolve(&self, context: &PipeContext) -> Option<ConsumerConfiguration> {
        if let Some(message_type) = (self.message_type_fn)(context) {
            if let Some(config) = self.factory.consumer_for_type(&message_type) {
                return Some(config);
            }
        }
        let queue = (self.queue_fn)(context)?;
        let exchange = (self.exchange_fn)(context).unwrap_or_default();
        let routing_key = (self.routing_key_fn)(context).unwrap_or_default();
        self.factory.consumer_for(&queue, &exchange, &routing_key)
    }
}

#[async_trait]
impl Middleware for ConsumerConfigurationMiddleware {
    async fn invoke(
        &self,
        context: &mut PipeContext,
        next: Next<'_>,
        token: &CancellationToken,
    ) -> Result<()> {
        let Some(mut config) = self.resolve(context) else {
            tracing::warn!("Unable to find ConsumerConfiguration from message type or parameters");
            return Err(PipeError::configuration_missing(
                "ConsumerConfiguration: no message type or queue name in context",
            ));
        };

        if let Some(action) = context.get(configuration_action::<ConsumerConfigurationBuilder>()) {
            tracing::debug!("Custom consumer configuration supplied, applying");
            let mut builder = ConsumerConfigurationBuilder::new(config);
            action(&mut builder);
            config = builder.build();
        }

        context.try_add(CONSUME_CONFIGURATION, config.consume.clone());
        context.try_add(QUEUE_DECLARATION, config.queue.clone());
        if let Some(exchange) = config.exchange.clone() {
            context.try_add(EXCHANGE_DECLARATION, exchange);
        }
        context.try_add(CONSUMER_CONFIGURATION, config);

        next.run(context, token).await
    }
}
