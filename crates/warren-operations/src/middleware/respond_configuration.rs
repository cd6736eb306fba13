//! Resolves the configuration of a respond operation.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use warren_config::{ConsumerConfigurationBuilder, MessageType, RespondConfigurationFactory};
use warren_pipe::keys::{
    CONSUME_CONFIGURATION, CONSUMER_CONFIGURATION, EXCHANGE_DECLARATION, QUEUE_DECLARATION,
    REQUEST_MESSAGE_TYPE, RESPONSE_MESSAGE_TYPE,
};
use warren_pipe::{Middleware, Next, PipeContext, PipeError, Result, configuration_action};

use super::{ContextFn, context_fn};

#[derive(Clone, Default)]
pub struct RespondConfigurationOptions {
    /// Defaults to `RequestMessageType`.
    pub request_type_fn: Option<ContextFn<Option<MessageType>>>,
    /// Defaults to `ResponseMessageType`.
    pub response_type_fn: Option<ContextFn<Option<MessageType>>>,
}

/// Produces the consumer configuration a responder listens with.
///
/// Both the request and the response type must be known, even though the
/// queue is derived from the request type only.
pub struct RespondConfigurationMiddleware {
    factory: Arc<dyn RespondConfigurationFactory>,
    request_type_fn: ContextFn<Option<MessageType>>,
    response_type_fn: ContextFn<Option<MessageType>>,
}

impl RespondConfigurationMiddleware {
    pub fn new(
        factory: Arc<dyn RespondConfigurationFactory>,
        options: RespondConfigurationOptions,
    ) -> Self {
        Self {
            factory,
            request_type_fn: options
                .request_type_fn
                .unwrap_or_else(|| context_fn(|ctx| ctx.get(REQUEST_MESSAGE_TYPE))),
            response_type_fn: options
                .response_type_fn
                .unwrap_or_else(|| context_fn(|ctx| ctx.get(RESPONSE_MESSAGE_TYPE))),
        }
    }
}

#[async_trait]
impl Middleware for RespondConfigurationMiddleware {
    async fn invoke(
        &self,
        context: &mut PipeContext,
        next: Next<'_>,
        token: &CancellationToken,
    ) -> Result<()> {
        let request_type = (self.request_type_fn)(context)
            .ok_or_else(|| PipeError::configuration_missing(REQUEST_MESSAGE_TYPE.name()))?;
        if (self.response_type_fn)(context).is_none() {
            return Err(PipeError::configuration_missing(RESPONSE_MESSAGE_TYPE.name()));
        }

        let mut config = self.factory.respond_for_type(&request_type).ok_or_else(|| {
            PipeError::configuration_missing(format!("respond configuration for {request_type}"))
        })?;

        if let Some(action) = context.get(configuration_action::<ConsumerConfigurationBuilder>()) {
            tracing::debug!("Custom respond configuration supplied, applying");
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
