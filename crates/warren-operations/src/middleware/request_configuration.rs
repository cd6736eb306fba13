//! Resolves the configuration of a request operation.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use warren_config::{MessageType, RequestConfigurationBuilder, RequestConfigurationFactory};
use warren_pipe::keys::{
    CONSUME_CONFIGURATION, CONSUMER_CONFIGURATION, PUBLISHER_CONFIGURATION,
    REQUEST_CONFIGURATION, REQUEST_MESSAGE_TYPE, RESPONSE_MESSAGE_TYPE,
};
use warren_pipe::{Middleware, Next, PipeContext, PipeError, Result, configuration_action};

use super::{ContextFn, context_fn};

#[derive(Clone, Default)]
pub struct RequestConfigurationOptions {
    /// Defaults to `RequestMessageType`.
    pub request_type_fn: Option<ContextFn<Option<MessageType>>>,
    /// Defaults to `ResponseMessageType`.
    pub response_type_fn: Option<ContextFn<Option<MessageType>>>,
}

/// Produces the `RequestConfiguration`, and from it the publisher side
/// (`PublisherConfiguration`) and the response consumer side
/// (`ConsumerConfiguration`, `ConsumeConfiguration`).
pub struct RequestConfigurationMiddleware {
    factory: Arc<dyn RequestConfigurationFactory>,
    request_type_fn: ContextFn<Option<MessageType>>,
    response_type_fn: ContextFn<Option<MessageType>>,
}

impl RequestConfigurationMiddleware {
    pub fn new(
        factory: Arc<dyn RequestConfigurationFactory>,
        options: RequestConfigurationOptions,
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
impl Middleware for RequestConfigurationMiddleware {
    async fn invoke(
        &self,
        context: &mut PipeContext,
        next: Next<'_>,
        token: &CancellationToken,
    ) -> Result<()> {
        let request_type = (self.request_type_fn)(context)
            .ok_or_else(|| PipeError::configuration_missing(REQUEST_MESSAGE_TYPE.name()))?;
        let response_type = (self.response_type_fn)(context)
            .ok_or_else(|| PipeError::configuration_missing(RESPONSE_MESSAGE_TYPE.name()))?;

        let mut config = self
            .factory
            .request_for_types(&request_type, &response_type)
            .ok_or_else(|| {
                PipeError::configuration_missing(format!(
                    "RequestConfiguration for {request_type} -> {response_type}"
                ))
            })?;

        if let Some(action) = context.get(configuration_action::<RequestConfigurationBuilder>()) {
            tracing::debug!("Custom request configuration supplied, applying");
            let mut builder = RequestConfigurationBuilder::new(config);
            action(&mut builder);
            config = builder.build();
        }

        context.try_add(PUBLISHER_CONFIGURATION, config.request.clone());
        context.try_add(CONSUMER_CONFIGURATION, config.response.clone());
        context.try_add(CONSUME_CONFIGURATION, config.response.consume.clone());
        context.try_add(REQUEST_CONFIGURATION, config);

        next.run(context, token).await
    }
}
