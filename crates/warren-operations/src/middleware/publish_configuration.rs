//! Resolves the publisher configuration of a publish operation.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use warren_config::{
    MessageType, PublisherConfiguration, PublisherConfigurationBuilder,
    PublisherConfigurationFactory,
};
use warren_pipe::keys::{
    BASIC_PROPERTIES, BASIC_PUBLISH_CONFIGURATION, EXCHANGE_DECLARATION, MESSAGE_TYPE,
    PUBLISHER_CONFIGURATION, RETURN_CALLBACK, ROUTING_KEY,
};
use warren_pipe::{Middleware, Next, PipeContext, PipeError, Result, configuration_action};

use super::{ContextFn, context_fn};

#[derive(Clone, Default)]
pub struct PublishConfigurationOptions {
    /// Defaults to the name in `ExchangeDeclaration`.
    pub exchange_fn: Option<ContextFn<Option<String>>>,
    /// Defaults to `RoutingKey`.
    pub routing_key_fn: Option<ContextFn<Option<String>>>,
    /// Defaults to `MessageType`.
    pub message_type_fn: Option<ContextFn<Option<MessageType>>>,
}

/// Produces the `PublisherConfiguration` and the entries derived from it.
///
/// The default configuration comes from the factory, by message type when
/// one is known, otherwise from an explicit routing key (and optional
/// exchange, empty meaning the default exchange). A
/// `ConfigurationAction<PublisherConfigurationBuilder>` in the context is
/// applied on top.
pub struct PublishConfigurationMiddleware {
    factory: Arc<dyn PublisherConfigurationFactory>,
    exchange_fn: ContextFn<Option<String>>,
    routing_key_fn: ContextFn<Option<String>>,
    message_type_fn: ContextFn<Option<MessageType>>,
}

impl PublishConfigurationMiddleware {
    pub fn new(
        factory: Arc<dyn PublisherConfigurationFactory>,
        options: PublishConfigurationOptions,
    ) -> Self {
        Self {
            factory,
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

    fn from_message_type(&self, context: &PipeContext) -> Option<PublisherConfiguration> {
        let message_type = (self.message_type_fn)(context)?;
        self.factory.publisher_for_type(&message_type)
    }

    fn from_strings(&self, context: &PipeContext) -> Option<PublisherConfiguration> {
        let routing_key = (self.routing_key_fn)(context)?;
        let exchange = (self.exchange_fn)(context).unwrap_or_default();
        self.factory.publisher_for(&exchange, &routing_key)
    }
}

#[async_trait]
impl Middleware for PublishConfigurationMiddleware {
    async fn invoke(
        &self,
        context: &mut PipeContext,
        next: Next<'_>,
        token: &CancellationToken,
    ) -> Result<()> {
        let Some(mut config) = self
            .from_message_type(context)
            .or_else(|| self.from_strings(context))
        else {
            tracing::warn!("Unable to find PublisherConfiguration from message type or parameters");
            return Err(PipeError::configuration_missing(
                "PublisherConfiguration: no message type or routing key in context",
            ));
        };

        if let Some(action) = context.get(configuration_action::<PublisherConfigurationBuilder>()) {
            tracing::debug!("Custom publisher configuration supplied, applying");
            let mut builder = PublisherConfigurationBuilder::new(config);
            action(&mut builder);
            config = builder.build();
        }

        context.try_add(BASIC_PUBLISH_CONFIGURATION, config.basic_publish());
        if let Some(exchange) = config.exchange.clone() {
            context.try_add(EXCHANGE_DECLARATION, exchange);
        }
        context.try_add(BASIC_PROPERTIES, config.basic_properties.clone());
        if let Some(callback) = config.return_callback.clone() {
            context.try_add(RETURN_CALLBACK, callback);
        }
        context.try_add(PUBLISHER_CONFIGURATION, config);

        next.run(context, token).await
    }
}
