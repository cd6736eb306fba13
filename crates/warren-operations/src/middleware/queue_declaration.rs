//! Queue declaration: resolve the declaration, then declare it on a channel.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use warren_config::{QueueDeclarationBuilder, QueueDeclarationFactory};
use warren_pipe::keys::{CHANNEL, MESSAGE_TYPE, QUEUE_DECLARATION};
use warren_pipe::{Middleware, Next, PipeContext, PipeError, Result, configuration_action};

/// Puts the final `QueueDeclaration` in the context.
///
/// An existing declaration wins over one derived from `MessageType`. A
/// registered `ConfigurationAction<QueueDeclarationBuilder>` is applied
/// to whichever was found.
pub struct QueueDeclarationMiddleware {
    factory: Arc<dyn QueueDeclarationFactory>,
}

impl QueueDeclarationMiddleware {
    pub fn new(factory: Arc<dyn QueueDeclarationFactory>) -> Self {
        Self { factory }
    }
}

#[async_trait]
impl Middleware for QueueDeclarationMiddleware {
    async fn invoke(
        &self,
        context: &mut PipeContext,
        next: Next<'_>,
        token: &CancellationToken,
    ) -> Result<()> {
        let declaration = match context.get(QUEUE_DECLARATION) {
            Some(declaration) => Some(declaration),
            None => context
                .get_ref(MESSAGE_TYPE)
                .and_then(|message_type| self.factory.queue_for_type(message_type)),
        };
        let Some(mut declaration) = declaration else {
            return Err(PipeError::configuration_missing(QUEUE_DECLARATION.name()));
        };

        if let Some(action) = context.get(configuration_action::<QueueDeclarationBuilder>()) {
            let mut builder = QueueDeclarationBuilder::new(declaration);
            action(&mut builder);
            declaration = builder.build();
        }

        context.add_or_replace(QUEUE_DECLARATION, declaration);
        next.run(context, token).await
    }
}

/// Issues `queue.declare` for the `QueueDeclaration` in the context.
#[derive(Debug, Default)]
pub struct QueueDeclareMiddleware;

#[async_trait]
impl Middleware for QueueDeclareMiddleware {
    async fn invoke(
        &self,
        context: &mut PipeContext,
        next: Next<'_>,
        token: &CancellationToken,
    ) -> Result<()> {
        let declaration = context.get_or_err(QUEUE_DECLARATION)?;
        let channel = context.get_or_err(CHANNEL)?;

        channel.queue_declare(&declaration).await?;
        tracing::info!(
            queue = %declaration.name,
            durable = declaration.durable,
            channel = channel.channel_number(),
            "Declared queue"
        );

        next.run(context, token).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use warren_config::{
        ClientConfiguration, ConventionConfigurationFactory, MessageType, NamingConventions,
        QueueDeclaration,
    };

    fn middleware() -> QueueDeclarationMiddleware {
        let factory = ConventionConfigurationFactory::new(
            Arc::new(NamingConventions::with_application_name("test")),
            Arc::new(ClientConfiguration::default()),
        );
        QueueDeclarationMiddleware::new(Arc::new(factory))
    }

    #[tokio::test]
    async fn test_existing_declaration_wins() {
        let mut context = PipeContext::new();
        context.try_add(
            QUEUE_DECLARATION,
            QueueDeclaration {
                name: "explicit".into(),
                ..Default::default()
            },
        );
        context.try_add(MESSAGE_TYPE, MessageType::new("shop", "OrderPlaced"));

        middleware()
            .invoke(&mut context, Next::end(), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(context.get(QUEUE_DECLARATION).unwrap().name, "explicit");
    }

    #[tokio::test]
    async fn test_action_applied_to_derived_declaration() {
        let mut context = PipeContext::new();
        context.try_add(MESSAGE_TYPE, MessageType::new("shop", "OrderPlaced"));
        let action: warren_pipe::ConfigurationAction<QueueDeclarationBuilder> =
            Arc::new(|builder: &mut QueueDeclarationBuilder| {
                builder.with_auto_delete(true);
            });
        context.try_add(configuration_action(), action);

        middleware()
            .invoke(&mut context, Next::end(), &CancellationToken::new())
            .await
            .unwrap();

        let declaration = context.get(QUEUE_DECLARATION).unwrap();
        assert_eq!(declaration.name, "orderplaced");
        assert!(declaration.auto_delete);
    }

    #[tokio::test]
    async fn test_nothing_to_declare() {
        let err = middleware()
            .invoke(&mut PipeContext::new(), Next::end(), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, PipeError::ConfigurationMissing(_)));
    }
}
