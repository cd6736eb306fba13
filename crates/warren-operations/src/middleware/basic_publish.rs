use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use warren_pipe::keys::{BASIC_PROPERTIES, BASIC_PUBLISH_CONFIGURATION, CHANNEL, SERIALIZED_MESSAGE};
use warren_pipe::{Middleware, Next, PipeContext, PipeError, Result};

/// Publishes `SerializedMessage` with the `BasicPublishConfiguration`.
///
/// `BasicProperties` in the context replace the configured properties, so
/// steps between configuration and publish can still amend headers.
#[derive(Debug, Default)]
pub struct BasicPublishMiddleware;

#[async_trait]
impl Middleware for BasicPublishMiddleware {
    async fn invoke(
        &self,
        context: &mut PipeContext,
        next: Next<'_>,
        token: &CancellationToken,
    ) -> Result<()> {
        let mut publish = context.get_or_err(BASIC_PUBLISH_CONFIGURATION)?;
        if let Some(properties) = context.get(BASIC_PROPERTIES) {
            publish.basic_properties = properties;
        }
        let channel = context.get_or_err(CHANNEL)?;

        {
            let body = context.get_ref(SERIALIZED_MESSAGE).ok_or_else(|| {
                PipeError::configuration_missing(SERIALIZED_MESSAGE.name())
            })?;
            channel.basic_publish(&publish, body).await?;
            tracing::debug!(
                exchange = %publish.exchange_name,
                routing_key = %publish.routing_key,
                bytes = body.len(),
                "Published message"
            );
        }

        next.run(context, token).await
    }
}
