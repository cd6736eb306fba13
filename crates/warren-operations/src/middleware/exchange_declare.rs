use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use warren_pipe::keys::{CHANNEL, EXCHANGE_DECLARATION};
use warren_pipe::{Middleware, Next, PipeContext, Result};

/// Issues `exchange.declare` for the `ExchangeDeclaration` in the context.
///
/// Absent declarations and the default exchange are skipped.
#[derive(Debug, Default)]
pub struct ExchangeDeclareMiddleware;

#[async_trait]
impl Middleware for ExchangeDeclareMiddleware {
    async fn invoke(
        &self,
        context: &mut PipeContext,
        next: Next<'_>,
        token: &CancellationToken,
    ) -> Result<()> {
        match context.get(EXCHANGE_DECLARATION) {
            Some(declaration) if !declaration.is_default() => {
                let channel = context.get_or_err(CHANNEL)?;
                channel.exchange_declare(&declaration).await?;
                tracing::debug!(
                    exchange = %declaration.name,
                    exchange_type = %declaration.exchange_type,
                    "Declared exchange"
                );
            }
            _ => tracing::trace!("No exchange to declare"),
        }
        next.run(context, token).await
    }
}
