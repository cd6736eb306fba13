use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use warren_pipe::keys::{
    DELIVERY_EVENT_ARGS, MESSAGE_ACKNOWLEDGEMENT, MESSAGE_HANDLER, MESSAGE_HANDLER_RESULT,
};
use warren_pipe::{Middleware, Next, PipeContext, Result};

/// Runs the `MessageHandler` on the delivery in `DeliveryEventArgs` and
/// records its acknowledgement.
#[derive(Debug, Default)]
pub struct HandlerInvocationMiddleware;

#[async_trait]
impl Middleware for HandlerInvocationMiddleware {
    async fn invoke(
        &self,
        context: &mut PipeContext,
        next: Next<'_>,
        token: &CancellationToken,
    ) -> Result<()> {
        let handler = context.get_or_err(MESSAGE_HANDLER)?;
        let delivery = context.get_or_err(DELIVERY_EVENT_ARGS)?;
        let delivery_tag = delivery.delivery_tag;

        let acknowledgement = handler(delivery).await;
        tracing::debug!(delivery_tag, %acknowledgement, "Message handler completed");

        context.try_add(MESSAGE_HANDLER_RESULT, acknowledgement);
        context.try_add(MESSAGE_ACKNOWLEDGEMENT, acknowledgement);
        next.run(context, token).await
    }
}
