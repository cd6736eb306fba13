//! Explicit acknowledgement of a handled delivery.
//!
//! ```text
//! auto ack ───────────────────────────────────────────────▶ next
//! channel closed ─┬─ recoverable ─▶ wait for recovery ─▶ (Ack) next
//!                 └─ otherwise ───▶ ChannelAvailability
//! channel open ───▶ ack / nack / reject ─▶ abort? ─┬─ yes ─▶ stop
//!                                                  └─ no ──▶ next
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use warren_channel::{BrokerChannel, ChannelError, Delivery};
use warren_pipe::keys::{
    CHANNEL, CONSUME_CONFIGURATION, CONSUMER, DELIVERY_EVENT_ARGS, MESSAGE_ACKNOWLEDGEMENT,
};
use warren_pipe::{Acknowledgement, Middleware, Next, PipeContext, PipeError, Result};

use super::{ContextFn, context_fn};

/// Decides whether the chain stops after the given outcome was sent.
pub type AbortPredicate = Arc<dyn Fn(&Acknowledgement) -> bool + Send + Sync>;

#[derive(Clone, Default)]
pub struct ExplicitAckOptions {
    /// Defaults to `auto_ack` of the `ConsumeConfiguration`.
    pub auto_ack_fn: Option<ContextFn<Option<bool>>>,
    /// Defaults to `MessageAcknowledgement`.
    pub acknowledgement_fn: Option<ContextFn<Option<Acknowledgement>>>,
    /// Defaults to `DeliveryEventArgs`.
    pub delivery_fn: Option<ContextFn<Option<Delivery>>>,
    /// Defaults to the channel of `Consumer`, then `Channel`.
    pub channel_fn: Option<ContextFn<Option<Arc<dyn BrokerChannel>>>>,
    /// Defaults to stopping on anything but `Ack`.
    pub abort_execution: Option<AbortPredicate>,
}

pub struct ExplicitAckMiddleware {
    auto_ack_fn: ContextFn<Option<bool>>,
    acknowledgement_fn: ContextFn<Option<Acknowledgement>>,
    delivery_fn: ContextFn<Option<Delivery>>,
    channel_fn: ContextFn<Option<Arc<dyn BrokerChannel>>>,
    abort_execution: AbortPredicate,
}

impl ExplicitAckMiddleware {
    pub fn new(options: ExplicitAckOptions) -> Self {
        Self {
            auto_ack_fn: options.auto_ack_fn.unwrap_or_else(|| {
                context_fn(|ctx| ctx.get_ref(CONSUME_CONFIGURATION).map(|c| c.auto_ack))
            }),
            acknowledgement_fn: options
                .acknowledgement_fn
                .unwrap_or_else(|| context_fn(|ctx| ctx.get(MESSAGE_ACKNOWLEDGEMENT))),
            delivery_fn: options
                .delivery_fn
                .unwrap_or_else(|| context_fn(|ctx| ctx.get(DELIVERY_EVENT_ARGS))),
            channel_fn: options.channel_fn.unwrap_or_else(|| {
                context_fn(|ctx| {
                    ctx.get_ref(CONSUMER)
                        .map(|consumer| consumer.channel.clone())
                        .or_else(|| ctx.get(CHANNEL))
                })
            }),
            abort_execution: options
                .abort_execution
                .unwrap_or_else(|| Arc::new(|ack: &Acknowledgement| !ack.is_ack())),
        }
    }

    /// Send `acknowledgement` for `delivery` and return the effective outcome.
    async fn acknowledge(
        &self,
        channel: &dyn BrokerChannel,
        delivery: &Delivery,
        acknowledgement: Acknowledgement,
        token: &CancellationToken,
    ) -> Result<Acknowledgement> {
        if !channel.is_open() {
            let Some(recovery) = channel.recovery() else {
                tracing::warn!(
                    delivery_tag = delivery.delivery_tag,
                    channel = channel.channel_number(),
                    "Channel closed and not recoverable, unable to acknowledge"
                );
                return Err(ChannelError::availability(format!(
                    "channel {} is closed and does not recover",
                    channel.channel_number()
                ))
                .into());
            };

            let listener = recovery.subscribe();
            if !channel.is_open() {
                tracing::info!(
                    delivery_tag = delivery.delivery_tag,
                    channel = channel.channel_number(),
                    "Channel closed, waiting for recovery; message will be redelivered"
                );
                listener.wait(token).await?;
            }
            return Ok(Acknowledgement::Ack);
        }

        let tag = delivery.delivery_tag;
        match acknowledgement {
            Acknowledgement::Ack => channel.basic_ack(tag, false).await?,
            Acknowledgement::Nack { requeue } => channel.basic_nack(tag, false, requeue).await?,
            Acknowledgement::Reject { requeue } => channel.basic_reject(tag, requeue).await?,
        }
        tracing::debug!(delivery_tag = tag, %acknowledgement, "Acknowledged delivery");
        Ok(acknowledgement)
    }
}

#[async_trait]
impl Middleware for ExplicitAckMiddleware {
    async fn invoke(
        &self,
        context: &mut PipeContext,
        next: Next<'_>,
        token: &CancellationToken,
    ) -> Result<()> {
        let auto_ack = (self.auto_ack_fn)(context)
            .ok_or_else(|| PipeError::configuration_missing(CONSUME_CONFIGURATION.name()))?;
        if auto_ack {
            tracing::trace!("Auto ack enabled, skipping explicit acknowledgement");
            return next.run(context, token).await;
        }

        let acknowledgement = (self.acknowledgement_fn)(context).ok_or_else(|| {
            PipeError::unsupported_acknowledgement("no acknowledgement produced by the handler")
        })?;
        let delivery = (self.delivery_fn)(context)
            .ok_or_else(|| PipeError::configuration_missing(DELIVERY_EVENT_ARGS.name()))?;
        let channel = (self.channel_fn)(context)
            .ok_or_else(|| PipeError::configuration_missing(CHANNEL.name()))?;

        let outcome = self
            .acknowledge(channel.as_ref(), &delivery, acknowledgement, token)
            .await?;

        if (self.abort_execution)(&outcome) {
            tracing::debug!(
                delivery_tag = delivery.delivery_tag,
                %outcome,
                "Aborting execution after acknowledgement"
            );
            return Ok(());
        }
        next.run(context, token).await
    }
}
