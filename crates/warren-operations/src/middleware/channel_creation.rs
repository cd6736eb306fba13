use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use warren_channel::{BrokerChannel, ChannelFactory};
use warren_pipe::keys::CHANNEL;
use warren_pipe::{Middleware, Next, PipeContext, PipeKey, Result};

#[derive(Debug, Clone, Copy)]
pub struct ChannelCreationOptions {
    /// Where the channel is stored. Defaults to `Channel`.
    pub key: PipeKey<Arc<dyn BrokerChannel>>,
}

impl Default for ChannelCreationOptions {
    fn default() -> Self {
        Self { key: CHANNEL }
    }
}

/// Opens a channel unless one is already present under the configured key.
///
/// A channel opened here belongs to the operation: it is released once the
/// rest of the chain has run, whether or not it succeeded. A channel the
/// caller put in the context is left open.
pub struct ChannelCreationMiddleware {
    factory: Arc<ChannelFactory>,
    key: PipeKey<Arc<dyn BrokerChannel>>,
}

impl ChannelCreationMiddleware {
    pub fn new(factory: Arc<ChannelFactory>, options: ChannelCreationOptions) -> Self {
        Self {
            factory,
            key: options.key,
        }
    }
}

#[async_trait]
impl Middleware for ChannelCreationMiddleware {
    async fn invoke(
        &self,
        context: &mut PipeContext,
        next: Next<'_>,
        token: &CancellationToken,
    ) -> Result<()> {
        let created = if context.contains_key(self.key.name()) {
            tracing::trace!(key = self.key.name(), "Channel already in context");
            None
        } else {
            let channel = self.factory.create_channel(token).await?;
            context.try_add(self.key, Arc::clone(&channel));
            Some(channel)
        };

        let result = next.run(context, token).await;
        if let Some(channel) = created {
            self.factory.release(&channel);
        }
        result
    }
}
