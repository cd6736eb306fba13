//! The bus client: builds an operation's pipe and runs it.

use std::sync::Arc;

use parking_lot::RwLock;
use tokio_util::sync::CancellationToken;
use warren_config::{MessageType, QueueDeclaration};
use warren_pipe::keys::{CLIENT_CONFIGURATION, MESSAGE_TYPE, QUEUE_DECLARATION};
use warren_pipe::{Middleware, PipeBuilder, PipeContext, Result, StageMarker};

use crate::pipes;
use crate::services::OperationServices;

/// Entry point for running messaging operations.
///
/// Every [`invoke`](Self::invoke) builds a fresh pipe from the caller's pipe
/// action plus the staged middleware registered on the client, runs it on
/// a new [`PipeContext`] and hands the context back.
pub struct BusClient {
    services: OperationServices,
    staged: RwLock<Vec<(StageMarker, Arc<dyn Middleware>)>>,
}

impl BusClient {
    pub fn new(services: OperationServices) -> Self {
        Self {
            services,
            staged: RwLock::new(Vec::new()),
        }
    }

    pub fn services(&self) -> &OperationServices {
        &self.services
    }

    /// Splice `middleware` after `marker` in every pipe built from now on.
    pub fn register_staged(&self, marker: StageMarker, middleware: impl Middleware + 'static) {
        tracing::debug!(stage = %marker, middleware = middleware.name(), "Registered staged middleware");
        self.staged.write().push((marker, Arc::new(middleware)));
    }

    /// Build and run one operation.
    ///
    /// `context_action` runs after the context is seeded with the
    /// `ClientConfiguration`, before the first step.
    pub async fn invoke<P, C>(
        &self,
        pipe_action: P,
        context_action: C,
        token: &CancellationToken,
    ) -> Result<PipeContext>
    where
        P: FnOnce(&mut PipeBuilder, &OperationServices),
        C: FnOnce(&mut PipeContext),
    {
        let mut builder = PipeBuilder::new();
        pipe_action(&mut builder, &self.services);
        for (marker, middleware) in self.staged.read().iter() {
            builder.use_staged(*marker, Arc::clone(middleware));
        }
        let pipe = builder.build();
        tracing::debug!(steps = ?pipe.names(), "Invoking pipe");

        let mut context = PipeContext::new();
        context.try_add(CLIENT_CONFIGURATION, self.services.client_configuration());
        context_action(&mut context);

        pipe.invoke(&mut context, token).await?;
        Ok(context)
    }

    /// Declare `declaration` on the broker.
    pub async fn declare_queue(
        &self,
        declaration: QueueDeclaration,
        token: &CancellationToken,
    ) -> Result<PipeContext> {
        self.invoke(
            pipes::declare_queue,
            |ctx| {
                ctx.try_add(QUEUE_DECLARATION, declaration);
            },
            token,
        )
        .await
    }

    /// Declare the conventional queue of `message_type`.
    pub async fn declare_queue_for(
        &self,
        message_type: MessageType,
        token: &CancellationToken,
    ) -> Result<PipeContext> {
        self.invoke(
            pipes::declare_queue,
            |ctx| {
                ctx.try_add(MESSAGE_TYPE, message_type);
            },
            token,
        )
        .await
    }

    /// Release channels and the connection.
    pub fn dispose(&self) {
        self.services.channel_factory().dispose();
    }
}

impl std::fmt::Debug for BusClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BusClient")
            .field("services", &self.services)
            .field("staged", &self.staged.read().len())
            .finish()
    }
}
