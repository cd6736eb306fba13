//! The middleware contract and the continuation passed to each step.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::context::PipeContext;
use crate::error::{PipeError, Result};

/// Named insertion points in a base chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StageMarker {
    Initialized,
    ProducerInitialized,
    PublishConfigured,
    MessagePublished,
    ConsumeConfigured,
    QueueDeclared,
    MessageReceived,
    HandlerInvoked,
    MessageAcknowledged,
}

impl fmt::Display for StageMarker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// One step of an operation.
///
/// A step either does its work and calls `next.run(..)`, returns without
/// calling it (ending the chain early), or returns an error (aborting it).
#[async_trait]
pub trait Middleware: Send + Sync {
    async fn invoke(
        &self,
        context: &mut PipeContext,
        next: Next<'_>,
        token: &CancellationToken,
    ) -> Result<()>;

    /// Short name used in logs.
    fn name(&self) -> &'static str {
        let full = std::any::type_name::<Self>();
        full.rsplit("::").next().unwrap_or(full)
    }

    /// The stage this step marks, if any.
    fn stage(&self) -> Option<StageMarker> {
        None
    }
}

/// The remainder of the chain after the current step.
pub struct Next<'a> {
    remaining: &'a [Arc<dyn Middleware>],
}

impl<'a> Next<'a> {
    pub(crate) fn new(remaining: &'a [Arc<dyn Middleware>]) -> Self {
        Self { remaining }
    }

    /// A continuation that does nothing. Useful for invoking a single step.
    pub fn end() -> Self {
        Self { remaining: &[] }
    }

    pub fn is_end(&self) -> bool {
        self.remaining.is_empty()
    }

    /// Run the rest of the chain.
    ///
    /// Cancellation is checked before every step.
    pub async fn run(self, context: &mut PipeContext, token: &CancellationToken) -> Result<()> {
        let Some((current, rest)) = self.remaining.split_first() else {
            return Ok(());
        };
        if token.is_cancelled() {
            tracing::debug!(middleware = current.name(), "Operation cancelled");
            return Err(PipeError::Cancelled);
        }
        tracing::trace!(middleware = current.name(), "Invoking middleware");
        current.invoke(context, Next::new(rest), token).await
    }
}

/// Carries a [`StageMarker`] in a base chain and otherwise does nothing.
#[derive(Debug, Clone, Copy)]
pub struct StageMarkerMiddleware {
    marker: StageMarker,
}

impl StageMarkerMiddleware {
    pub fn new(marker: StageMarker) -> Self {
        Self { marker }
    }
}

#[async_trait]
impl Middleware for StageMarkerMiddleware {
    async fn invoke(
        &self,
        context: &mut PipeContext,
        next: Next<'_>,
        token: &CancellationToken,
    ) -> Result<()> {
        next.run(context, token).await
    }

    fn stage(&self) -> Option<StageMarker> {
        Some(self.marker)
    }
}
