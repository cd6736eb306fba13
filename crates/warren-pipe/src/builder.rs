//! Building and running middleware chains.

use std::collections::HashMap;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::context::PipeContext;
use crate::error::Result;
use crate::middleware::{Middleware, Next, StageMarker, StageMarkerMiddleware};

/// Declarative list of steps for one operation.
///
/// Base steps run in the order they were added. Steps registered with
/// [`use_staged`](Self::use_staged) are spliced in right after the last base
/// step carrying their marker, in registration order. A staged step whose
/// marker never appears is left out.
#[derive(Default, Clone)]
pub struct PipeBuilder {
    base: Vec<Arc<dyn Middleware>>,
    staged: Vec<(StageMarker, Arc<dyn Middleware>)>,
}

impl PipeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a base step.
    pub fn use_middleware(&mut self, middleware: impl Middleware + 'static) -> &mut Self {
        self.base.push(Arc::new(middleware));
        self
    }

    /// Append an already shared base step.
    pub fn use_shared(&mut self, middleware: Arc<dyn Middleware>) -> &mut Self {
        self.base.push(middleware);
        self
    }

    /// Append a pass-through step carrying `marker`.
    pub fn use_stage(&mut self, marker: StageMarker) -> &mut Self {
        self.use_middleware(StageMarkerMiddleware::new(marker))
    }

    /// Register a cross-cutting step to run after `marker`.
    pub fn use_staged(&mut self, marker: StageMarker, middleware: Arc<dyn Middleware>) -> &mut Self {
        self.staged.push((marker, middleware));
        self
    }

    /// Resolve stage insertions into an immutable [`Pipe`].
    pub fn build(&self) -> Pipe {
        let mut last_with_marker: HashMap<StageMarker, usize> = HashMap::new();
        for (idx, middleware) in self.base.iter().enumerate() {
            if let Some(marker) = middleware.stage() {
                last_with_marker.insert(marker, idx);
            }
        }

        for (marker, middleware) in &self.staged {
            if !last_with_marker.contains_key(marker) {
                tracing::debug!(
                    stage = %marker,
                    middleware = middleware.name(),
                    "Stage not present in pipe, skipping staged middleware"
                );
            }
        }

        let mut chain = Vec::with_capacity(self.base.len() + self.staged.len());
        for (idx, middleware) in self.base.iter().enumerate() {
            chain.push(Arc::clone(middleware));
            let Some(marker) = middleware.stage() else {
                continue;
            };
            if last_with_marker.get(&marker) != Some(&idx) {
                continue;
            }
            chain.extend(
                self.staged
                    .iter()
                    .filter(|(staged_marker, _)| *staged_marker == marker)
                    .map(|(_, staged)| Arc::clone(staged)),
            );
        }

        Pipe {
            middleware: chain.into(),
        }
    }
}

/// An immutable chain of middleware, ready to run.
#[derive(Clone)]
pub struct Pipe {
    middleware: Arc<[Arc<dyn Middleware>]>,
}

impl Pipe {
    /// Run every step against `context`.
    pub async fn invoke(&self, context: &mut PipeContext, token: &CancellationToken) -> Result<()> {
        Next::new(&self.middleware).run(context, token).await
    }

    /// Step names in execution order.
    pub fn names(&self) -> Vec<&'static str> {
        self.middleware.iter().map(|m| m.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.middleware.len()
    }

    pub fn is_empty(&self) -> bool {
        self.middleware.is_empty()
    }
}

impl std::fmt::Debug for Pipe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PipeError;
    use async_trait::async_trait;
    use parking_lot::Mutex;

    /// Records its label into a shared trace and continues.
    struct Step {
        label: &'static str,
        stage: Option<StageMarker>,
        trace: Arc<Mutex<Vec<&'static str>>>,
    }

    #[async_trait]
    impl Middleware for Step {
        async fn invoke(
            &self,
            context: &mut PipeContext,
            next: Next<'_>,
            token: &CancellationToken,
        ) -> Result<()> {
            self.trace.lock().push(self.label);
            next.run(context, token).await
        }

        fn name(&self) -> &'static str {
            self.label
        }

        fn stage(&self) -> Option<StageMarker> {
            self.stage
        }
    }

    struct Stop;

    #[async_trait]
    impl Middleware for Stop {
        async fn invoke(&self, _: &mut PipeContext, _: Next<'_>, _: &CancellationToken) -> Result<()> {
            Ok(())
        }
    }

    struct Fail;

    #[async_trait]
    impl Middleware for Fail {
        async fn invoke(&self, _: &mut PipeContext, _: Next<'_>, _: &CancellationToken) -> Result<()> {
            Err(PipeError::middleware("Fail", "boom"))
        }
    }

    fn step(
        label: &'static str,
        stage: Option<StageMarker>,
        trace: &Arc<Mutex<Vec<&'static str>>>,
    ) -> Arc<dyn Middleware> {
        Arc::new(Step {
            label,
            stage,
            trace: trace.clone(),
        })
    }

    #[tokio::test]
    async fn test_base_order_is_kept() {
        let trace = Arc::new(Mutex::new(Vec::new()));
        let mut builder = PipeBuilder::new();
        builder
            .use_shared(step("a", None, &trace))
            .use_shared(step("b", None, &trace))
            .use_shared(step("c", None, &trace));

        let pipe = builder.build();
        pipe.invoke(&mut PipeContext::new(), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(*trace.lock(), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_staged_middleware_inserted_after_marker() {
        let trace = Arc::new(Mutex::new(Vec::new()));
        let mut builder = PipeBuilder::new();
        builder
            .use_shared(step("A", Some(StageMarker::ProducerInitialized), &trace))
            .use_shared(step("B", None, &trace))
            .use_staged(StageMarker::ProducerInitialized, step("M", None, &trace));

        assert_eq!(builder.build().names(), vec!["A", "M", "B"]);
    }

    #[test]
    fn test_staged_after_last_carrier_in_registration_order() {
        let trace = Arc::new(Mutex::new(Vec::new()));
        let mut builder = PipeBuilder::new();
        builder
            .use_shared(step("A", Some(StageMarker::MessageReceived), &trace))
            .use_shared(step("B", Some(StageMarker::MessageReceived), &trace))
            .use_shared(step("C", None, &trace))
            .use_staged(StageMarker::MessageReceived, step("M1", None, &trace))
            .use_staged(StageMarker::MessageReceived, step("M2", None, &trace));

        assert_eq!(builder.build().names(), vec!["A", "B", "M1", "M2", "C"]);
    }

    #[test]
    fn test_staged_without_marker_is_dropped() {
        let trace = Arc::new(Mutex::new(Vec::new()));
        let mut builder = PipeBuilder::new();
        builder
            .use_shared(step("A", None, &trace))
            .use_staged(StageMarker::HandlerInvoked, step("M", None, &trace));

        assert_eq!(builder.build().names(), vec!["A"]);
    }

    #[test]
    fn test_stage_marker_step() {
        let trace = Arc::new(Mutex::new(Vec::new()));
        let mut builder = PipeBuilder::new();
        builder
            .use_shared(step("A", None, &trace))
            .use_stage(StageMarker::ConsumeConfigured)
            .use_shared(step("B", None, &trace))
            .use_staged(StageMarker::ConsumeConfigured, step("M", None, &trace));

        assert_eq!(
            builder.build().names(),
            vec!["A", "StageMarkerMiddleware", "M", "B"]
        );
    }

    #[tokio::test]
    async fn test_short_circuit_skips_rest() {
        let trace = Arc::new(Mutex::new(Vec::new()));
        let mut builder = PipeBuilder::new();
        builder
            .use_shared(step("a", None, &trace))
            .use_middleware(Stop)
            .use_shared(step("b", None, &trace));

        builder
            .build()
            .invoke(&mut PipeContext::new(), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(*trace.lock(), vec!["a"]);
    }

    #[tokio::test]
    async fn test_failure_aborts_chain() {
        let trace = Arc::new(Mutex::new(Vec::new()));
        let mut builder = PipeBuilder::new();
        builder
            .use_middleware(Fail)
            .use_shared(step("b", None, &trace));

        let err = builder
            .build()
            .invoke(&mut PipeContext::new(), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, PipeError::Middleware { .. }));
        assert!(trace.lock().is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_token_stops_before_first_step() {
        let trace = Arc::new(Mutex::new(Vec::new()));
        let mut builder = PipeBuilder::new();
        builder.use_shared(step("a", None, &trace));

        let token = CancellationToken::new();
        token.cancel();
        let err = builder
            .build()
            .invoke(&mut PipeContext::new(), &token)
            .await
            .unwrap_err();
        assert!(err.is_cancelled());
        assert!(trace.lock().is_empty());
    }
}
