//! Resolves the state machine an operation works on.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;
use warren_pipe::{Middleware, Next, PipeContext, PipeError, Result};

use super::{ContextFn, context_fn};
use crate::state_machine::{
    MODEL_ID, STATE_MACHINE, STATE_MACHINE_TYPE, SharedStateMachine, StateMachineActivator,
    StateMachineType,
};

/// Observes the resolved state machine before the chain continues.
pub type PostExecuteFn = Arc<dyn Fn(&SharedStateMachine, &PipeContext) + Send + Sync>;

#[derive(Clone, Default)]
pub struct RetrieveStateMachineOptions {
    /// Defaults to `ModelId`, or a new id when absent.
    pub model_id_fn: Option<ContextFn<Uuid>>,
    /// Defaults to `StateMachineType`.
    pub state_machine_type_fn: Option<ContextFn<Option<StateMachineType>>>,
    /// Looked up before the activator is asked.
    pub state_machine_fn: Option<ContextFn<Option<SharedStateMachine>>>,
    pub post_execute: Option<PostExecuteFn>,
}

pub struct RetrieveStateMachineMiddleware {
    activator: Arc<dyn StateMachineActivator>,
    model_id_fn: ContextFn<Uuid>,
    state_machine_type_fn: ContextFn<Option<StateMachineType>>,
    state_machine_fn: Option<ContextFn<Option<SharedStateMachine>>>,
    post_execute: Option<PostExecuteFn>,
}

impl RetrieveStateMachineMiddleware {
    pub fn new(
        activator: Arc<dyn StateMachineActivator>,
        options: RetrieveStateMachineOptions,
    ) -> Self {
        Self {
            activator,
            model_id_fn: options
                .model_id_fn
                .unwrap_or_else(|| context_fn(|ctx| ctx.get(MODEL_ID).unwrap_or_else(Uuid::new_v4))),
            state_machine_type_fn: options
                .state_machine_type_fn
                .unwrap_or_else(|| context_fn(|ctx| ctx.get(STATE_MACHINE_TYPE))),
            state_machine_fn: options.state_machine_fn,
            post_execute: options.post_execute,
        }
    }

    async fn resolve(&self, context: &PipeContext) -> Result<SharedStateMachine> {
        if let Some(machine) = self.state_machine_fn.as_ref().and_then(|f| f(context)) {
            tracing::debug!(id = %machine.id(), "Using supplied state machine");
            return Ok(machine);
        }
        let id = (self.model_id_fn)(context);
        let state_machine_type = (self.state_machine_type_fn)(context)
            .ok_or_else(|| PipeError::configuration_missing(STATE_MACHINE_TYPE.name()))?;
        self.activator.activate(id, state_machine_type).await
    }
}

#[async_trait]
impl Middleware for RetrieveStateMachineMiddleware {
    async fn invoke(
        &self,
        context: &mut PipeContext,
        next: Next<'_>,
        token: &CancellationToken,
    ) -> Result<()> {
        let machine = self.resolve(context).await?;
        context.try_add(STATE_MACHINE, machine.clone());
        if let Some(post_execute) = &self.post_execute {
            post_execute(&machine, context);
        }
        next.run(context, token).await
    }
}

#[cfg(test)]
mod tests {
    use std::any::Any;

    use parking_lot::Mutex;

    use super::*;
    use crate::state_machine::{InMemoryActivator, StateMachine};

    struct Shipment {
        id: Uuid,
    }

    impl StateMachine for Shipment {
        fn id(&self) -> Uuid {
            self.id
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    fn activator() -> Arc<InMemoryActivator> {
        let activator = InMemoryActivator::new();
        activator.register(|id| Shipment { id });
        Arc::new(activator)
    }

    #[tokio::test]
    async fn test_activates_by_model_id_and_runs_hook() {
        let activator = activator();
        let observed = Arc::new(Mutex::new(None));
        let seen = observed.clone();
        let middleware = RetrieveStateMachineMiddleware::new(
            activator.clone(),
            RetrieveStateMachineOptions {
                post_execute: Some(Arc::new(
                    move |machine: &SharedStateMachine, _: &PipeContext| {
                        *seen.lock() = Some(machine.id());
                    },
                )),
                ..Default::default()
            },
        );
        let id = Uuid::new_v4();
        let mut context = PipeContext::new();
        context.try_add(MODEL_ID, id);
        context.try_add(STATE_MACHINE_TYPE, StateMachineType::of::<Shipment>());

        middleware
            .invoke(&mut context, Next::end(), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(context.get(STATE_MACHINE).unwrap().id(), id);
        assert_eq!(*observed.lock(), Some(id));
        assert!(activator.get(id).is_some());
    }

    #[tokio::test]
    async fn test_supplied_machine_skips_activator() {
        let activator = activator();
        let supplied: SharedStateMachine = Arc::new(Shipment { id: Uuid::new_v4() });
        let expected = supplied.id();
        let middleware = RetrieveStateMachineMiddleware::new(
            activator.clone(),
            RetrieveStateMachineOptions {
                state_machine_fn: Some(context_fn(move |_| Some(supplied.clone()))),
                ..Default::default()
            },
        );

        let mut context = PipeContext::new();
        middleware
            .invoke(&mut context, Next::end(), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(context.get(STATE_MACHINE).unwrap().id(), expected);
        assert_eq!(activator.instance_count(), 0);
    }

    #[tokio::test]
    async fn test_missing_type_fails() {
        let middleware = RetrieveStateMachineMiddleware::new(activator(), Default::default());
        let err = middleware
            .invoke(&mut PipeContext::new(), Next::end(), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, PipeError::ConfigurationMissing(_)));
    }
}
