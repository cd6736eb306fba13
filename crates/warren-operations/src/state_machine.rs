//! State machines (sagas) and their activation.
//!
//! A state machine is a long-lived, identity-keyed object holding the state
//! of a multi-step business process. Operations only resolve the instance
//! and place it in the context; handler logic mutates it through its own
//! interior mutability.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use uuid::Uuid;
use warren_pipe::{PipeError, PipeKey, Result};

/// A saga instance.
pub trait StateMachine: Send + Sync + 'static {
    fn id(&self) -> Uuid;

    /// Access to the concrete type.
    fn as_any(&self) -> &dyn Any;
}

/// A state machine as stored in the context and in activators.
pub type SharedStateMachine = Arc<dyn StateMachine>;

/// Identity of a state machine implementation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StateMachineType(&'static str);

impl StateMachineType {
    pub fn of<T: StateMachine>() -> Self {
        Self(std::any::type_name::<T>())
    }

    pub fn name(&self) -> &'static str {
        self.0
    }
}

impl fmt::Display for StateMachineType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

/// Identity of the state machine instance an operation works on.
pub const MODEL_ID: PipeKey<Uuid> = PipeKey::new("ModelId");
/// Implementation to activate when no instance exists yet.
pub const STATE_MACHINE_TYPE: PipeKey<StateMachineType> = PipeKey::new("StateMachineType");
/// The resolved instance.
pub const STATE_MACHINE: PipeKey<SharedStateMachine> = PipeKey::new("StateMachine");

/// Loads an existing state machine or creates a new one.
#[async_trait]
pub trait StateMachineActivator: Send + Sync {
    async fn activate(
        &self,
        id: Uuid,
        state_machine_type: StateMachineType,
    ) -> Result<SharedStateMachine>;
}

type Constructor = Arc<dyn Fn(Uuid) -> SharedStateMachine + Send + Sync>;

/// Keeps state machines in memory, creating them through registered constructors.
#[derive(Default)]
pub struct InMemoryActivator {
    constructors: RwLock<HashMap<StateMachineType, Constructor>>,
    instances: Mutex<HashMap<Uuid, (StateMachineType, SharedStateMachine)>>,
}

impl InMemoryActivator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register how to create a new `T` for a given id.
    pub fn register<T, F>(&self, constructor: F)
    where
        T: StateMachine,
        F: Fn(Uuid) -> T + Send + Sync + 'static,
    {
        let constructor: Constructor = Arc::new(move |id| Arc::new(constructor(id)));
        self.constructors
            .write()
            .insert(StateMachineType::of::<T>(), constructor);
    }

    pub fn get(&self, id: Uuid) -> Option<SharedStateMachine> {
        self.instances.lock().get(&id).map(|(_, machine)| machine.clone())
    }

    pub fn instance_count(&self) -> usize {
        self.instances.lock().len()
    }
}

#[async_trait]
impl StateMachineActivator for InMemoryActivator {
    async fn activate(
        &self,
        id: Uuid,
        state_machine_type: StateMachineType,
    ) -> Result<SharedStateMachine> {
        let mut instances = self.instances.lock();
        if let Some((existing_type, machine)) = instances.get(&id) {
            if *existing_type != state_machine_type {
                return Err(PipeError::activation(format!(
                    "state machine {id} is a {existing_type}, not a {state_machine_type}"
                )));
            }
            tracing::debug!(%id, state_machine = %state_machine_type, "Loaded existing state machine");
            return Ok(machine.clone());
        }

        let constructor = self
            .constructors
            .read()
            .get(&state_machine_type)
            .cloned()
            .ok_or_else(|| {
                PipeError::activation(format!(
                    "no state machine registered for type {state_machine_type}"
                ))
            })?;
        let machine = constructor(id);
        instances.insert(id, (state_machine_type, machine.clone()));
        tracing::debug!(%id, state_machine = %state_machine_type, "Created state machine");
        Ok(machine)
    }
}

impl fmt::Debug for InMemoryActivator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InMemoryActivator")
            .field("types", &self.constructors.read().len())
            .field("instances", &self.instance_count())
            .finish()
    }
}
