//! The property bag shared by the middleware of one operation.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;

use crate::error::{PipeError, Result};
use crate::keys::PipeKey;

/// Typed key/value bag created fresh for each operation invocation.
///
/// Values are stored under the key's name. Writes through
/// [`try_add`](Self::try_add) never overwrite: the first writer wins, so a
/// value placed by the caller or an earlier middleware is never replaced by
/// a later default. Reads that find a value of a different type behave as
/// if the entry were absent (and log a warning in debug builds).
#[derive(Default)]
pub struct PipeContext {
    properties: HashMap<&'static str, Box<dyn Any + Send + Sync>>,
}

impl PipeContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `value` unless the key is already present.
    ///
    /// Returns `false` (and drops `value`) if the key was present.
    pub fn try_add<T: Any + Send + Sync>(&mut self, key: PipeKey<T>, value: T) -> bool {
        match self.properties.entry(key.name()) {
            std::collections::hash_map::Entry::Occupied(_) => false,
            std::collections::hash_map::Entry::Vacant(slot) => {
                slot.insert(Box::new(value));
                true
            }
        }
    }

    /// Store `value`, replacing any existing entry. Returns `true` if one was replaced.
    pub fn add_or_replace<T: Any + Send + Sync>(&mut self, key: PipeKey<T>, value: T) -> bool {
        self.properties.insert(key.name(), Box::new(value)).is_some()
    }

    /// A clone of the stored value, if present with the expected type.
    pub fn get<T: Any + Clone>(&self, key: PipeKey<T>) -> Option<T> {
        self.get_ref(key).cloned()
    }

    /// The stored value, or `default` if absent or of a different type.
    pub fn get_or<T: Any + Clone>(&self, key: PipeKey<T>, default: T) -> T {
        self.get(key).unwrap_or(default)
    }

    /// The stored value, or [`PipeError::ConfigurationMissing`].
    pub fn get_or_err<T: Any + Clone>(&self, key: PipeKey<T>) -> Result<T> {
        self.get(key)
            .ok_or_else(|| PipeError::configuration_missing(key.name()))
    }

    pub fn get_ref<T: Any>(&self, key: PipeKey<T>) -> Option<&T> {
        let value = self.properties.get(key.name())?;
        let typed = (**value).downcast_ref::<T>();
        if typed.is_none() {
            warn_type_mismatch::<T>(key.name());
        }
        typed
    }

    pub fn get_mut<T: Any>(&mut self, key: PipeKey<T>) -> Option<&mut T> {
        let value = self.properties.get_mut(key.name())?;
        let typed = (**value).downcast_mut::<T>();
        if typed.is_none() {
            warn_type_mismatch::<T>(key.name());
        }
        typed
    }

    /// Remove and return the entry, if present with the expected type.
    ///
    /// An entry of a different type is left in place.
    pub fn remove<T: Any>(&mut self, key: PipeKey<T>) -> Option<T> {
        if self.get_ref(key).is_none() {
            return None;
        }
        let value = self.properties.remove(key.name())?;
        value.downcast::<T>().ok().map(|boxed| *boxed)
    }

    pub fn contains_key(&self, name: &str) -> bool {
        self.properties.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.properties.len()
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    /// Names of all entries, in no particular order.
    pub fn keys(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.properties.keys().copied()
    }
}

impl fmt::Debug for PipeContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<_> = self.keys().collect();
        keys.sort_unstable();
        f.debug_struct("PipeContext").field("keys", &keys).finish()
    }
}

#[cfg(debug_assertions)]
fn warn_type_mismatch<T>(key: &str) {
    tracing::warn!(
        key,
        expected = std::any::type_name::<T>(),
        "Context entry has a different type than requested"
    );
}

#[cfg(not(debug_assertions))]
fn warn_type_mismatch<T>(_key: &str) {}
