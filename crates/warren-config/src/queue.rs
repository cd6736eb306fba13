//! Queue declarations.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::client::GeneralQueueConfiguration;

const MESSAGE_TTL: &str = "x-message-ttl";
const DEAD_LETTER_EXCHANGE: &str = "x-dead-letter-exchange";
const MAX_PRIORITY: &str = "x-max-priority";

/// Parameters for a `queue.declare` call.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueDeclaration {
    pub name: String,
    pub durable: bool,
    pub exclusive: bool,
    pub auto_delete: bool,
    pub arguments: BTreeMap<String, serde_json::Value>,
}

impl QueueDeclaration {
    /// Declaration seeded from the client-wide queue defaults.
    pub fn from_general(name: impl Into<String>, general: &GeneralQueueConfiguration) -> Self {
        Self {
            name: name.into(),
            durable: general.durable,
            exclusive: general.exclusive,
            auto_delete: general.auto_delete,
            arguments: BTreeMap::new(),
        }
    }
}

/// Fluent adjustments of a [`QueueDeclaration`].
#[derive(Debug, Default)]
pub struct QueueDeclarationBuilder {
    declaration: QueueDeclaration,
}

impl QueueDeclarationBuilder {
    pub fn new(declaration: QueueDeclaration) -> Self {
        Self { declaration }
    }

    pub fn with_name(&mut self, name: impl Into<String>) -> &mut Self {
        self.declaration.name = name.into();
        self
    }

    /// Append a suffix to the current name, joined with `_`.
    pub fn with_name_suffix(&mut self, suffix: &str) -> &mut Self {
        if !suffix.is_empty() {
            self.declaration.name = format!("{}_{}", self.declaration.name, suffix);
        }
        self
    }

    pub fn with_durability(&mut self, durable: bool) -> &mut Self {
        self.declaration.durable = durable;
        self
    }

    pub fn with_exclusivity(&mut self, exclusive: bool) -> &mut Self {
        self.declaration.exclusive = exclusive;
        self
    }

    pub fn with_auto_delete(&mut self, auto_delete: bool) -> &mut Self {
        self.declaration.auto_delete = auto_delete;
        self
    }

    pub fn with_argument(&mut self, key: impl Into<String>, value: serde_json::Value) -> &mut Self {
        self.declaration.arguments.insert(key.into(), value);
        self
    }

    pub fn with_message_ttl(&mut self, ttl: Duration) -> &mut Self {
        let millis = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX);
        self.with_argument(MESSAGE_TTL, millis.into())
    }

    pub fn with_dead_letter_exchange(&mut self, exchange: impl Into<String>) -> &mut Self {
        self.with_argument(DEAD_LETTER_EXCHANGE, serde_json::Value::String(exchange.into()))
    }

    pub fn with_max_priority(&mut self, priority: u8) -> &mut Self {
        self.with_argument(MAX_PRIORITY, priority.into())
    }

    pub fn build(self) -> QueueDeclaration {
        self.declaration
    }
}
