//! Consumer-side configuration: what to declare and how to consume.

use std::collections::BTreeMap;
use std::mem;

use serde::{Deserialize, Serialize};

use crate::exchange::{ExchangeDeclaration, ExchangeDeclarationBuilder};
use crate::queue::{QueueDeclaration, QueueDeclarationBuilder};

/// Default number of unacknowledged deliveries a consumer may hold.
pub const DEFAULT_PREFETCH_COUNT: u16 = 50;

/// Parameters for `basic.consume`, plus the binding that feeds the queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsumeConfiguration {
    pub queue_name: String,
    pub exchange_name: String,
    pub routing_key: String,
    pub consumer_tag: String,
    /// When set the broker considers a delivery acknowledged as soon as it is sent.
    pub auto_ack: bool,
    pub no_local: bool,
    pub exclusive: bool,
    pub prefetch_count: u16,
    pub arguments: BTreeMap<String, serde_json::Value>,
}

impl Default for ConsumeConfiguration {
    fn default() -> Self {
        Self {
            queue_name: String::new(),
            exchange_name: String::new(),
            routing_key: String::new(),
            consumer_tag: String::new(),
            auto_ack: false,
            no_local: false,
            exclusive: false,
            prefetch_count: DEFAULT_PREFETCH_COUNT,
            arguments: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Default)]
pub struct ConsumeConfigurationBuilder {
    config: ConsumeConfiguration,
}

impl ConsumeConfigurationBuilder {
    pub fn new(config: ConsumeConfiguration) -> Self {
        Self { config }
    }

    pub fn with_routing_key(&mut self, routing_key: impl Into<String>) -> &mut Self {
        self.config.routing_key = routing_key.into();
        self
    }

    pub fn with_consumer_tag(&mut self, tag: impl Into<String>) -> &mut Self {
        self.config.consumer_tag = tag.into();
        self
    }

    pub fn with_auto_ack(&mut self, auto_ack: bool) -> &mut Self {
        self.config.auto_ack = auto_ack;
        self
    }

    pub fn with_no_local(&mut self, no_local: bool) -> &mut Self {
        self.config.no_local = no_local;
        self
    }

    pub fn with_exclusive(&mut self, exclusive: bool) -> &mut Self {
        self.config.exclusive = exclusive;
        self
    }

    pub fn with_prefetch_count(&mut self, prefetch_count: u16) -> &mut Self {
        self.config.prefetch_count = prefetch_count;
        self
    }

    pub fn with_argument(&mut self, key: impl Into<String>, value: serde_json::Value) -> &mut Self {
        self.config.arguments.insert(key.into(), value);
        self
    }

    pub fn build(self) -> ConsumeConfiguration {
        self.config
    }
}

/// Everything a consuming operation needs: the exchange to declare (if
/// any), the queue to declare and the consume parameters.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsumerConfiguration {
    pub exchange: Option<ExchangeDeclaration>,
    pub queue: QueueDeclaration,
    pub consume: ConsumeConfiguration,
}

/// Fluent adjustments of a [`ConsumerConfiguration`].
///
/// Changing the declared queue or exchange keeps the consume parameters
/// pointing at them.
#[derive(Debug, Default)]
pub struct ConsumerConfigurationBuilder {
    config: ConsumerConfiguration,
}

impl ConsumerConfigurationBuilder {
    pub fn new(config: ConsumerConfiguration) -> Self {
        Self { config }
    }

    pub fn on_declared_exchange(
        &mut self,
        action: impl FnOnce(&mut ExchangeDeclarationBuilder),
    ) -> &mut Self {
        let current = self.config.exchange.take().unwrap_or_default();
        let mut builder = ExchangeDeclarationBuilder::new(current);
        action(&mut builder);
        let exchange = builder.build();
        self.config.consume.exchange_name = exchange.name.clone();
        self.config.exchange = Some(exchange);
        self
    }

    pub fn from_declared_queue(
        &mut self,
        action: impl FnOnce(&mut QueueDeclarationBuilder),
    ) -> &mut Self {
        let mut builder = QueueDeclarationBuilder::new(mem::take(&mut self.config.queue));
        action(&mut builder);
        self.config.queue = builder.build();
        self.config.consume.queue_name = self.config.queue.name.clone();
        self
    }

    pub fn consume(&mut self, action: impl FnOnce(&mut ConsumeConfigurationBuilder)) -> &mut Self {
        let mut builder = ConsumeConfigurationBuilder::new(mem::take(&mut self.config.consume));
        action(&mut builder);
        self.config.consume = builder.build();
        self
    }

    pub fn build(self) -> ConsumerConfiguration {
        self.config
    }
}
