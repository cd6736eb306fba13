//! Publisher-side configuration.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::exchange::{ExchangeDeclaration, ExchangeDeclarationBuilder};

/// AMQP delivery mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryMode {
    Transient = 1,
    Persistent = 2,
}

/// Broker message properties (the AMQP `basic` content header).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BasicProperties {
    pub content_type: Option<String>,
    pub content_encoding: Option<String>,
    pub headers: BTreeMap<String, serde_json::Value>,
    pub delivery_mode: Option<DeliveryMode>,
    pub priority: Option<u8>,
    pub correlation_id: Option<String>,
    pub reply_to: Option<String>,
    pub expiration: Option<String>,
    pub message_id: Option<String>,
    /// Seconds since the Unix epoch.
    pub timestamp: Option<u64>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub user_id: Option<String>,
    pub app_id: Option<String>,
}

impl BasicProperties {
    pub fn with_header(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.headers.insert(key.into(), value);
        self
    }

    pub fn is_persistent(&self) -> bool {
        self.delivery_mode == Some(DeliveryMode::Persistent)
    }
}

/// A mandatory message the broker could not route, handed back to the publisher.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BasicReturn {
    pub reply_code: u16,
    pub reply_text: String,
    pub exchange: String,
    pub routing_key: String,
    pub properties: BasicProperties,
    pub body: Vec<u8>,
}

/// Invoked for every returned message of a mandatory publish.
pub type ReturnCallback = Arc<dyn Fn(&BasicReturn) + Send + Sync>;

/// Parameters for a `basic.publish` call.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BasicPublishConfiguration {
    pub exchange_name: String,
    pub routing_key: String,
    pub mandatory: bool,
    pub basic_properties: BasicProperties,
}

/// Everything a publishing operation needs.
#[derive(Clone, Default)]
pub struct PublisherConfiguration {
    pub exchange: Option<ExchangeDeclaration>,
    pub routing_key: String,
    pub mandatory: bool,
    pub basic_properties: BasicProperties,
    pub return_callback: Option<ReturnCallback>,
}

impl fmt::Debug for PublisherConfiguration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PublisherConfiguration")
            .field("exchange", &self.exchange)
            .field("routing_key", &self.routing_key)
            .field("mandatory", &self.mandatory)
            .field("basic_properties", &self.basic_properties)
            .field("return_callback", &self.return_callback.is_some())
            .finish()
    }
}

impl PublisherConfiguration {
    /// Name of the target exchange, empty for the default exchange.
    pub fn exchange_name(&self) -> &str {
        self.exchange.as_ref().map(|e| e.name.as_str()).unwrap_or("")
    }

    /// The subset of this configuration used by `basic.publish`.
    pub fn basic_publish(&self) -> BasicPublishConfiguration {
        BasicPublishConfiguration {
            exchange_name: self.exchange_name().to_string(),
            routing_key: self.routing_key.clone(),
            mandatory: self.mandatory,
            basic_properties: self.basic_properties.clone(),
        }
    }
}

/// Fluent adjustments of a [`PublisherConfiguration`].
#[derive(Default)]
pub struct PublisherConfigurationBuilder {
    config: PublisherConfiguration,
}

impl PublisherConfigurationBuilder {
    pub fn new(config: PublisherConfiguration) -> Self {
        Self { config }
    }

    pub fn on_declared_exchange(
        &mut self,
        action: impl FnOnce(&mut ExchangeDeclarationBuilder),
    ) -> &mut Self {
        let mut builder =
            ExchangeDeclarationBuilder::new(self.config.exchange.take().unwrap_or_default());
        action(&mut builder);
        self.config.exchange = Some(builder.build());
        self
    }

    pub fn with_routing_key(&mut self, routing_key: impl Into<String>) -> &mut Self {
        self.config.routing_key = routing_key.into();
        self
    }

    pub fn with_mandatory(&mut self, mandatory: bool) -> &mut Self {
        self.config.mandatory = mandatory;
        self
    }

    pub fn with_properties(&mut self, action: impl FnOnce(&mut BasicProperties)) -> &mut Self {
        action(&mut self.config.basic_properties);
        self
    }

    /// Register a callback for returned messages. Implies `mandatory`.
    pub fn with_return_callback(&mut self, callback: ReturnCallback) -> &mut Self {
        self.config.return_callback = Some(callback);
        self.config.mandatory = true;
        self
    }

    pub fn build(self) -> PublisherConfiguration {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn publisher() -> PublisherConfiguration {
        PublisherConfiguration {
            exchange: Some(ExchangeDeclaration {
                name: "orders".into(),
                ..Default::default()
            }),
            routing_key: "order.placed".into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_basic_publish_projection() {
        let basic = publisher().basic_publish();
        assert_eq!(basic.exchange_name, "orders");
        assert_eq!(basic.routing_key, "order.placed");
        assert!(!basic.mandatory);
    }

    #[test]
    fn test_default_exchange_name_is_empty() {
        assert_eq!(PublisherConfiguration::default().exchange_name(), "");
    }

    #[test]
    fn test_override_routing_key_keeps_exchange() {
        let mut builder = PublisherConfigurationBuilder::new(publisher());
        builder.with_routing_key("order.placed.eu");
        let config = builder.build();
        assert_eq!(config.exchange_name(), "orders");
        assert_eq!(config.routing_key, "order.placed.eu");
    }

    #[test]
    fn test_return_callback_implies_mandatory() {
        let mut builder = PublisherConfigurationBuilder::new(publisher());
        builder.with_return_callback(Arc::new(|_returned: &BasicReturn| {}));
        let config = builder.build();
        assert!(config.mandatory);
        assert!(format!("{config:?}").contains("return_callback: true"));
    }

    #[test]
    fn test_properties_action() {
        let mut builder = PublisherConfigurationBuilder::new(publisher());
        builder.with_properties(|p| {
            p.delivery_mode = Some(DeliveryMode::Persistent);
            p.correlation_id = Some("abc".into());
        });
        let config = builder.build();
        assert!(config.basic_properties.is_persistent());
        assert_eq!(config.basic_properties.correlation_id.as_deref(), Some("abc"));
    }
}
