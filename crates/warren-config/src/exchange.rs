//! Exchange declarations.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::client::GeneralExchangeConfiguration;

/// AMQP exchange kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExchangeType {
    Direct,
    Fanout,
    Headers,
    #[default]
    Topic,
}

impl ExchangeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Direct => "direct",
            Self::Fanout => "fanout",
            Self::Headers => "headers",
            Self::Topic => "topic",
        }
    }
}

impl std::fmt::Display for ExchangeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parameters for an `exchange.declare` call.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ExchangeDeclaration {
    pub name: String,
    pub exchange_type: ExchangeType,
    pub durable: bool,
    pub auto_delete: bool,
    pub arguments: BTreeMap<String, serde_json::Value>,
}

impl ExchangeDeclaration {
    /// Declaration seeded from the client-wide exchange defaults.
    pub fn from_general(name: impl Into<String>, general: &GeneralExchangeConfiguration) -> Self {
        Self {
            name: name.into(),
            exchange_type: general.exchange_type,
            durable: general.durable,
            auto_delete: general.auto_delete,
            arguments: BTreeMap::new(),
        }
    }

    /// The broker's default (nameless) exchange. It can never be declared.
    pub fn is_default(&self) -> bool {
        self.name.is_empty()
    }
}

/// Fluent adjustments of an [`ExchangeDeclaration`].
#[derive(Debug, Default)]
pub struct ExchangeDeclarationBuilder {
    declaration: ExchangeDeclaration,
}

impl ExchangeDeclarationBuilder {
    pub fn new(declaration: ExchangeDeclaration) -> Self {
        Self { declaration }
    }

    pub fn with_name(&mut self, name: impl Into<String>) -> &mut Self {
        self.declaration.name = name.into();
        self
    }

    pub fn with_type(&mut self, exchange_type: ExchangeType) -> &mut Self {
        self.declaration.exchange_type = exchange_type;
        self
    }

    pub fn with_durability(&mut self, durable: bool) -> &mut Self {
        self.declaration.durable = durable;
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

    pub fn build(self) -> ExchangeDeclaration {
        self.declaration
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_exchange() {
        let declaration = ExchangeDeclaration::default();
        assert!(declaration.is_default());
        assert_eq!(declaration.exchange_type, ExchangeType::Topic);
    }

    #[test]
    fn test_from_general() {
        let general = GeneralExchangeConfiguration {
            exchange_type: ExchangeType::Direct,
            durable: false,
            auto_delete: true,
        };
        let declaration = ExchangeDeclaration::from_general("shop", &general);
        assert_eq!(declaration.name, "shop");
        assert_eq!(declaration.exchange_type, ExchangeType::Direct);
        assert!(!declaration.durable);
        assert!(declaration.auto_delete);
    }

    #[test]
    fn test_builder() {
        let mut builder = ExchangeDeclarationBuilder::new(ExchangeDeclaration::default());
        builder
            .with_name("audit")
            .with_type(ExchangeType::Fanout)
            .with_argument("alternate-exchange", serde_json::json!("unrouted"));
        let declaration = builder.build();
        assert_eq!(declaration.name, "audit");
        assert_eq!(declaration.exchange_type.to_string(), "fanout");
        assert_eq!(declaration.arguments.len(), 1);
    }

    #[test]
    fn test_exchange_type_serde() {
        let json = serde_json::to_string(&ExchangeType::Headers).unwrap();
        assert_eq!(json, "\"headers\"");
    }
}
