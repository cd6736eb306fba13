//! Configuration factories.
//!
//! Factories produce the default configuration of an operation, either from
//! a message type or from explicit names. `None` means "cannot be resolved";
//! callers decide whether that is fatal.

use std::sync::Arc;

use crate::client::ClientConfiguration;
use crate::consume::{ConsumeConfiguration, ConsumerConfiguration};
use crate::exchange::ExchangeDeclaration;
use crate::message_type::MessageType;
use crate::naming::NamingConventions;
use crate::publish::{BasicProperties, DeliveryMode, PublisherConfiguration};
use crate::queue::QueueDeclaration;
use crate::request::RequestConfiguration;

/// Pseudo queue used for RabbitMQ direct reply-to.
pub const DIRECT_REPLY_TO_QUEUE: &str = "amq.rabbitmq.reply-to";

const JSON_CONTENT_TYPE: &str = "application/json";

pub trait PublisherConfigurationFactory: Send + Sync {
    fn publisher_for_type(&self, message_type: &MessageType) -> Option<PublisherConfiguration>;
    fn publisher_for(
        &self,
        exchange_name: &str,
        routing_key: &str,
    ) -> Option<PublisherConfiguration>;
}

pub trait ConsumerConfigurationFactory: Send + Sync {
    fn consumer_for_type(&self, message_type: &MessageType) -> Option<ConsumerConfiguration>;
    fn consumer_for(
        &self,
        queue_name: &str,
        exchange_name: &str,
        routing_key: &str,
    ) -> Option<ConsumerConfiguration>;
}

pub trait QueueDeclarationFactory: Send + Sync {
    fn queue_for_type(&self, message_type: &MessageType) -> Option<QueueDeclaration>;
    fn queue_for(&self, queue_name: &str) -> Option<QueueDeclaration>;
}

pub trait RequestConfigurationFactory: Send + Sync {
    fn request_for_types(
        &self,
        request_type: &MessageType,
        response_type: &MessageType,
    ) -> Option<RequestConfiguration>;
}

pub trait RespondConfigurationFactory: Send + Sync {
    fn respond_for_type(&self, request_type: &MessageType) -> Option<ConsumerConfiguration>;
    fn respond_for(
        &self,
        queue_name: &str,
        exchange_name: &str,
        routing_key: &str,
    ) -> Option<ConsumerConfiguration>;
}

/// Derives every operation configuration from [`NamingConventions`] and the
/// client-wide defaults.
#[derive(Debug, Clone)]
pub struct ConventionConfigurationFactory {
    conventions: Arc<NamingConventions>,
    client: Arc<ClientConfiguration>,
}

impl ConventionConfigurationFactory {
    pub fn new(conventions: Arc<NamingConventions>, client: Arc<ClientConfiguration>) -> Self {
        Self {
            conventions,
            client,
        }
    }

    pub fn conventions(&self) -> &NamingConventions {
        &self.conventions
    }

    fn exchange(&self, name: &str) -> Option<ExchangeDeclaration> {
        if name.is_empty() {
            None
        } else {
            Some(ExchangeDeclaration::from_general(name, &self.client.exchange))
        }
    }

    fn base_properties(&self) -> BasicProperties {
        BasicProperties {
            content_type: Some(JSON_CONTENT_TYPE.to_string()),
            delivery_mode: Some(if self.client.persistent_delivery_mode {
                DeliveryMode::Persistent
            } else {
                DeliveryMode::Transient
            }),
            ..Default::default()
        }
    }

    fn consumer(
        &self,
        queue_name: &str,
        exchange_name: &str,
        routing_key: &str,
    ) -> ConsumerConfiguration {
        ConsumerConfiguration {
            exchange: self.exchange(exchange_name),
            queue: QueueDeclaration::from_general(queue_name, &self.client.queue),
            consume: ConsumeConfiguration {
                queue_name: queue_name.to_string(),
                exchange_name: exchange_name.to_string(),
                routing_key: routing_key.to_string(),
                ..Default::default()
            },
        }
    }
}

impl PublisherConfigurationFactory for ConventionConfigurationFactory {
    fn publisher_for_type(&self, message_type: &MessageType) -> Option<PublisherConfiguration> {
        let mut config = self.publisher_for(
            &self.conventions.exchange_name(message_type),
            &self.conventions.routing_key(message_type),
        )?;
        config.basic_properties.kind = Some(message_type.to_string());
        Some(config)
    }

    fn publisher_for(
        &self,
        exchange_name: &str,
        routing_key: &str,
    ) -> Option<PublisherConfiguration> {
        Some(PublisherConfiguration {
            exchange: self.exchange(exchange_name),
            routing_key: routing_key.to_string(),
            mandatory: false,
            basic_properties: self.base_properties(),
            return_callback: None,
        })
    }
}

impl ConsumerConfigurationFactory for ConventionConfigurationFactory {
    fn consumer_for_type(&self, message_type: &MessageType) -> Option<ConsumerConfiguration> {
        let queue = self.conventions.queue_name(message_type);
        let suffix = self.conventions.subscriber_queue_suffix(message_type);
        let queue = if suffix.is_empty() {
            queue
        } else {
            format!("{queue}_{suffix}")
        };
        Some(self.consumer(
            &queue,
            &self.conventions.exchange_name(message_type),
            &self.conventions.routing_key(message_type),
        ))
    }

    fn consumer_for(
        &self,
        queue_name: &str,
        exchange_name: &str,
        routing_key: &str,
    ) -> Option<ConsumerConfiguration> {
        Some(self.consumer(queue_name, exchange_name, routing_key))
    }
}

impl QueueDeclarationFactory for ConventionConfigurationFactory {
    fn queue_for_type(&self, message_type: &MessageType) -> Option<QueueDeclaration> {
        self.queue_for(&self.conventions.queue_name(message_type))
    }

    fn queue_for(&self, queue_name: &str) -> Option<QueueDeclaration> {
        if queue_name.is_empty() {
            return None;
        }
        Some(QueueDeclaration::from_general(queue_name, &self.client.queue))
    }
}

impl RequestConfigurationFactory for ConventionConfigurationFactory {
    fn request_for_types(
        &self,
        request_type: &MessageType,
        response_type: &MessageType,
    ) -> Option<RequestConfiguration> {
        let mut request = self.publisher_for_type(request_type)?;
        request.basic_properties.reply_to = Some(DIRECT_REPLY_TO_QUEUE.to_string());

        let mut response = self.consumer(
            DIRECT_REPLY_TO_QUEUE,
            "",
            &self.conventions.routing_key(response_type),
        );
        response.consume.auto_ack = true;

        Some(RequestConfiguration { request, response })
    }
}

impl RespondConfigurationFactory for ConventionConfigurationFactory {
    fn respond_for_type(&self, request_type: &MessageType) -> Option<ConsumerConfiguration> {
        Some(self.consumer(
            &self.conventions.queue_name(request_type),
            &self.conventions.exchange_name(request_type),
            &self.conventions.routing_key(request_type),
        ))
    }

    fn respond_for(
        &self,
        queue_name: &str,
        exchange_name: &str,
        routing_key: &str,
    ) -> Option<ConsumerConfiguration> {
        Some(self.consumer(queue_name, exchange_name, routing_key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn factory() -> ConventionConfigurationFactory {
        ConventionConfigurationFactory::new(
            Arc::new(NamingConventions::with_application_name("billing")),
            Arc::new(ClientConfiguration::default()),
        )
    }

    fn order_placed() -> MessageType {
        MessageType::new("shop.orders", "OrderPlaced")
    }

    #[test]
    fn test_publisher_for_type() {
        let config = factory().publisher_for_type(&order_placed()).unwrap();
        assert_eq!(config.exchange_name(), "shop.orders");
        assert_eq!(config.routing_key, "orderplaced");
        assert!(config.basic_properties.is_persistent());
        assert_eq!(
            config.basic_properties.kind.as_deref(),
            Some("shop.orders.OrderPlaced")
        );
    }

    #[test]
    fn test_publisher_for_default_exchange() {
        let config = factory().publisher_for("", "work").unwrap();
        assert!(config.exchange.is_none());
        assert_eq!(config.basic_publish().exchange_name, "");
    }

    #[test]
    fn test_consumer_for_type_appends_subscriber_suffix() {
        let factory = factory();
        let first = factory.consumer_for_type(&order_placed()).unwrap();
        let second = factory.consumer_for_type(&order_placed()).unwrap();
        assert_eq!(first.queue.name, "orderplaced_billing");
        assert_eq!(second.queue.name, "orderplaced_billing_1");
        assert_eq!(second.consume.queue_name, "orderplaced_billing_1");
        assert_eq!(first.consume.exchange_name, "shop.orders");
    }

    #[test]
    fn test_request_uses_direct_reply_to() {
        let response_type = MessageType::new("shop.orders", "OrderStatus");
        let config = factory()
            .request_for_types(&order_placed(), &response_type)
            .unwrap();
        assert_eq!(
            config.request.basic_properties.reply_to.as_deref(),
            Some(DIRECT_REPLY_TO_QUEUE)
        );
        assert_eq!(config.response.consume.queue_name, DIRECT_REPLY_TO_QUEUE);
        assert_eq!(config.response.consume.routing_key, "orderstatus");
        assert!(config.response.consume.auto_ack);
        assert!(config.response.exchange.is_none());
    }

    #[test]
    fn test_respond_shares_queue() {
        let factory = factory();
        let a = factory.respond_for_type(&order_placed()).unwrap();
        let b = factory.respond_for_type(&order_placed()).unwrap();
        assert_eq!(a.queue.name, "orderplaced");
        assert_eq!(a.queue.name, b.queue.name);
    }

    #[test]
    fn test_queue_for_empty_name_is_unresolvable() {
        assert!(factory().queue_for("").is_none());
        assert_eq!(
            factory().queue_for_type(&order_placed()).unwrap().name,
            "orderplaced"
        );
    }
}
