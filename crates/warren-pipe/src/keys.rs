//! Well-known context keys.
//!
//! These names are the contract between otherwise independent middleware:
//! a step that publishes `PublisherConfiguration` and a step that reads it
//! only agree on the key below. Extensions define further keys with
//! [`PipeKey::new`].

use std::any::Any;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use warren_channel::{BasicConsumer, BrokerChannel, Delivery};
use warren_config::{
    BasicProperties, BasicPublishConfiguration, ClientConfiguration, ConsumeConfiguration,
    ConsumerConfiguration, ExchangeDeclaration, MessageType, PublisherConfiguration,
    QueueDeclaration, RequestConfiguration, ReturnCallback,
};

use crate::acknowledgement::Acknowledgement;
use crate::handler::MessageHandler;

/// A named context entry holding a value of type `T`.
pub struct PipeKey<T> {
    name: &'static str,
    _marker: PhantomData<fn() -> T>,
}

impl<T> PipeKey<T> {
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            _marker: PhantomData,
        }
    }

    pub const fn name(&self) -> &'static str {
        self.name
    }
}

impl<T> Clone for PipeKey<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for PipeKey<T> {}

impl<T> fmt::Debug for PipeKey<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PipeKey({})", self.name)
    }
}

/// The message being published or handled, type-erased.
pub type Message = Arc<dyn Any + Send + Sync>;

/// A caller-supplied adjustment of a configuration builder `B`.
pub type ConfigurationAction<B> = Arc<dyn Fn(&mut B) + Send + Sync>;

/// The `ConfigurationAction` key for builder type `B`.
///
/// Every operation stores at most one action; its builder type depends on
/// the operation, so the key is generic over it.
pub const fn configuration_action<B>() -> PipeKey<ConfigurationAction<B>> {
    PipeKey::new("ConfigurationAction")
}

pub const MESSAGE: PipeKey<Message> = PipeKey::new("Message");
pub const MESSAGE_TYPE: PipeKey<MessageType> = PipeKey::new("MessageType");
pub const REQUEST_MESSAGE_TYPE: PipeKey<MessageType> = PipeKey::new("RequestMessageType");
pub const RESPONSE_MESSAGE_TYPE: PipeKey<MessageType> = PipeKey::new("ResponseMessageType");
pub const SERIALIZED_MESSAGE: PipeKey<Vec<u8>> = PipeKey::new("SerializedMessage");

pub const CLIENT_CONFIGURATION: PipeKey<Arc<ClientConfiguration>> =
    PipeKey::new("ClientConfiguration");
pub const PUBLISHER_CONFIGURATION: PipeKey<PublisherConfiguration> =
    PipeKey::new("PublisherConfiguration");
pub const BASIC_PUBLISH_CONFIGURATION: PipeKey<BasicPublishConfiguration> =
    PipeKey::new("BasicPublishConfiguration");
pub const CONSUMER_CONFIGURATION: PipeKey<ConsumerConfiguration> =
    PipeKey::new("ConsumerConfiguration");
pub const CONSUME_CONFIGURATION: PipeKey<ConsumeConfiguration> =
    PipeKey::new("ConsumeConfiguration");
pub const REQUEST_CONFIGURATION: PipeKey<RequestConfiguration> =
    PipeKey::new("RequestConfiguration");
pub const EXCHANGE_DECLARATION: PipeKey<ExchangeDeclaration> = PipeKey::new("ExchangeDeclaration");
pub const QUEUE_DECLARATION: PipeKey<QueueDeclaration> = PipeKey::new("QueueDeclaration");
pub const BASIC_PROPERTIES: PipeKey<BasicProperties> = PipeKey::new("BasicProperties");
pub const RETURN_CALLBACK: PipeKey<ReturnCallback> = PipeKey::new("ReturnCallback");
pub const ROUTING_KEY: PipeKey<String> = PipeKey::new("RoutingKey");

pub const CHANNEL: PipeKey<Arc<dyn BrokerChannel>> = PipeKey::new("Channel");
pub const TRANSIENT_CHANNEL: PipeKey<Arc<dyn BrokerChannel>> = PipeKey::new("TransientChannel");
pub const CONSUMER: PipeKey<BasicConsumer> = PipeKey::new("Consumer");
pub const DELIVERY_EVENT_ARGS: PipeKey<Delivery> = PipeKey::new("DeliveryEventArgs");

pub const MESSAGE_HANDLER: PipeKey<MessageHandler> = PipeKey::new("MessageHandler");
pub const MESSAGE_HANDLER_RESULT: PipeKey<Acknowledgement> = PipeKey::new("MessageHandlerResult");
pub const MESSAGE_ACKNOWLEDGEMENT: PipeKey<Acknowledgement> =
    PipeKey::new("MessageAcknowledgement");

/// Correlates every message published while handling one inbound message.
pub const GLOBAL_EXECUTION_ID: PipeKey<String> = PipeKey::new("GlobalExecutionId");

#[cfg(test)]
mod tests {
    use super::*;
    use warren_config::PublisherConfigurationBuilder;

    #[test]
    fn test_key_names_are_stable() {
        assert_eq!(CONSUMER_CONFIGURATION.name(), "ConsumerConfiguration");
        assert_eq!(CONSUME_CONFIGURATION.name(), "ConsumeConfiguration");
        assert_eq!(PUBLISHER_CONFIGURATION.name(), "PublisherConfiguration");
        assert_eq!(BASIC_PUBLISH_CONFIGURATION.name(), "BasicPublishConfiguration");
        assert_eq!(MESSAGE_TYPE.name(), "MessageType");
        assert_eq!(MESSAGE_HANDLER.name(), "MessageHandler");
        assert_eq!(MESSAGE_HANDLER_RESULT.name(), "MessageHandlerResult");
        assert_eq!(MESSAGE_ACKNOWLEDGEMENT.name(), "MessageAcknowledgement");
        assert_eq!(BASIC_PROPERTIES.name(), "BasicProperties");
        assert_eq!(DELIVERY_EVENT_ARGS.name(), "DeliveryEventArgs");
        assert_eq!(CONSUMER.name(), "Consumer");
        assert_eq!(CHANNEL.name(), "Channel");
        assert_eq!(ROUTING_KEY.name(), "RoutingKey");
        assert_eq!(QUEUE_DECLARATION.name(), "QueueDeclaration");
        assert_eq!(EXCHANGE_DECLARATION.name(), "ExchangeDeclaration");
        assert_eq!(RETURN_CALLBACK.name(), "ReturnCallback");
        assert_eq!(CLIENT_CONFIGURATION.name(), "ClientConfiguration");
        assert_eq!(
            configuration_action::<PublisherConfigurationBuilder>().name(),
            "ConfigurationAction"
        );
    }

    #[test]
    fn test_key_debug() {
        assert_eq!(format!("{:?}", ROUTING_KEY), "PipeKey(RoutingKey)");
    }
}
