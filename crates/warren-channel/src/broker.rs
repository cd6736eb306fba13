//! Broker abstraction consumed by the channel factory and the pipeline.
//!
//! These traits are the seam to an AMQP client library. Implementations
//! report open/closed state, expose a [`RecoveryEvent`] when they support
//! automatic recovery, and perform the individual broker calls.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use warren_config::{
    BasicProperties, BasicPublishConfiguration, ClientConfiguration, ExchangeDeclaration,
    QueueDeclaration,
};

use crate::error::Result;
use crate::recovery::RecoveryEvent;

/// Who closed a connection or channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownInitiator {
    /// This process closed it on purpose.
    Application,
    /// The client library closed it, e.g. after a missed heartbeat.
    Library,
    /// The broker closed it.
    Peer,
}

/// Why a connection or channel was closed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseReason {
    pub initiator: ShutdownInitiator,
    pub reply_code: u16,
    pub reply_text: String,
}

impl CloseReason {
    pub fn new(initiator: ShutdownInitiator, reply_code: u16, reply_text: impl Into<String>) -> Self {
        Self {
            initiator,
            reply_code,
            reply_text: reply_text.into(),
        }
    }

    pub fn is_application_initiated(&self) -> bool {
        self.initiator == ShutdownInitiator::Application
    }
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} ({}): {}", self.initiator, self.reply_code, self.reply_text)
    }
}

/// A message delivered to a consumer.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Delivery {
    pub delivery_tag: u64,
    pub exchange: String,
    pub routing_key: String,
    pub redelivered: bool,
    pub consumer_tag: String,
    pub properties: BasicProperties,
    pub body: Vec<u8>,
}

/// A running consumer and the channel its deliveries arrive on.
///
/// Deliveries must be acknowledged on that same channel.
#[derive(Clone)]
pub struct BasicConsumer {
    pub channel: Arc<dyn BrokerChannel>,
    pub consumer_tag: String,
}

impl BasicConsumer {
    pub fn new(channel: Arc<dyn BrokerChannel>, consumer_tag: impl Into<String>) -> Self {
        Self {
            channel,
            consumer_tag: consumer_tag.into(),
        }
    }
}

impl fmt::Debug for BasicConsumer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BasicConsumer")
            .field("channel", &self.channel.channel_number())
            .field("consumer_tag", &self.consumer_tag)
            .finish()
    }
}

/// A broker session multiplexed over a connection.
#[async_trait]
pub trait BrokerChannel: Send + Sync {
    fn channel_number(&self) -> u16;

    fn is_open(&self) -> bool;

    fn close_reason(&self) -> Option<CloseReason>;

    /// The recovery event, or `None` if this channel never recovers.
    fn recovery(&self) -> Option<RecoveryEvent>;

    async fn basic_ack(&self, delivery_tag: u64, multiple: bool) -> Result<()>;

    async fn basic_nack(&self, delivery_tag: u64, multiple: bool, requeue: bool) -> Result<()>;

    async fn basic_reject(&self, delivery_tag: u64, requeue: bool) -> Result<()>;

    async fn basic_publish(&self, config: &BasicPublishConfiguration, body: &[u8]) -> Result<()>;

    async fn basic_qos(&self, prefetch_count: u16) -> Result<()>;

    async fn exchange_declare(&self, declaration: &ExchangeDeclaration) -> Result<()>;

    async fn queue_declare(&self, declaration: &QueueDeclaration) -> Result<()>;

    async fn queue_bind(&self, queue: &str, exchange: &str, routing_key: &str) -> Result<()>;

    /// Release the channel. Must tolerate repeated calls.
    fn dispose(&self);
}

impl fmt::Debug for dyn BrokerChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BrokerChannel")
            .field("channel_number", &self.channel_number())
            .field("open", &self.is_open())
            .finish()
    }
}

/// A transport-level link to the broker.
#[async_trait]
pub trait BrokerConnection: Send + Sync {
    fn is_open(&self) -> bool;

    fn close_reason(&self) -> Option<CloseReason>;

    /// The recovery event, or `None` if this connection never recovers.
    fn recovery(&self) -> Option<RecoveryEvent>;

    async fn create_channel(&self) -> Result<Arc<dyn BrokerChannel>>;

    /// Release the connection. Must tolerate repeated calls.
    fn dispose(&self);
}

impl fmt::Debug for dyn BrokerConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BrokerConnection")
            .field("open", &self.is_open())
            .finish()
    }
}

/// Opens broker connections.
#[async_trait]
pub trait ConnectionFactory: Send + Sync {
    /// Connect to the first reachable host of `config.hostnames`.
    ///
    /// Fails with [`ChannelError::BrokerUnreachable`] when none answers.
    ///
    /// [`ChannelError::BrokerUnreachable`]: crate::ChannelError::BrokerUnreachable
    async fn create_connection(
        &self,
        config: &ClientConfiguration,
    ) -> Result<Arc<dyn BrokerConnection>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_close_reason() {
        let reason = CloseReason::new(ShutdownInitiator::Application, 200, "Goodbye");
        assert!(reason.is_application_initiated());
        assert_eq!(reason.to_string(), "Application (200): Goodbye");

        let reason = CloseReason::new(ShutdownInitiator::Peer, 320, "CONNECTION_FORCED");
        assert!(!reason.is_application_initiated());
    }

    #[test]
    fn test_channel_debug_shows_number() {
        let channel: Arc<dyn BrokerChannel> =
            Arc::new(crate::testing::InMemoryChannel::new(4, false));
        let debug = format!("{channel:?}");
        assert!(debug.contains("channel_number: 4"));
        assert!(debug.contains("open: true"));
    }
}
