//! In-memory broker for tests and local simulation.
//!
//! Nothing is routed: channels record every call they receive in a
//! [`ChannelCall`] log and keep published messages, so tests can assert on
//! exactly which terminal broker calls an operation issued. Connections and
//! channels can be closed and recovered on demand.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU16, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use warren_config::{
    BasicProperties, BasicPublishConfiguration, ClientConfiguration, ExchangeDeclaration,
    QueueDeclaration,
};

use crate::broker::{
    BrokerChannel, BrokerConnection, CloseReason, ConnectionFactory, ShutdownInitiator,
};
use crate::error::{ChannelError, Result};
use crate::recovery::RecoveryEvent;

/// A broker call received by an [`InMemoryChannel`].
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelCall {
    BasicAck {
        delivery_tag: u64,
        multiple: bool,
    },
    BasicNack {
        delivery_tag: u64,
        multiple: bool,
        requeue: bool,
    },
    BasicReject {
        delivery_tag: u64,
        requeue: bool,
    },
    BasicPublish {
        exchange: String,
        routing_key: String,
        mandatory: bool,
    },
    BasicQos {
        prefetch_count: u16,
    },
    ExchangeDeclare {
        name: String,
    },
    QueueDeclare {
        name: String,
    },
    QueueBind {
        queue: String,
        exchange: String,
        routing_key: String,
    },
}

impl ChannelCall {
    /// Whether this is one of the acknowledgement calls.
    pub fn is_acknowledgement(&self) -> bool {
        matches!(
            self,
            Self::BasicAck { .. } | Self::BasicNack { .. } | Self::BasicReject { .. }
        )
    }
}

/// A message published through an [`InMemoryChannel`].
#[derive(Debug, Clone, PartialEq)]
pub struct PublishedMessage {
    pub exchange: String,
    pub routing_key: String,
    pub properties: BasicProperties,
    pub body: Vec<u8>,
}

/// Shared open/closed state with an optional recovery event.
#[derive(Debug)]
struct Lifecycle {
    open: AtomicBool,
    disposed: AtomicBool,
    close_reason: Mutex<Option<CloseReason>>,
    recovery: Option<RecoveryEvent>,
}

impl Lifecycle {
    fn new(recoverable: bool) -> Self {
        Self {
            open: AtomicBool::new(true),
            disposed: AtomicBool::new(false),
            close_reason: Mutex::new(None),
            recovery: recoverable.then(RecoveryEvent::new),
        }
    }

    fn close(&self, initiator: ShutdownInitiator) {
        *self.close_reason.lock() = Some(CloseReason::new(initiator, 320, "closed"));
        self.open.store(false, Ordering::SeqCst);
    }

    fn recover(&self) -> usize {
        *self.close_reason.lock() = None;
        self.open.store(true, Ordering::SeqCst);
        self.recovery.as_ref().map_or(0, RecoveryEvent::fire)
    }

    fn dispose(&self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        if self.open.swap(false, Ordering::SeqCst) {
            *self.close_reason.lock() =
                Some(CloseReason::new(ShutdownInitiator::Application, 200, "Goodbye"));
        }
    }

    fn listener_count(&self) -> usize {
        self.recovery.as_ref().map_or(0, RecoveryEvent::listener_count)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Channel
// ─────────────────────────────────────────────────────────────────────────────

/// A channel that records calls instead of talking to a broker.
#[derive(Debug)]
pub struct InMemoryChannel {
    number: u16,
    lifecycle: Lifecycle,
    calls: Mutex<Vec<ChannelCall>>,
    published: Mutex<Vec<PublishedMessage>>,
}

impl InMemoryChannel {
    pub fn new(number: u16, recoverable: bool) -> Self {
        Self {
            number,
            lifecycle: Lifecycle::new(recoverable),
            calls: Mutex::new(Vec::new()),
            published: Mutex::new(Vec::new()),
        }
    }

    /// Every call received so far, in order.
    pub fn calls(&self) -> Vec<ChannelCall> {
        self.calls.lock().clone()
    }

    /// Messages published so far, in order.
    pub fn published(&self) -> Vec<PublishedMessage> {
        self.published.lock().clone()
    }

    pub fn close(&self, initiator: ShutdownInitiator) {
        self.lifecycle.close(initiator);
    }

    /// Reopen the channel and fire its recovery event.
    ///
    /// Returns the number of waiters that were notified.
    pub fn recover(&self) -> usize {
        self.lifecycle.recover()
    }

    pub fn recovery_listener_count(&self) -> usize {
        self.lifecycle.listener_count()
    }

    pub fn is_disposed(&self) -> bool {
        self.lifecycle.disposed.load(Ordering::SeqCst)
    }

    fn record(&self, operation: &str, call: ChannelCall) -> Result<()> {
        if !self.lifecycle.open.load(Ordering::SeqCst) {
            return Err(ChannelError::operation(
                operation,
                format!("channel {} is closed", self.number),
            ));
        }
        self.calls.lock().push(call);
        Ok(())
    }
}

#[async_trait]
impl BrokerChannel for InMemoryChannel {
    fn channel_number(&self) -> u16 {
        self.number
    }

    fn is_open(&self) -> bool {
        self.lifecycle.open.load(Ordering::SeqCst)
    }

    fn close_reason(&self) -> Option<CloseReason> {
        self.lifecycle.close_reason.lock().clone()
    }

    fn recovery(&self) -> Option<RecoveryEvent> {
        self.lifecycle.recovery.clone()
    }

    async fn basic_ack(&self, delivery_tag: u64, multiple: bool) -> Result<()> {
        self.record(
            "basic.ack",
            ChannelCall::BasicAck {
                delivery_tag,
                multiple,
            },
        )
    }

    async fn basic_nack(&self, delivery_tag: u64, multiple: bool, requeue: bool) -> Result<()> {
        self.record(
            "basic.nack",
            ChannelCall::BasicNack {
                delivery_tag,
                multiple,
                requeue,
            },
        )
    }

    async fn basic_reject(&self, delivery_tag: u64, requeue: bool) -> Result<()> {
        self.record(
            "basic.reject",
            ChannelCall::BasicReject {
                delivery_tag,
                requeue,
            },
        )
    }

    async fn basic_publish(&self, config: &BasicPublishConfiguration, body: &[u8]) -> Result<()> {
        self.record(
            "basic.publish",
            ChannelCall::BasicPublish {
                exchange: config.exchange_name.clone(),
                routing_key: config.routing_key.clone(),
                mandatory: config.mandatory,
            },
        )?;
        self.published.lock().push(PublishedMessage {
            exchange: config.exchange_name.clone(),
            routing_key: config.routing_key.clone(),
            properties: config.basic_properties.clone(),
            body: body.to_vec(),
        });
        Ok(())
    }

    async fn basic_qos(&self, prefetch_count: u16) -> Result<()> {
        self.record("basic.qos", ChannelCall::BasicQos { prefetch_count })
    }

    async fn exchange_declare(&self, declaration: &ExchangeDeclaration) -> Result<()> {
        self.record(
            "exchange.declare",
            ChannelCall::ExchangeDeclare {
                name: declaration.name.clone(),
            },
        )
    }

    async fn queue_declare(&self, declaration: &QueueDeclaration) -> Result<()> {
        self.record(
            "queue.declare",
            ChannelCall::QueueDeclare {
                name: declaration.name.clone(),
            },
        )
    }

    async fn queue_bind(&self, queue: &str, exchange: &str, routing_key: &str) -> Result<()> {
        self.record(
            "queue.bind",
            ChannelCall::QueueBind {
                queue: queue.to_string(),
                exchange: exchange.to_string(),
                routing_key: routing_key.to_string(),
            },
        )
    }

    fn dispose(&self) {
        self.lifecycle.dispose();
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Connection
// ─────────────────────────────────────────────────────────────────────────────

/// A connection whose channels are [`InMemoryChannel`]s.
#[derive(Debug)]
pub struct InMemoryConnection {
    lifecycle: Lifecycle,
    recoverable: bool,
    next_channel: AtomicU16,
    channels: Mutex<Vec<Arc<InMemoryChannel>>>,
}

impl InMemoryConnection {
    pub fn new(recoverable: bool) -> Self {
        Self {
            lifecycle: Lifecycle::new(recoverable),
            recoverable,
            next_channel: AtomicU16::new(1),
            channels: Mutex::new(Vec::new()),
        }
    }

    /// Channels created on this connection, in creation order.
    pub fn channels(&self) -> Vec<Arc<InMemoryChannel>> {
        self.channels.lock().clone()
    }

    pub fn close(&self, initiator: ShutdownInitiator) {
        self.lifecycle.close(initiator);
    }

    /// Reopen the connection and fire its recovery event.
    pub fn recover(&self) -> usize {
        self.lifecycle.recover()
    }

    pub fn recovery_listener_count(&self) -> usize {
        self.lifecycle.listener_count()
    }

    pub fn is_disposed(&self) -> bool {
        self.lifecycle.disposed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BrokerConnection for InMemoryConnection {
    fn is_open(&self) -> bool {
        self.lifecycle.open.load(Ordering::SeqCst)
    }

    fn close_reason(&self) -> Option<CloseReason> {
        self.lifecycle.close_reason.lock().clone()
    }

    fn recovery(&self) -> Option<RecoveryEvent> {
        self.lifecycle.recovery.clone()
    }

    async fn create_channel(&self) -> Result<Arc<dyn BrokerChannel>> {
        if !self.is_open() {
            return Err(ChannelError::operation("channel.open", "connection is closed"));
        }
        let number = self.next_channel.fetch_add(1, Ordering::SeqCst);
        let channel = Arc::new(InMemoryChannel::new(number, self.recoverable));
        self.channels.lock().push(Arc::clone(&channel));
        Ok(channel)
    }

    fn dispose(&self) {
        self.lifecycle.dispose();
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Connection factory
// ─────────────────────────────────────────────────────────────────────────────

/// Creates [`InMemoryConnection`]s and remembers them.
#[derive(Debug)]
pub struct InMemoryConnectionFactory {
    unreachable: AtomicBool,
    recoverable: AtomicBool,
    connections: Mutex<Vec<Arc<InMemoryConnection>>>,
}

impl InMemoryConnectionFactory {
    /// A reachable broker whose connections support recovery.
    pub fn new() -> Self {
        Self {
            unreachable: AtomicBool::new(false),
            recoverable: AtomicBool::new(true),
            connections: Mutex::new(Vec::new()),
        }
    }

    pub fn set_unreachable(&self, unreachable: bool) {
        self.unreachable.store(unreachable, Ordering::SeqCst);
    }

    /// Applies to connections created afterwards.
    pub fn set_recoverable(&self, recoverable: bool) {
        self.recoverable.store(recoverable, Ordering::SeqCst);
    }

    pub fn connection_count(&self) -> usize {
        self.connections.lock().len()
    }

    pub fn last_connection(&self) -> Option<Arc<InMemoryConnection>> {
        self.connections.lock().last().cloned()
    }
}

impl Default for InMemoryConnectionFactory {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ConnectionFactory for InMemoryConnectionFactory {
    async fn create_connection(
        &self,
        config: &ClientConfiguration,
    ) -> Result<Arc<dyn BrokerConnection>> {
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(ChannelError::unreachable(format!(
                "none of the hosts [{}] answered on port {}",
                config.hostnames.join(", "),
                config.port
            )));
        }
        let connection = Arc::new(InMemoryConnection::new(
            self.recoverable.load(Ordering::SeqCst),
        ));
        self.connections.lock().push(Arc::clone(&connection));
        Ok(connection)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_channel_records_calls() {
        let channel = InMemoryChannel::new(1, true);
        channel.basic_ack(7, false).await.unwrap();
        channel.basic_reject(8, true).await.unwrap();

        assert_eq!(
            channel.calls(),
            vec![
                ChannelCall::BasicAck {
                    delivery_tag: 7,
                    multiple: false
                },
                ChannelCall::BasicReject {
                    delivery_tag: 8,
                    requeue: true
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_closed_channel_rejects_calls() {
        let channel = InMemoryChannel::new(1, false);
        channel.close(ShutdownInitiator::Peer);

        assert!(channel.basic_ack(1, false).await.is_err());
        assert!(channel.calls().is_empty());
        assert!(channel.recovery().is_none());
    }

    #[tokio::test]
    async fn test_publish_keeps_message() {
        let channel = InMemoryChannel::new(1, true);
        let config = BasicPublishConfiguration {
            exchange_name: "shop".into(),
            routing_key: "orderplaced".into(),
            ..Default::default()
        };
        channel.basic_publish(&config, b"{}").await.unwrap();

        let published = channel.published();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].routing_key, "orderplaced");
        assert_eq!(published[0].body, b"{}");
    }

    #[test]
    fn test_dispose_marks_application_close() {
        let connection = InMemoryConnection::new(true);
        connection.dispose();
        connection.dispose();
        assert!(!connection.is_open());
        assert!(connection.close_reason().unwrap().is_application_initiated());
    }
}
