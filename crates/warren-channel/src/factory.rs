//! The channel factory: one shared connection, many channels.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;
use warren_config::ClientConfiguration;

use crate::broker::{BrokerChannel, BrokerConnection, ConnectionFactory};
use crate::error::{ChannelError, Result};

/// Owns the single broker connection of a client and creates channels on it.
///
/// Channels handed out are tracked so that [`dispose`](Self::dispose) can
/// release them before the connection. The factory is safe to share between
/// concurrently running operations.
pub struct ChannelFactory {
    connection_factory: Arc<dyn ConnectionFactory>,
    config: Arc<ClientConfiguration>,
    connection: RwLock<Option<Arc<dyn BrokerConnection>>>,
    /// Serializes connection establishment so at most one is created.
    connect_lock: tokio::sync::Mutex<()>,
    channels: Mutex<Vec<Arc<dyn BrokerChannel>>>,
    disposed: AtomicBool,
}

impl ChannelFactory {
    pub fn new(
        connection_factory: Arc<dyn ConnectionFactory>,
        config: Arc<ClientConfiguration>,
    ) -> Self {
        Self {
            connection_factory,
            config,
            connection: RwLock::new(None),
            connect_lock: tokio::sync::Mutex::new(()),
            channels: Mutex::new(Vec::new()),
            disposed: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &ClientConfiguration {
        &self.config
    }

    /// Establish the shared connection.
    ///
    /// Replaces (and disposes) any connection held from an earlier call.
    /// An unreachable broker fails immediately and leaves the factory
    /// without a connection.
    pub async fn connect(&self, token: &CancellationToken) -> Result<()> {
        self.ensure_not_disposed()?;
        if token.is_cancelled() {
            return Err(ChannelError::Cancelled);
        }
        let _guard = self.lock_connect(token).await?;
        self.open_connection(token).await.map(|_| ())
    }

    /// Create a channel on a healthy connection.
    ///
    /// Connects first if no connection exists. If the connection is down but
    /// recovering, waits for recovery or for `token` to be cancelled.
    pub async fn create_channel(&self, token: &CancellationToken) -> Result<Arc<dyn BrokerChannel>> {
        self.ensure_not_disposed()?;
        let connection = self.get_connection(token).await?;
        if token.is_cancelled() {
            return Err(ChannelError::Cancelled);
        }

        let channel = connection.create_channel().await?;
        {
            let mut channels = self.channels.lock();
            if self.disposed.load(Ordering::SeqCst) {
                drop(channels);
                tracing::debug!(channel = channel.channel_number(), "Factory disposed while creating channel");
                channel.dispose();
                return Err(ChannelError::availability("channel factory has been disposed"));
            }
            channels.push(Arc::clone(&channel));
        }
        tracing::debug!(channel = channel.channel_number(), "Created channel");
        Ok(channel)
    }

    /// Stop tracking `channel` and dispose it.
    ///
    /// For channels whose operation has completed. Releasing a channel the
    /// factory does not track only disposes it.
    pub fn release(&self, channel: &Arc<dyn BrokerChannel>) {
        self.channels
            .lock()
            .retain(|tracked| !std::ptr::addr_eq(Arc::as_ptr(tracked), Arc::as_ptr(channel)));
        channel.dispose();
        tracing::debug!(channel = channel.channel_number(), "Released channel");
    }

    /// Whether a connection is currently held and open.
    pub fn is_connected(&self) -> bool {
        self.connection.read().as_ref().is_some_and(|c| c.is_open())
    }

    /// Number of channels created and not yet released.
    pub fn tracked_channel_count(&self) -> usize {
        self.channels.lock().len()
    }

    /// Release every tracked channel, then the connection.
    ///
    /// Safe to call more than once; only the first call does any work.
    pub fn dispose(&self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }

        let channels: Vec<_> = self.channels.lock().drain(..).collect();
        tracing::debug!(channels = channels.len(), "Disposing channel factory");
        for channel in channels {
            channel.dispose();
        }

        let connection = self.connection.write().take();
        if let Some(connection) = connection {
            connection.dispose();
        }
    }

    fn ensure_not_disposed(&self) -> Result<()> {
        if self.disposed.load(Ordering::SeqCst) {
            return Err(ChannelError::availability("channel factory has been disposed"));
        }
        Ok(())
    }

    async fn lock_connect(
        &self,
        token: &CancellationToken,
    ) -> Result<tokio::sync::MutexGuard<'_, ()>> {
        tokio::select! {
            biased;
            _ = token.cancelled() => Err(ChannelError::Cancelled),
            guard = self.connect_lock.lock() => Ok(guard),
        }
    }

    /// Must be called with `connect_lock` held.
    async fn open_connection(&self, token: &CancellationToken) -> Result<Arc<dyn BrokerConnection>> {
        let previous = self.connection.write().take();
        if let Some(previous) = previous {
            tracing::debug!("Disposing previous connection before reconnecting");
            previous.dispose();
        }

        tracing::debug!(
            host_count = self.config.hostnames.len(),
            "Creating a new connection"
        );
        let created = tokio::select! {
            biased;
            _ = token.cancelled() => return Err(ChannelError::Cancelled),
            created = self.connection_factory.create_connection(&self.config) => created,
        };
        match created {
            Ok(connection) => {
                *self.connection.write() = Some(Arc::clone(&connection));
                if self.disposed.load(Ordering::SeqCst) {
                    tracing::debug!("Factory disposed while connecting, releasing new connection");
                    self.connection.write().take();
                    connection.dispose();
                    return Err(ChannelError::availability("channel factory has been disposed"));
                }
                Ok(connection)
            }
            Err(e) => {
                tracing::info!(error = %e, "Unable to connect to broker");
                Err(e)
            }
        }
    }

    async fn current_or_connect(
        &self,
        token: &CancellationToken,
    ) -> Result<Arc<dyn BrokerConnection>> {
        let current = self.connection.read().clone();
        if let Some(connection) = current {
            return Ok(connection);
        }

        let _guard = self.lock_connect(token).await?;
        // Another caller may have connected while this one waited for the lock.
        let current = self.connection.read().clone();
        match current {
            Some(connection) => Ok(connection),
            None => self.open_connection(token).await,
        }
    }

    async fn get_connection(&self, token: &CancellationToken) -> Result<Arc<dyn BrokerConnection>> {
        if token.is_cancelled() {
            return Err(ChannelError::Cancelled);
        }

        let connection = self.current_or_connect(token).await?;
        if connection.is_open() {
            tracing::trace!("Existing connection is open and will be used");
            return Ok(connection);
        }
        tracing::info!("The existing connection is not open");

        if let Some(reason) = connection.close_reason() {
            if reason.is_application_initiated() {
                tracing::info!(reason = %reason, "Connection was closed by the application and will not be recovered");
                connection.dispose();
                return Err(ChannelError::availability(
                    "connection was closed by the application; reconnect explicitly to create channels",
                ));
            }
        }

        let Some(recovery) = connection.recovery() else {
            tracing::info!("Connection is not recoverable");
            connection.dispose();
            return Err(ChannelError::availability(
                "the closed connection does not support recovery",
            ));
        };

        tracing::debug!("Connection is recoverable, waiting for recovery");
        let listener = recovery.subscribe();
        if connection.is_open() {
            return Ok(connection);
        }
        listener.wait(token).await?;
        tracing::info!("Connection has been recovered");
        Ok(connection)
    }
}

impl Drop for ChannelFactory {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl std::fmt::Debug for ChannelFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelFactory")
            .field("connected", &self.is_connected())
            .field("channels", &self.tracked_channel_count())
            .field("disposed", &self.disposed.load(Ordering::SeqCst))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::ShutdownInitiator;
    use crate::testing::InMemoryConnectionFactory;
    use std::time::Duration;

    fn factory_with(broker: &Arc<InMemoryConnectionFactory>) -> ChannelFactory {
        ChannelFactory::new(broker.clone(), Arc::new(ClientConfiguration::default()))
    }

    /// Takes `delay` to answer before handing over to the in-memory broker.
    struct SlowConnectionFactory {
        inner: Arc<InMemoryConnectionFactory>,
        delay: Duration,
    }

    #[async_trait::async_trait]
    impl ConnectionFactory for SlowConnectionFactory {
        async fn create_connection(
            &self,
            config: &ClientConfiguration,
        ) -> Result<Arc<dyn BrokerConnection>> {
            tokio::time::sleep(self.delay).await;
            self.inner.create_connection(config).await
        }
    }

    fn slow_factory(broker: &Arc<InMemoryConnectionFactory>) -> Arc<ChannelFactory> {
        let slow = SlowConnectionFactory {
            inner: broker.clone(),
            delay: Duration::from_millis(50),
        };
        Arc::new(ChannelFactory::new(
            Arc::new(slow),
            Arc::new(ClientConfiguration::default()),
        ))
    }

    #[tokio::test]
    async fn test_create_channel_connects_lazily() {
        let broker = Arc::new(InMemoryConnectionFactory::new());
        let factory = factory_with(&broker);
        assert!(!factory.is_connected());

        let token = CancellationToken::new();
        factory.create_channel(&token).await.unwrap();
        factory.create_channel(&token).await.unwrap();

        assert!(factory.is_connected());
        assert_eq!(broker.connection_count(), 1);
        assert_eq!(factory.tracked_channel_count(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_channels_share_one_connection() {
        let broker = Arc::new(InMemoryConnectionFactory::new());
        let factory = Arc::new(factory_with(&broker));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let factory = factory.clone();
            handles.push(tokio::spawn(async move {
                factory.create_channel(&CancellationToken::new()).await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(broker.connection_count(), 1);
        assert_eq!(factory.tracked_channel_count(), 8);
    }

    #[tokio::test]
    async fn test_unreachable_broker_fails_fast() {
        let broker = Arc::new(InMemoryConnectionFactory::new());
        broker.set_unreachable(true);
        let factory = factory_with(&broker);

        let err = factory.connect(&CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, ChannelError::BrokerUnreachable(_)));
        assert!(!factory.is_connected());
        assert_eq!(broker.connection_count(), 0);
    }

    #[tokio::test]
    async fn test_cancelled_token_fails_before_io() {
        let broker = Arc::new(InMemoryConnectionFactory::new());
        let factory = factory_with(&broker);
        let token = CancellationToken::new();
        token.cancel();

        let err = factory.create_channel(&token).await.unwrap_err();
        assert!(err.is_cancelled());
        assert_eq!(broker.connection_count(), 0);
    }

    #[tokio::test]
    async fn test_application_closed_connection_is_terminal() {
        let broker = Arc::new(InMemoryConnectionFactory::new());
        let factory = factory_with(&broker);
        let token = CancellationToken::new();
        factory.connect(&token).await.unwrap();

        let connection = broker.last_connection().unwrap();
        connection.close(ShutdownInitiator::Application);

        let err = factory.create_channel(&token).await.unwrap_err();
        assert!(matches!(err, ChannelError::ChannelAvailability(_)));
        assert!(connection.is_disposed());
        assert_eq!(connection.recovery_listener_count(), 0);

        // Still terminal on the next attempt; no implicit reconnect.
        let err = factory.create_channel(&token).await.unwrap_err();
        assert!(matches!(err, ChannelError::ChannelAvailability(_)));
        assert_eq!(broker.connection_count(), 1);

        factory.connect(&token).await.unwrap();
        factory.create_channel(&token).await.unwrap();
        assert_eq!(broker.connection_count(), 2);
    }

    #[tokio::test]
    async fn test_non_recoverable_connection_fails() {
        let broker = Arc::new(InMemoryConnectionFactory::new());
        broker.set_recoverable(false);
        let factory = factory_with(&broker);
        let token = CancellationToken::new();
        factory.connect(&token).await.unwrap();

        let connection = broker.last_connection().unwrap();
        connection.close(ShutdownInitiator::Peer);

        let err = factory.create_channel(&token).await.unwrap_err();
        assert!(matches!(err, ChannelError::ChannelAvailability(_)));
        assert!(connection.is_disposed());
    }

    #[tokio::test]
    async fn test_waits_for_recovery() {
        let broker = Arc::new(InMemoryConnectionFactory::new());
        let factory = Arc::new(factory_with(&broker));
        let token = CancellationToken::new();
        factory.connect(&token).await.unwrap();

        let connection = broker.last_connection().unwrap();
        connection.close(ShutdownInitiator::Peer);

        let waiter = {
            let factory = factory.clone();
            tokio::spawn(async move { factory.create_channel(&CancellationToken::new()).await })
        };
        while connection.recovery_listener_count() == 0 {
            tokio::task::yield_now().await;
        }

        assert_eq!(connection.recover(), 1);
        waiter.await.unwrap().unwrap();
        assert_eq!(connection.recovery_listener_count(), 0);
        assert_eq!(broker.connection_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovery_wait_is_cancellable() {
        let broker = Arc::new(InMemoryConnectionFactory::new());
        let factory = factory_with(&broker);
        let token = CancellationToken::new();
        factory.connect(&token).await.unwrap();

        let connection = broker.last_connection().unwrap();
        connection.close(ShutdownInitiator::Library);

        let cancel = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            cancel.cancel();
        });

        let err = factory.create_channel(&token).await.unwrap_err();
        assert!(err.is_cancelled());
        assert_eq!(connection.recovery_listener_count(), 0);
        assert_eq!(factory.tracked_channel_count(), 0);
    }

    #[tokio::test]
    async fn test_dispose_releases_channels_then_connection() {
        let broker = Arc::new(InMemoryConnectionFactory::new());
        let factory = factory_with(&broker);
        let token = CancellationToken::new();
        factory.create_channel(&token).await.unwrap();
        factory.create_channel(&token).await.unwrap();

        let connection = broker.last_connection().unwrap();
        let channels = connection.channels();

        factory.dispose();
        factory.dispose();

        assert!(channels.iter().all(|c| c.is_disposed()));
        assert!(connection.is_disposed());
        assert_eq!(factory.tracked_channel_count(), 0);

        let err = factory.create_channel(&token).await.unwrap_err();
        assert!(matches!(err, ChannelError::ChannelAvailability(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_dispose_while_connecting_releases_connection() {
        let broker = Arc::new(InMemoryConnectionFactory::new());
        let factory = slow_factory(&broker);

        let pending = {
            let factory = factory.clone();
            tokio::spawn(async move { factory.create_channel(&CancellationToken::new()).await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        factory.dispose();

        let err = pending.await.unwrap().unwrap_err();
        assert!(matches!(err, ChannelError::ChannelAvailability(_)));
        assert!(broker.last_connection().unwrap().is_disposed());
        assert!(!factory.is_connected());
        assert_eq!(factory.tracked_channel_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_while_connecting() {
        let broker = Arc::new(InMemoryConnectionFactory::new());
        let factory = slow_factory(&broker);
        let token = CancellationToken::new();

        let cancel = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            cancel.cancel();
        });

        let err = factory.create_channel(&token).await.unwrap_err();
        assert!(err.is_cancelled());
        assert_eq!(broker.connection_count(), 0);
        assert!(!factory.is_connected());

        // A later caller is not blocked by the abandoned attempt.
        factory.create_channel(&CancellationToken::new()).await.unwrap();
        assert_eq!(broker.connection_count(), 1);
    }

    #[tokio::test]
    async fn test_release_disposes_and_untracks() {
        let broker = Arc::new(InMemoryConnectionFactory::new());
        let factory = factory_with(&broker);
        let token = CancellationToken::new();
        let first = factory.create_channel(&token).await.unwrap();
        let second = factory.create_channel(&token).await.unwrap();

        factory.release(&first);

        assert!(!first.is_open());
        assert!(second.is_open());
        assert_eq!(factory.tracked_channel_count(), 1);
    }

    #[tokio::test]
    async fn test_connect_replaces_existing_connection() {
        let broker = Arc::new(InMemoryConnectionFactory::new());
        let factory = factory_with(&broker);
        let token = CancellationToken::new();

        factory.connect(&token).await.unwrap();
        let first = broker.last_connection().unwrap();
        factory.connect(&token).await.unwrap();

        assert!(first.is_disposed());
        assert_eq!(broker.connection_count(), 2);
        assert!(factory.is_connected());
    }
}
