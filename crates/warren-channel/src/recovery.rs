//! One-shot recovery notification.
//!
//! A [`RecoveryEvent`] is fired by the broker client each time it has
//! re-established a connection or channel. Waiters subscribe a listener
//! *before* re-checking the resource state, then await it. Every listener
//! resolves at most once; firing again after that reaches nobody.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use crate::error::{ChannelError, Result};

#[derive(Debug, Default)]
struct RecoveryInner {
    next_id: AtomicU64,
    listeners: Mutex<HashMap<u64, oneshot::Sender<()>>>,
}

/// Recovery-completed event shared between a broker resource and its waiters.
#[derive(Debug, Clone, Default)]
pub struct RecoveryEvent {
    inner: Arc<RecoveryInner>,
}

impl RecoveryEvent {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener for the next firing.
    pub fn subscribe(&self) -> RecoveryListener {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let (sender, receiver) = oneshot::channel();
        self.inner.listeners.lock().insert(id, sender);
        RecoveryListener {
            id,
            receiver,
            event: self.clone(),
        }
    }

    /// Notify and remove every registered listener.
    ///
    /// Returns the number of listeners that were still waiting.
    pub fn fire(&self) -> usize {
        let listeners: Vec<_> = self.inner.listeners.lock().drain().map(|(_, s)| s).collect();
        listeners
            .into_iter()
            .filter_map(|sender| sender.send(()).ok())
            .count()
    }

    /// Number of listeners currently registered.
    pub fn listener_count(&self) -> usize {
        self.inner.listeners.lock().len()
    }

    fn deregister(&self, id: u64) {
        self.inner.listeners.lock().remove(&id);
    }
}

/// A single registration on a [`RecoveryEvent`].
///
/// Dropping the listener removes the registration, so neither the
/// success nor the cancellation path leaves a stale entry behind.
#[derive(Debug)]
pub struct RecoveryListener {
    id: u64,
    receiver: oneshot::Receiver<()>,
    event: RecoveryEvent,
}

impl RecoveryListener {
    /// Suspend until the event fires or `token` is cancelled.
    pub async fn wait(mut self, token: &CancellationToken) -> Result<()> {
        tokio::select! {
            biased;
            _ = token.cancelled() => Err(ChannelError::Cancelled),
            fired = &mut self.receiver => fired.map_err(|_| {
                ChannelError::availability("recovery event was dropped before firing")
            }),
        }
    }
}

impl Drop for RecoveryListener {
    fn drop(&mut self) {
        self.event.deregister(self.id);
    }
}
