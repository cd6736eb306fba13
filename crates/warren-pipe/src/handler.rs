//! Message handler signature.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use warren_channel::Delivery;

use crate::acknowledgement::Acknowledgement;

/// Future returned by a [`MessageHandler`].
pub type HandlerFuture = Pin<Box<dyn Future<Output = Acknowledgement> + Send>>;

/// Handles one delivery and decides how it is acknowledged.
pub type MessageHandler = Arc<dyn Fn(Delivery) -> HandlerFuture + Send + Sync>;

/// Wrap an async closure as a [`MessageHandler`].
pub fn message_handler<F, Fut>(handler: F) -> MessageHandler
where
    F: Fn(Delivery) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Acknowledgement> + Send + 'static,
{
    Arc::new(move |delivery| Box::pin(handler(delivery)))
}
