//! Event posting into the controller loop
//!
//! Stream callbacks and spawned lookups never touch state directly; they post
//! a tagged event through an [`EventSink`] and the owner applies it.

use std::fmt;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::trace;

/// Cloneable handle that posts events of one kind
pub struct EventSink<E> {
    post: Arc<dyn Fn(E) + Send + Sync>,
}

impl<E: Send + 'static> EventSink<E> {
    pub fn new(post: impl Fn(E) + Send + Sync + 'static) -> Self {
        Self {
            post: Arc::new(post),
        }
    }

    /// Post into a channel of a wider event type
    ///
    /// Posting after the receiver is gone is silently dropped; the loop has
    /// already shut down.
    pub fn forward<T: Send + 'static>(tx: mpsc::UnboundedSender<T>, wrap: fn(E) -> T) -> Self {
        Self::new(move |event| {
            if tx.send(wrap(event)).is_err() {
                trace!("Event dropped after loop shutdown");
            }
        })
    }

    /// Sink paired with a receiver of the same event type
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<E>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::forward(tx, |event| event), rx)
    }

    pub fn post(&self, event: E) {
        (self.post)(event)
    }
}

impl<E> Clone for EventSink<E> {
    fn clone(&self) -> Self {
        Self {
            post: self.post.clone(),
        }
    }
}

impl<E> fmt::Debug for EventSink<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("EventSink")
    }
}
