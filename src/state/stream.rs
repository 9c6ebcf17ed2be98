//! Stream view of a selector subscription

use std::fmt;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures::Stream;
use tokio::sync::mpsc;

use super::subscription::Subscription;

/// Deduplicated projections of a container, as a [`Stream`]
///
/// The first item is the projection at subscribe time. The stream ends when
/// the container is dropped. Dropping the stream cancels the subscription.
pub struct StateStream<V> {
    rx: mpsc::UnboundedReceiver<V>,
    subscription: Subscription,
}

impl<V> StateStream<V> {
    pub(crate) fn new(rx: mpsc::UnboundedReceiver<V>, subscription: Subscription) -> Self {
        Self { rx, subscription }
    }

    /// The underlying subscription handle
    pub fn subscription(&self) -> &Subscription {
        &self.subscription
    }

    /// Cancel the subscription; items already queued can still be read
    pub fn cancel(&self) {
        self.subscription.cancel();
    }

    /// Take the next queued item without waiting
    pub fn try_next_now(&mut self) -> Option<V> {
        self.rx.try_recv().ok()
    }
}

impl<V> Stream for StateStream<V> {
    type Item = V;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<V>> {
        self.get_mut().rx.poll_recv(cx)
    }
}

impl<V> fmt::Debug for StateStream<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateStream")
            .field("subscription", &self.subscription)
            .finish()
    }
}
