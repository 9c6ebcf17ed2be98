//! Subscription handles
//!
//! A [`Subscription`] is the cancellation handle returned by every subscribe
//! call. Dropping it cancels. A view keeps its handles in a
//! [`SubscriptionBag`] so they are all disposed together with the view.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};

/// Identifier of a subscription within its container
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(pub(crate) u64);

impl SubscriptionId {
    /// Raw numeric id
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Removes a subscriber from whatever owns it
pub(crate) trait Detach: Send + Sync {
    fn detach(&self, id: SubscriptionId);
}

enum Teardown {
    /// Weak back-reference to the owning container
    Container(Weak<dyn Detach>),
    /// Task forwarding a stream to a callback
    Task(tokio::task::AbortHandle),
    Nothing,
}

/// Cancellation handle for one subscription
///
/// Cancelling is idempotent and safe after the container is gone. A delivery
/// that was already posted to an executor when the handle was cancelled is
/// skipped when it runs.
pub struct Subscription {
    id: SubscriptionId,
    live: Arc<AtomicBool>,
    teardown: Mutex<Teardown>,
}

impl Subscription {
    pub(crate) fn attached(
        id: SubscriptionId,
        live: Arc<AtomicBool>,
        owner: Weak<dyn Detach>,
    ) -> Self {
        Self {
            id,
            live,
            teardown: Mutex::new(Teardown::Container(owner)),
        }
    }

    pub(crate) fn task(
        id: SubscriptionId,
        live: Arc<AtomicBool>,
        handle: tokio::task::AbortHandle,
    ) -> Self {
        Self {
            id,
            live,
            teardown: Mutex::new(Teardown::Task(handle)),
        }
    }

    /// A handle that is already cancelled
    pub fn empty() -> Self {
        Self {
            id: SubscriptionId(0),
            live: Arc::new(AtomicBool::new(false)),
            teardown: Mutex::new(Teardown::Nothing),
        }
    }

    /// Subscription id
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Returns true until the subscription is cancelled
    pub fn is_active(&self) -> bool {
        self.live.load(Ordering::Acquire)
    }

    /// Stop further deliveries and detach from the owner
    pub fn cancel(&self) {
        if !self.live.swap(false, Ordering::AcqRel) {
            return;
        }

        let teardown = std::mem::replace(
            &mut *self.teardown.lock().unwrap_or_else(PoisonError::into_inner),
            Teardown::Nothing,
        );

        match teardown {
            Teardown::Container(owner) => {
                if let Some(owner) = owner.upgrade() {
                    owner.detach(self.id);
                }
            }
            Teardown::Task(handle) => handle.abort(),
            Teardown::Nothing => {}
        }
    }

    /// Move the handle into a bag owned by the subscriber
    pub fn store_in(self, bag: &mut SubscriptionBag) {
        bag.insert(self);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("active", &self.is_active())
            .finish()
    }
}

/// A set of subscriptions cancelled together
///
/// Dropping the bag cancels every handle in it.
#[derive(Debug, Default)]
pub struct SubscriptionBag {
    subscriptions: Vec<Subscription>,
}

impl SubscriptionBag {
    /// Create an empty bag
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a handle
    pub fn insert(&mut self, subscription: Subscription) {
        self.subscriptions.push(subscription);
    }

    /// Number of handles held
    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    /// Returns true if no handles are held
    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }

    /// Number of handles that are still active
    pub fn active_count(&self) -> usize {
        self.subscriptions.iter().filter(|s| s.is_active()).count()
    }

    /// Cancel and drop every handle
    pub fn clear(&mut self) {
        for subscription in self.subscriptions.drain(..) {
            subscription.cancel();
        }
    }
}

impl Extend<Subscription> for SubscriptionBag {
    fn extend<I: IntoIterator<Item = Subscription>>(&mut self, iter: I) {
        self.subscriptions.extend(iter);
    }
}

impl FromIterator<Subscription> for SubscriptionBag {
    fn from_iter<I: IntoIterator<Item = Subscription>>(iter: I) -> Self {
        Self {
            subscriptions: iter.into_iter().collect(),
        }
    }
}
