//! Type-erased subscriber entries
//!
//! A container holds subscribers with different projection types side by
//! side. Each entry remembers the last projection it delivered and turns a new
//! state value into at most one [`Delivery`].

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::panic_message;
use crate::executor::{Delivery, ExecutorRef};
use crate::selector::Selector;

use super::subscription::SubscriptionId;

pub(crate) type Callback<V> = Arc<dyn Fn(V) + Send + Sync>;

pub(crate) trait Slot<T>: Send {
    fn id(&self) -> SubscriptionId;

    fn is_live(&self) -> bool;

    /// Evaluate against `state`; `Some` if the projection changed
    fn evaluate(&mut self, state: &T) -> Option<Delivery>;
}

pub(crate) struct SelectorSlot<T, V> {
    id: SubscriptionId,
    selector: Selector<T, V>,
    last: Option<V>,
    live: Arc<AtomicBool>,
    executor: ExecutorRef,
    callback: Callback<V>,
    label: Arc<str>,
}

impl<T, V> SelectorSlot<T, V> {
    pub(crate) fn new(
        id: SubscriptionId,
        selector: Selector<T, V>,
        executor: ExecutorRef,
        callback: Callback<V>,
        live: Arc<AtomicBool>,
        label: Arc<str>,
    ) -> Self {
        Self {
            id,
            selector,
            last: None,
            live,
            executor,
            callback,
            label,
        }
    }
}

impl<T, V> Slot<T> for SelectorSlot<T, V>
where
    T: 'static,
    V: Clone + Send + 'static,
{
    fn id(&self) -> SubscriptionId {
        self.id
    }

    fn is_live(&self) -> bool {
        self.live.load(Ordering::Acquire)
    }

    fn evaluate(&mut self, state: &T) -> Option<Delivery> {
        if !self.is_live() {
            return None;
        }

        let value = self.selector.changed(state, self.last.as_ref())?;
        if self.selector.is_equatable() {
            self.last = Some(value.clone());
        }

        let id = self.id;
        let live = Arc::clone(&self.live);
        let callback = Arc::clone(&self.callback);
        let label = Arc::clone(&self.label);

        Some(Delivery {
            executor: self.executor.clone(),
            job: Box::new(move || deliver(&label, id, &live, &callback, value)),
        })
    }
}

pub(crate) fn deliver<V>(
    label: &str,
    id: SubscriptionId,
    live: &AtomicBool,
    callback: &Callback<V>,
    value: V,
) {
    // Cancelled after the delivery was posted
    if !live.load(Ordering::Acquire) {
        tracing::trace!(
            state = %label,
            subscription = %id,
            "Skipping delivery to cancelled subscription"
        );
        return;
    }

    if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| callback(value))) {
        tracing::error!(
            state = %label,
            subscription = %id,
            panic = %panic_message(payload.as_ref()),
            "Subscriber callback panicked"
        );
    }
}
