//! The observable state container
//!
//! [`ObservableState<T>`] owns one canonical `T` and the list of subscribers
//! watching slices of it.
//!
//! # Update path
//!
//! ```text
//!  update(reduce)
//!    │ lock slots (serializes writers)
//!    │ draft = current.clone(); reduce(&mut draft)   ── panic/Err ──► rollback, Err
//!    │ current = Arc::new(draft); version += 1
//!    │ for each live slot: changed? ──► outbox.push(delivery)
//!    │ unlock
//!    └ outbox.flush() ──► executors, in push order
//! ```
//!
//! Readers never see a draft: `current` is swapped in whole, and every read
//! returns an `Arc<T>` snapshot or a clone of one.

use std::convert::Infallible;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, TryLockError, Weak};

use tokio::sync::mpsc;

use crate::error::{panic_message, BoxError, Result, StateError};
use crate::executor::{ExecutorRef, Inline, Outbox};
use crate::selector::Selector;

use super::config::StateConfig;
use super::slot::{SelectorSlot, Slot};
use super::stream::StateStream;
use super::subscription::{Detach, Subscription, SubscriptionId};

/// Whether a committed update evaluates subscribers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Notify {
    /// Evaluate every subscriber and deliver changed projections
    #[default]
    Subscribers,
    /// Swap the value in without evaluating anyone
    ///
    /// Subscribers keep their last delivered projection, so the next
    /// notifying update is diffed against what they actually saw.
    Silent,
}

type Slots<T> = Vec<Box<dyn Slot<T>>>;

struct Inner<T> {
    current: RwLock<Arc<T>>,
    /// Subscriber slots; holding this lock is what serializes writers
    slots: Mutex<Slots<T>>,
    outbox: Outbox,
    version: AtomicU64,
    next_id: AtomicU64,
    config: StateConfig,
}

impl<T> Inner<T> {
    fn lock_slots(&self) -> MutexGuard<'_, Slots<T>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn snapshot(&self) -> Arc<T> {
        Arc::clone(&self.current.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Swap in `next` and queue deliveries; caller holds the slots lock
    fn publish(&self, slots: &mut Slots<T>, next: T, notify: Notify) -> (u64, usize) {
        let next = Arc::new(next);
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Arc::clone(&next);
        let version = self.version.fetch_add(1, Ordering::AcqRel) + 1;

        slots.retain(|slot| slot.is_live());
        let mut queued = 0;
        if notify == Notify::Subscribers {
            for slot in slots.iter_mut() {
                if let Some(delivery) = slot.evaluate(&next) {
                    self.outbox.push(delivery);
                    queued += 1;
                }
            }
        }

        (version, queued)
    }
}

impl<T: Send + Sync + 'static> Detach for Inner<T> {
    fn detach(&self, id: SubscriptionId) {
        // The handle may be dropped while this container is mid-update (from a
        // reducer, or on another thread). Its live flag is already cleared, so
        // the slot is inert and the next update prunes it.
        let mut slots = match self.slots.try_lock() {
            Ok(slots) => slots,
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
            Err(TryLockError::WouldBlock) => {
                tracing::trace!(
                    state = %self.config.label,
                    subscription = %id,
                    "Container busy, slot will be pruned on next update"
                );
                return;
            }
        };

        slots.retain(|slot| slot.id() != id);
        tracing::debug!(
            state = %self.config.label,
            subscription = %id,
            subscribers = slots.len(),
            "Subscription removed"
        );
    }
}

/// Reactive container for one feature module's state
///
/// Cloning the handle shares the container.
pub struct ObservableState<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for ObservableState<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Clone + Send + Sync + 'static> ObservableState<T> {
    /// Create a container with default configuration
    pub fn new(initial: T) -> Self {
        Self::with_config(initial, StateConfig::default())
    }

    /// Create a container with custom configuration
    pub fn with_config(initial: T, config: StateConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                current: RwLock::new(Arc::new(initial)),
                slots: Mutex::new(Vec::new()),
                outbox: Outbox::new(),
                version: AtomicU64::new(0),
                next_id: AtomicU64::new(1),
                config,
            }),
        }
    }

    /// Get the container configuration
    pub fn config(&self) -> &StateConfig {
        &self.inner.config
    }

    /// Container label
    pub fn label(&self) -> &str {
        &self.inner.config.label
    }

    /// Copy of the current value
    pub fn value(&self) -> T {
        T::clone(&self.inner.snapshot())
    }

    /// Shared snapshot of the current value
    pub fn snapshot(&self) -> Arc<T> {
        self.inner.snapshot()
    }

    /// Read the current value without cloning it
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.inner.snapshot())
    }

    /// Number of committed updates, silent ones included
    pub fn version(&self) -> u64 {
        self.inner.version.load(Ordering::Acquire)
    }

    /// Mutate the state and notify subscribers
    ///
    /// `reduce` runs on a draft copy. If it panics the draft is discarded and
    /// the panic is returned as [`StateError::ReducerPanicked`]. `reduce` must
    /// not call back into this container.
    pub fn update(&self, reduce: impl FnOnce(&mut T)) -> Result<()> {
        self.update_with(Notify::Subscribers, reduce)
    }

    /// Mutate the state, choosing whether subscribers are evaluated
    pub fn update_with(&self, notify: Notify, reduce: impl FnOnce(&mut T)) -> Result<()> {
        self.commit(notify, |draft| {
            reduce(draft);
            Ok::<(), Infallible>(())
        })
    }

    /// Mutate the state with a reducer that may refuse
    ///
    /// An `Err` from `reduce` discards the draft and is returned as
    /// [`StateError::Rejected`]; subscribers see nothing.
    pub fn try_update<R, E>(
        &self,
        reduce: impl FnOnce(&mut T) -> std::result::Result<R, E>,
    ) -> Result<R>
    where
        E: Into<BoxError>,
    {
        self.commit(Notify::Subscribers, reduce)
    }

    /// Replace the whole value and notify subscribers
    pub fn replace(&self, value: T) {
        self.replace_with(Notify::Subscribers, value)
    }

    /// Replace the whole value, choosing whether subscribers are evaluated
    pub fn replace_with(&self, notify: Notify, value: T) {
        let (version, queued) = {
            let mut slots = self.inner.lock_slots();
            self.inner.publish(&mut slots, value, notify)
        };

        tracing::trace!(
            state = %self.inner.config.label,
            version = version,
            deliveries = queued,
            silent = notify == Notify::Silent,
            "State replaced"
        );

        self.inner.outbox.flush();
    }

    /// Restore the default value and notify subscribers
    pub fn reset(&self)
    where
        T: Default,
    {
        self.replace(T::default())
    }

    /// Restore the default value without notifying anyone
    pub fn reset_silently(&self)
    where
        T: Default,
    {
        self.replace_with(Notify::Silent, T::default())
    }

    fn commit<R, E>(
        &self,
        notify: Notify,
        reduce: impl FnOnce(&mut T) -> std::result::Result<R, E>,
    ) -> Result<R>
    where
        E: Into<BoxError>,
    {
        let inner = &self.inner;

        let (value, version, queued) = {
            let mut slots = inner.lock_slots();
            let mut draft = T::clone(&inner.snapshot());

            let value = match panic::catch_unwind(AssertUnwindSafe(|| reduce(&mut draft))) {
                Ok(Ok(value)) => value,
                Ok(Err(err)) => {
                    let err = StateError::Rejected(err.into());
                    tracing::warn!(
                        state = %inner.config.label,
                        error = %err,
                        "Update rejected, state unchanged"
                    );
                    return Err(err);
                }
                Err(payload) => {
                    let message = panic_message(payload.as_ref());
                    tracing::warn!(
                        state = %inner.config.label,
                        panic = %message,
                        "Reducer panicked, state unchanged"
                    );
                    return Err(StateError::ReducerPanicked { message });
                }
            };

            let (version, queued) = inner.publish(&mut slots, draft, notify);
            (value, version, queued)
        };

        tracing::trace!(
            state = %inner.config.label,
            version = version,
            deliveries = queued,
            silent = notify == Notify::Silent,
            "State updated"
        );

        inner.outbox.flush();
        Ok(value)
    }

    /// Subscribe on the container's default executor
    ///
    /// The current projection is delivered right away, before any later
    /// update's notification.
    pub fn subscribe<V, F>(&self, selector: Selector<T, V>, callback: F) -> Subscription
    where
        V: Clone + Send + 'static,
        F: Fn(V) + Send + Sync + 'static,
    {
        let executor = self.inner.config.executor.clone();
        self.subscribe_on(selector, executor, callback)
    }

    /// Subscribe with deliveries posted to `executor`
    pub fn subscribe_on<V, F>(
        &self,
        selector: Selector<T, V>,
        executor: impl Into<ExecutorRef>,
        callback: F,
    ) -> Subscription
    where
        V: Clone + Send + 'static,
        F: Fn(V) + Send + Sync + 'static,
    {
        let inner = &self.inner;
        let id = SubscriptionId(inner.next_id.fetch_add(1, Ordering::Relaxed));
        let live = Arc::new(AtomicBool::new(true));

        let mut slot = SelectorSlot::new(
            id,
            selector,
            executor.into(),
            Arc::new(callback),
            Arc::clone(&live),
            Arc::clone(&inner.config.label),
        );

        {
            let mut slots = inner.lock_slots();
            if let Some(delivery) = slot.evaluate(&inner.snapshot()) {
                inner.outbox.push(delivery);
            }
            slots.push(Box::new(slot));

            tracing::debug!(
                state = %inner.config.label,
                subscription = %id,
                subscribers = slots.len(),
                "Subscription added"
            );
        }

        inner.outbox.flush();

        let owner: Weak<dyn Detach> = Arc::downgrade(inner) as Weak<Inner<T>>;
        Subscription::attached(id, live, owner)
    }

    /// Stream of the selected projection, starting with its current value
    pub fn watch<V>(&self, selector: Selector<T, V>) -> StateStream<V>
    where
        V: Clone + Send + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        let subscription = self.subscribe_on(selector, Inline, move |value| {
            // Receiver gone means the stream was dropped; its handle cancels us
            let _ = tx.send(value);
        });

        StateStream::new(rx, subscription)
    }

    /// Cancel a subscription; idempotent
    pub fn unsubscribe(&self, subscription: &Subscription) {
        subscription.cancel();
    }

    /// Number of active subscriptions
    pub fn subscriber_count(&self) -> usize {
        self.inner
            .lock_slots()
            .iter()
            .filter(|slot| slot.is_live())
            .count()
    }

    /// Returns true if both handles share one container
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl<T: Clone + Default + Send + Sync + 'static> Default for ObservableState<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: fmt::Debug> fmt::Debug for ObservableState<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObservableState")
            .field("label", &self.inner.config.label)
            .field("version", &self.inner.version.load(Ordering::Acquire))
            .field("value", &self.inner.snapshot())
            .finish()
    }
}
