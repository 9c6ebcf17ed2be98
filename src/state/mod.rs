//! Observable state containers
//!
//! An [`ObservableState<T>`] is the single source of truth for one feature
//! module. Writers call [`update`](ObservableState::update) from any thread;
//! readers call [`subscribe`](ObservableState::subscribe) with a
//! [`Selector`](crate::selector::Selector) and get the current projection at
//! once, then one delivery per update that changed it.
//!
//! # Invariants
//!
//! 1. Updates on one container are serialized; `value()` after update N
//!    reflects exactly updates 1..=N.
//! 2. A reducer that panics or returns `Err` leaves the value untouched and
//!    notifies nobody.
//! 3. A subscriber gets at most one delivery per update, and its deliveries
//!    arrive in update order.
//! 4. A cancelled subscription gets no further deliveries, including ones
//!    already posted to its executor.
//! 5. Subscriptions never keep their container alive.

mod config;
mod observable;
mod slot;
mod stream;
mod subscription;

pub(crate) use slot::{deliver, Callback};

pub use config::StateConfig;
pub use observable::{Notify, ObservableState};
pub use stream::StateStream;
pub use subscription::{Subscription, SubscriptionBag, SubscriptionId};
