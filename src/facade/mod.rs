//! Store facades
//!
//! A store is a named wrapper around one [`ObservableState`] that exposes
//! intention-revealing methods (`close_microphone()`, `request_connection()`)
//! instead of raw `update` calls. Views only read and subscribe; the facade is
//! the only writer.
//!
//! Keyed stores are handed out by a [`StoreRegistry`](crate::registry::StoreRegistry)
//! (one per live room), process-wide stores by a
//! [`SharedStore`](crate::registry::SharedStore).

pub mod battle;
pub mod co_guest;
pub mod co_host;
pub mod device;

use thiserror::Error;

use crate::selector::Selector;
use crate::state::{ObservableState, StateStream, Subscription};

pub use battle::{BattleState, BattleStore};
pub use co_guest::{CoGuestState, CoGuestStore};
pub use co_host::{CoHostState, CoHostStore, HostUser};
pub use device::{AudioRoute, DeviceState, DeviceStatus, DeviceStore};

/// Reasons a facade refuses a transition
///
/// Returned inside [`StateError::Rejected`](crate::StateError::Rejected); the
/// state is left as it was.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RoomError {
    #[error("user {0} is already connected")]
    AlreadyConnected(String),

    #[error("user {0} is not connected")]
    NotConnected(String),

    #[error("an application is already pending")]
    AlreadyApplying,

    #[error("no application is pending")]
    NotApplying,

    #[error("battle {0} is already running")]
    BattleInProgress(String),

    #[error("battle {0} is not running")]
    NoSuchBattle(String),
}

/// A facade over one observable container
pub trait Store: Send + Sync + 'static {
    /// The state type of the wrapped container
    type State: Clone + Send + Sync + 'static;

    /// The wrapped container
    fn state(&self) -> &ObservableState<Self::State>;

    /// Copy of the current state
    fn value(&self) -> Self::State {
        self.state().value()
    }

    /// Subscribe to a slice of the state on the container's default executor
    fn subscribe<V, F>(&self, selector: Selector<Self::State, V>, callback: F) -> Subscription
    where
        V: Clone + Send + 'static,
        F: Fn(V) + Send + Sync + 'static,
    {
        self.state().subscribe(selector, callback)
    }

    /// Stream of a slice of the state
    fn watch<V>(&self, selector: Selector<Self::State, V>) -> StateStream<V>
    where
        V: Clone + Send + 'static,
    {
        self.state().watch(selector)
    }

    /// Called once when the owning registry drops this store
    fn on_retire(&self) {}
}
