//! Audience members taking a seat in one live room

use crate::error::Result;
use crate::registry::{RegistryConfig, StoreRegistry};
use crate::selector::Selector;
use crate::state::{ObservableState, StateConfig};

use super::{RoomError, Store};

/// Co-guest state of one room
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CoGuestState {
    /// User ids on a seat, in arrival order
    pub connected: Vec<String>,
    /// True while the local user waits for the host's answer
    pub is_applying: bool,
}

/// Facade over the co-guest state of one live room
#[derive(Debug)]
pub struct CoGuestStore {
    live_id: String,
    state: ObservableState<CoGuestState>,
}

impl CoGuestStore {
    /// An empty co-guest store for `live_id`, labeled `co_guest:<live_id>` in logs
    pub fn new(live_id: impl Into<String>) -> Self {
        let live_id = live_id.into();
        let config = StateConfig::labeled(format!("co_guest:{}", live_id));
        Self::with_config(live_id, config)
    }

    pub fn with_config(live_id: impl Into<String>, config: StateConfig) -> Self {
        Self {
            live_id: live_id.into(),
            state: ObservableState::with_config(CoGuestState::default(), config),
        }
    }

    /// A registry building one store per live id
    pub fn registry() -> StoreRegistry<String, CoGuestStore> {
        StoreRegistry::with_config(
            |live_id: &String| CoGuestStore::new(live_id.clone()),
            RegistryConfig::default().label("co_guest"),
        )
    }

    /// The room this store belongs to
    pub fn live_id(&self) -> &str {
        &self.live_id
    }

    /// Selector over the seated users
    pub fn connected() -> Selector<CoGuestState, Vec<String>> {
        Selector::path(|s: &CoGuestState| &s.connected)
    }

    /// Selector over the number of seated users
    pub fn seat_count() -> Selector<CoGuestState, usize> {
        Selector::map(|s: &CoGuestState| s.connected.len())
    }

    /// Ask the host for a seat; fails while an application is pending
    pub fn apply_for_seat(&self) -> Result<()> {
        self.state.try_update(|s| {
            if s.is_applying {
                return Err(RoomError::AlreadyApplying);
            }
            s.is_applying = true;
            Ok(())
        })
    }

    /// Withdraw the pending application
    pub fn cancel_application(&self) -> Result<()> {
        self.state.try_update(|s| {
            if !s.is_applying {
                return Err(RoomError::NotApplying);
            }
            s.is_applying = false;
            Ok(())
        })
    }

    /// The host accepted `user_id`; clears the local application
    pub fn on_accepted(&self, user_id: &str) -> Result<()> {
        self.state.update(|s| {
            if !s.connected.iter().any(|u| u == user_id) {
                s.connected.push(user_id.to_string());
            }
            s.is_applying = false;
        })
    }

    /// A seated user left; fails if `user_id` held no seat
    pub fn on_guest_left(&self, user_id: &str) -> Result<()> {
        self.state.try_update(|s| {
            let before = s.connected.len();
            s.connected.retain(|u| u != user_id);
            if s.connected.len() == before {
                return Err(RoomError::NotConnected(user_id.to_string()));
            }
            Ok(())
        })
    }

    /// Clear everything when the local user leaves the room
    pub fn leave(&self) {
        self.state.reset();
    }
}

impl Store for CoGuestStore {
    type State = CoGuestState;

    fn state(&self) -> &ObservableState<CoGuestState> {
        &self.state
    }

    fn on_retire(&self) {
        self.leave();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;

    #[test]
    fn test_apply_accept_leave() {
        let store = CoGuestStore::new("live_1");
        let counts = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&counts);
        let _sub = store.subscribe(CoGuestStore::seat_count(), move |n| {
            sink.lock().unwrap().push(n)
        });

        store.apply_for_seat().unwrap();
        assert!(store.value().is_applying);
        assert_eq!(
            store.apply_for_seat().unwrap_err().rejection::<RoomError>(),
            Some(&RoomError::AlreadyApplying)
        );

        store.on_accepted("guest_1").unwrap();
        store.on_accepted("guest_2").unwrap();
        store.on_guest_left("guest_1").unwrap();

        assert!(!store.value().is_applying);
        assert_eq!(store.value().connected, vec!["guest_2".to_string()]);
        assert_eq!(*counts.lock().unwrap(), vec![0, 1, 2, 1]);
    }

    #[test]
    fn test_cancel_without_application() {
        let store = CoGuestStore::new("live_1");
        assert!(store.cancel_application().is_err());

        store.apply_for_seat().unwrap();
        store.cancel_application().unwrap();
        assert!(!store.value().is_applying);
    }

    #[test]
    fn test_unknown_guest_left() {
        let store = CoGuestStore::new("live_1");
        let err = store.on_guest_left("ghost").unwrap_err();
        assert_eq!(
            err.rejection::<RoomError>(),
            Some(&RoomError::NotConnected("ghost".into()))
        );
    }

    #[test]
    fn test_leave_notifies() {
        let store = CoGuestStore::new("live_1");
        store.on_accepted("guest_1").unwrap();

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let _sub = store.subscribe(CoGuestStore::connected(), move |v| {
            sink.lock().unwrap().push(v)
        });

        store.leave();
        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert!(seen[1].is_empty());
    }
}
