//! Host-to-host connections of one live room

use crate::error::Result;
use crate::registry::{RegistryConfig, StoreRegistry};
use crate::selector::Selector;
use crate::state::{ObservableState, StateConfig};

use super::{RoomError, Store};

/// Another room's host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostUser {
    /// The room that host runs
    pub live_id: String,
    pub user_id: String,
    /// Display name
    pub name: String,
}

impl HostUser {
    pub fn new(
        live_id: impl Into<String>,
        user_id: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            live_id: live_id.into(),
            user_id: user_id.into(),
            name: name.into(),
        }
    }
}

/// Co-host state of one room
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CoHostState {
    /// Hosts currently connected to this room
    pub connected: Vec<HostUser>,
    /// Hosts invited and not answered yet
    pub invitees: Vec<HostUser>,
    /// True while at least one invitation is pending
    pub is_applying: bool,
}

impl CoHostState {
    fn is_connected(&self, user_id: &str) -> bool {
        self.connected.iter().any(|u| u.user_id == user_id)
    }

    fn sync_applying(&mut self) {
        self.is_applying = !self.invitees.is_empty();
    }
}

/// Facade over the co-host state of one live room
#[derive(Debug)]
pub struct CoHostStore {
    live_id: String,
    state: ObservableState<CoHostState>,
}

impl CoHostStore {
    /// An empty co-host store for `live_id`, labeled `co_host:<live_id>` in logs
    pub fn new(live_id: impl Into<String>) -> Self {
        let live_id = live_id.into();
        let config = StateConfig::labeled(format!("co_host:{}", live_id));
        Self::with_config(live_id, config)
    }

    pub fn with_config(live_id: impl Into<String>, config: StateConfig) -> Self {
        Self {
            live_id: live_id.into(),
            state: ObservableState::with_config(CoHostState::default(), config),
        }
    }

    /// A registry building one store per live id
    pub fn registry() -> StoreRegistry<String, CoHostStore> {
        StoreRegistry::with_config(
            |live_id: &String| CoHostStore::new(live_id.clone()),
            RegistryConfig::default().label("co_host"),
        )
    }

    /// The room this store belongs to
    pub fn live_id(&self) -> &str {
        &self.live_id
    }

    /// Selector over the connected hosts
    pub fn connected() -> Selector<CoHostState, Vec<HostUser>> {
        Selector::path(|s: &CoHostState| &s.connected)
    }

    /// Selector over the pending-invitation flag
    pub fn is_applying() -> Selector<CoHostState, bool> {
        Selector::path(|s: &CoHostState| &s.is_applying)
    }

    /// Invite another host; inviting one twice is a no-op
    pub fn request_connection(&self, host: HostUser) -> Result<()> {
        self.state.try_update(|s| {
            if s.is_connected(&host.user_id) {
                return Err(RoomError::AlreadyConnected(host.user_id.clone()));
            }
            if !s.invitees.iter().any(|u| u.user_id == host.user_id) {
                s.invitees.push(host);
            }
            s.sync_applying();
            Ok(())
        })
    }

    /// The invited host accepted
    pub fn on_connected(&self, host: HostUser) -> Result<()> {
        self.state.update(|s| {
            s.invitees.retain(|u| u.user_id != host.user_id);
            if !s.is_connected(&host.user_id) {
                s.connected.push(host);
            }
            s.sync_applying();
        })
    }

    /// An invitation was withdrawn, rejected or timed out
    pub fn on_invitation_cancelled(&self, user_id: &str) -> Result<()> {
        self.state.try_update(|s| {
            let before = s.invitees.len();
            s.invitees.retain(|u| u.user_id != user_id);
            if s.invitees.len() == before {
                return Err(RoomError::NotApplying);
            }
            s.sync_applying();
            Ok(())
        })
    }

    /// Drop the connection with one host
    pub fn disconnect(&self, user_id: &str) -> Result<()> {
        self.state.try_update(|s| {
            if !s.is_connected(user_id) {
                return Err(RoomError::NotConnected(user_id.to_string()));
            }
            s.connected.retain(|u| u.user_id != user_id);
            Ok(())
        })
    }

    /// Clear everything when the local host leaves the room
    pub fn leave(&self) {
        self.state.reset();
    }
}

impl Store for CoHostStore {
    type State = CoHostState;

    fn state(&self) -> &ObservableState<CoHostState> {
        &self.state
    }

    fn on_retire(&self) {
        self.leave();
    }
}
