//! Host battles in one live room

use std::collections::BTreeMap;

use crate::error::Result;
use crate::registry::{RegistryConfig, StoreRegistry};
use crate::selector::Selector;
use crate::state::{ObservableState, StateConfig};

use super::{RoomError, Store};

/// Battle state of one room
///
/// Scores stay readable after `end_battle` so the result can be shown; the
/// next `start_battle` clears them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BattleState {
    /// Id of the current or last battle
    pub battle_id: Option<String>,
    /// Score per participant user id
    pub scores: BTreeMap<String, u64>,
    pub is_battling: bool,
}

/// Facade over the battle state of one live room
#[derive(Debug)]
pub struct BattleStore {
    live_id: String,
    state: ObservableState<BattleState>,
}

impl BattleStore {
    /// An empty battle store for `live_id`, labeled `battle:<live_id>` in logs
    pub fn new(live_id: impl Into<String>) -> Self {
        let live_id = live_id.into();
        let config = StateConfig::labeled(format!("battle:{}", live_id));
        Self::with_config(live_id, config)
    }

    pub fn with_config(live_id: impl Into<String>, config: StateConfig) -> Self {
        Self {
            live_id: live_id.into(),
            state: ObservableState::with_config(BattleState::default(), config),
        }
    }

    /// A registry building one store per live id
    pub fn registry() -> StoreRegistry<String, BattleStore> {
        StoreRegistry::with_config(
            |live_id: &String| BattleStore::new(live_id.clone()),
            RegistryConfig::default().label("battle"),
        )
    }

    /// The room this store belongs to
    pub fn live_id(&self) -> &str {
        &self.live_id
    }

    /// Selector over one user's score; `None` while the user is not in a battle
    pub fn score_of(user_id: impl Into<String>) -> Selector<BattleState, Option<u64>> {
        Selector::keyed(user_id.into(), |s: &BattleState, user_id: &String| {
            s.scores.get(user_id).copied()
        })
    }

    /// Selector over the battling flag
    pub fn is_battling() -> Selector<BattleState, bool> {
        Selector::path(|s: &BattleState| &s.is_battling)
    }

    /// Start a battle between `participants`, all at score zero
    pub fn start_battle<I, U>(&self, battle_id: impl Into<String>, participants: I) -> Result<()>
    where
        I: IntoIterator<Item = U>,
        U: Into<String>,
    {
        let battle_id = battle_id.into();
        let scores: BTreeMap<String, u64> =
            participants.into_iter().map(|u| (u.into(), 0)).collect();

        self.state.try_update(|s| {
            if let (true, Some(running)) = (s.is_battling, &s.battle_id) {
                return Err(RoomError::BattleInProgress(running.clone()));
            }
            s.battle_id = Some(battle_id);
            s.scores = scores;
            s.is_battling = true;
            Ok(())
        })
    }

    /// Apply a score report for the running battle
    pub fn update_scores<I, U>(&self, battle_id: &str, scores: I) -> Result<()>
    where
        I: IntoIterator<Item = (U, u64)>,
        U: Into<String>,
    {
        let report: Vec<(String, u64)> =
            scores.into_iter().map(|(u, n)| (u.into(), n)).collect();

        self.state.try_update(|s| {
            Self::check_running(s, battle_id)?;
            s.scores.extend(report);
            Ok::<(), RoomError>(())
        })
    }

    /// End the running battle, keeping the final scores
    pub fn end_battle(&self, battle_id: &str) -> Result<()> {
        self.state.try_update(|s| {
            Self::check_running(s, battle_id)?;
            s.is_battling = false;
            Ok::<(), RoomError>(())
        })
    }

    /// Clear everything when the local host leaves the room
    pub fn leave(&self) {
        self.state.reset();
    }

    fn check_running(s: &BattleState, battle_id: &str) -> std::result::Result<(), RoomError> {
        match &s.battle_id {
            Some(id) if s.is_battling && id == battle_id => Ok(()),
            _ => Err(RoomError::NoSuchBattle(battle_id.to_string())),
        }
    }
}

impl Store for BattleStore {
    type State = BattleState;

    fn state(&self) -> &ObservableState<BattleState> {
        &self.state
    }

    fn on_retire(&self) {
        self.leave();
    }
}
