//! Registry entry and state types
//!
//! This module defines the per-key bookkeeping stored in the registry.

use std::sync::Arc;
use std::time::{Duration, Instant};

/// State of a registry entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryState {
    /// At least one collaborator holds the store
    Active,
    /// Every reference was released; kept until retired
    Idle,
}

/// Entry for a single key in the registry
pub(crate) struct RegistryEntry<S> {
    /// The shared store for this key
    pub(crate) store: Arc<S>,

    /// Outstanding `create` calls not yet matched by `release`
    pub(crate) refs: u32,

    /// Registry-wide construction counter value for this instance
    pub(crate) generation: u64,

    /// When the store was built
    pub(crate) created_at: Instant,
}

impl<S> RegistryEntry<S> {
    pub(crate) fn new(store: S, generation: u64) -> Self {
        Self {
            store: Arc::new(store),
            refs: 0,
            generation,
            created_at: Instant::now(),
        }
    }

    pub(crate) fn state(&self) -> EntryState {
        if self.refs > 0 {
            EntryState::Active
        } else {
            EntryState::Idle
        }
    }

    pub(crate) fn stats(&self) -> EntryStats {
        EntryStats {
            refs: self.refs,
            generation: self.generation,
            state: self.state(),
            age: self.created_at.elapsed(),
        }
    }
}

/// Statistics for a registry entry
#[derive(Debug, Clone)]
pub struct EntryStats {
    /// Outstanding references
    pub refs: u32,
    /// Construction counter value; a rebuilt store has a higher one
    pub generation: u64,
    /// Current entry state
    pub state: EntryState,
    /// Time since the store was built
    pub age: Duration,
}
