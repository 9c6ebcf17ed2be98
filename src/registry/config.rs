//! Registry configuration

use std::sync::Arc;

/// Configuration for a [`StoreRegistry`](super::StoreRegistry)
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Label attached to every log event of the registry
    pub label: Arc<str>,

    /// Initial capacity of the key map
    pub initial_capacity: usize,

    /// Drop an entry as soon as its last reference is released
    ///
    /// When false, released entries stay (idle) until `retire` is called, so a
    /// module re-entering the same room gets its previous state back.
    pub retire_on_last_release: bool,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            label: Arc::from("registry"),
            initial_capacity: 0,
            retire_on_last_release: true,
        }
    }
}

impl RegistryConfig {
    /// Set the label
    pub fn label(mut self, label: impl Into<Arc<str>>) -> Self {
        self.label = label.into();
        self
    }

    /// Set the initial map capacity
    pub fn initial_capacity(mut self, capacity: usize) -> Self {
        self.initial_capacity = capacity;
        self
    }

    /// Keep entries after their last release until explicitly retired
    pub fn keep_on_last_release(mut self) -> Self {
        self.retire_on_last_release = false;
        self
    }
}
