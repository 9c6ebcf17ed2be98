//! Process-wide singleton stores

use std::fmt;
use std::sync::OnceLock;

use crate::facade::Store;

/// A lazily built store shared by the whole process
///
/// Usable in a `static`:
///
/// ```
/// use statehub::facade::{DeviceStore, Store};
/// use statehub::registry::SharedStore;
///
/// static DEVICE: SharedStore<DeviceStore> = SharedStore::new(DeviceStore::new);
///
/// DEVICE.get().open_microphone().unwrap();
/// assert!(DEVICE.get().value().microphone.is_on());
/// ```
pub struct SharedStore<S> {
    cell: OnceLock<S>,
    init: fn() -> S,
}

impl<S: Store> SharedStore<S> {
    /// Create an uninitialized handle; `init` runs on first [`get`](Self::get)
    pub const fn new(init: fn() -> S) -> Self {
        Self {
            cell: OnceLock::new(),
            init,
        }
    }

    /// The store, built on first access
    ///
    /// Racing first calls run `init` once; the losers wait for it.
    pub fn get(&self) -> &S {
        self.cell.get_or_init(|| {
            tracing::debug!(store = std::any::type_name::<S>(), "Shared store created");
            (self.init)()
        })
    }

    /// Returns true once the store was built
    pub fn is_initialized(&self) -> bool {
        self.cell.get().is_some()
    }

    /// Run the store's retire hook if it was built
    ///
    /// The instance itself lives for the rest of the process; this only lets
    /// it clear its state (e.g. on logout).
    pub fn teardown(&self) {
        if let Some(store) = self.cell.get() {
            store.on_retire();
        }
    }
}

impl<S> fmt::Debug for SharedStore<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedStore")
            .field("initialized", &self.cell.get().is_some())
            .finish()
    }
}
