//! Keyed store registry
//!
//! Several modules of one live room (seat view, battle panel, co-host list)
//! must observe the same store instance. The registry hands out that instance
//! by key, counts who holds it, and retires it once everyone is done so the
//! next room starts from clean state.
//!
//! # Architecture
//!
//! ```text
//!                        Arc<StoreRegistry<K, S>>
//!                   ┌──────────────────────────────┐
//!                   │ stores: DashMap<K,           │
//!                   │   RegistryEntry {            │
//!                   │     store: Arc<S>,           │
//!                   │     refs, generation,        │
//!                   │   }                          │
//!                   │ >                            │
//!                   └──────────────┬───────────────┘
//!                                  │
//!         ┌────────────────────────┼────────────────────────┐
//!         │                        │                        │
//!         ▼                        ▼                        ▼
//!    [Seat view]             [Battle panel]           [Room exit]
//!    create("live_1")        create("live_1")         release("live_1") x2
//!         │                        │                        │
//!         └──► same Arc<S> ◄───────┘                        └──► on_retire()
//! ```
//!
//! Process-wide stores (device state, login state) use [`SharedStore`]
//! instead: one lazily built instance, no keys.

pub mod config;
pub mod entry;
pub mod shared;
pub mod store;

pub use config::RegistryConfig;
pub use entry::{EntryState, EntryStats};
pub use shared::SharedStore;
pub use store::StoreRegistry;
