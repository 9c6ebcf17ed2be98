//! statehub: reactive state for live-room style applications
//!
//! Each feature module keeps its state in an [`ObservableState`], a thread-safe
//! container that notifies subscribers with deduplicated projections of the
//! state chosen by a [`Selector`]. Modules that must share one instance per
//! room get it from a keyed [`StoreRegistry`]; projections of several stores
//! are joined with [`combine_latest2`]/[`combine_latest3`].
//!
//! # Example
//!
//! ```
//! use std::sync::{Arc, Mutex};
//! use statehub::facade::{CoHostStore, HostUser, Store};
//!
//! let registry = CoHostStore::registry();
//! let store = registry.create(&"live_1".to_string());
//!
//! let seen = Arc::new(Mutex::new(Vec::new()));
//! let sink = Arc::clone(&seen);
//! let _sub = store.subscribe(CoHostStore::connected(), move |hosts| {
//!     sink.lock().unwrap().push(hosts.len())
//! });
//!
//! store.request_connection(HostUser::new("live_2", "host_2", "Bo")).unwrap();
//! store.on_connected(HostUser::new("live_2", "host_2", "Bo")).unwrap();
//!
//! // Immediate delivery, then only the change of `connected`
//! assert_eq!(*seen.lock().unwrap(), vec![0, 1]);
//! registry.release(&"live_1".to_string(), &store);
//! ```

pub mod compose;
pub mod error;
pub mod executor;
pub mod facade;
pub mod registry;
pub mod selector;
pub mod state;

pub use compose::{combine_latest2, combine_latest3, observe, CombineLatest2, CombineLatest3};
pub use error::{BoxError, Result, StateError};
pub use executor::{DispatchQueue, Executor, ExecutorRef, Inline, Job, QueueDriver};
pub use facade::Store;
pub use registry::{RegistryConfig, SharedStore, StoreRegistry};
pub use selector::{Equality, Selector};
pub use state::{
    Notify, ObservableState, StateConfig, StateStream, Subscription, SubscriptionBag,
    SubscriptionId,
};

/// Install a test-writer subscriber honouring `RUST_LOG`; safe to call repeatedly
#[cfg(test)]
pub(crate) fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
