//! Store registry implementation
//!
//! The central registry that hands out one shared store per key and retires
//! it when the owning modules are done with it.

use std::fmt;
use std::hash::Hash;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::error::{panic_message, Result, StateError};
use crate::facade::Store;

use super::config::RegistryConfig;
use super::entry::{EntryStats, RegistryEntry};

type Factory<K, S> = Box<dyn Fn(&K) -> S + Send + Sync>;

/// Keyed registry of shared stores
///
/// Thread-safe via `DashMap`. Construction happens under the key's entry lock,
/// so racing `create` calls for one key build a single store. The factory must
/// not call back into the same registry.
pub struct StoreRegistry<K, S> {
    /// Map of key to registry entry
    stores: DashMap<K, RegistryEntry<S>>,

    /// Builds a fresh store for a key
    factory: Factory<K, S>,

    /// Construction counter
    generation: AtomicU64,

    /// Configuration
    config: RegistryConfig,
}

impl<K, S> StoreRegistry<K, S>
where
    K: Eq + Hash + Clone + fmt::Debug + Send + Sync + 'static,
    S: Store,
{
    /// Create a new registry with default configuration
    pub fn new(factory: impl Fn(&K) -> S + Send + Sync + 'static) -> Self {
        Self::with_config(factory, RegistryConfig::default())
    }

    /// Create a new registry with custom configuration
    pub fn with_config(
        factory: impl Fn(&K) -> S + Send + Sync + 'static,
        config: RegistryConfig,
    ) -> Self {
        Self {
            stores: DashMap::with_capacity(config.initial_capacity),
            factory: Box::new(factory),
            generation: AtomicU64::new(0),
            config,
        }
    }

    /// Get the registry configuration
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Get the store for `key`, building it on first use
    ///
    /// Every call takes one reference that the owning module gives back with
    /// [`release`](Self::release).
    pub fn create(&self, key: &K) -> Arc<S> {
        let mut built = false;

        let (store, refs, generation) = {
            let mut entry = self.stores.entry(key.clone()).or_insert_with(|| {
                built = true;
                let generation = self.generation.fetch_add(1, Ordering::Relaxed) + 1;
                RegistryEntry::new((self.factory)(key), generation)
            });
            entry.refs = entry.refs.saturating_add(1);
            (Arc::clone(&entry.store), entry.refs, entry.generation)
        };

        if built {
            tracing::debug!(
                registry = %self.config.label,
                key = ?key,
                generation = generation,
                "Store created"
            );
        } else {
            tracing::debug!(
                registry = %self.config.label,
                key = ?key,
                refs = refs,
                "Store reused"
            );
        }

        store
    }

    /// Like [`create`](Self::create), but a panicking factory becomes an error
    ///
    /// No entry is left behind for `key` when the factory panics.
    pub fn try_create(&self, key: &K) -> Result<Arc<S>> {
        panic::catch_unwind(AssertUnwindSafe(|| self.create(key))).map_err(|payload| {
            tracing::error!(
                registry = %self.config.label,
                key = ?key,
                panic = %panic_message(payload.as_ref()),
                "Store factory panicked"
            );
            StateError::FactoryPanicked {
                key: format!("{:?}", key),
            }
        })
    }

    /// Look up a store without taking a reference
    pub fn get(&self, key: &K) -> Option<Arc<S>> {
        self.stores.get(key).map(|entry| Arc::clone(&entry.store))
    }

    /// Give back one reference taken by `create`
    ///
    /// `store` is the handle `create` returned. When the last reference goes
    /// the entry is retired (unless configured to keep it). Releasing an
    /// unknown key, or a handle to an instance that was already retired and
    /// rebuilt, is a no-op.
    pub fn release(&self, key: &K, store: &Arc<S>) {
        let retired = match self.stores.entry(key.clone()) {
            Entry::Occupied(mut occupied) => {
                let entry = occupied.get_mut();

                if !Arc::ptr_eq(&entry.store, store) {
                    tracing::debug!(
                        registry = %self.config.label,
                        key = ?key,
                        generation = entry.generation,
                        "Release of retired instance ignored"
                    );
                    None
                } else {
                    entry.refs = entry.refs.saturating_sub(1);

                    if entry.refs == 0 && self.config.retire_on_last_release {
                        Some(occupied.remove())
                    } else {
                        tracing::debug!(
                            registry = %self.config.label,
                            key = ?key,
                            refs = entry.refs,
                            "Store released"
                        );
                        None
                    }
                }
            }
            Entry::Vacant(_) => {
                tracing::debug!(
                    registry = %self.config.label,
                    key = ?key,
                    "Release of unknown key ignored"
                );
                None
            }
        };

        if let Some(entry) = retired {
            self.finish_retire(key, entry);
        }
    }

    /// Drop the entry for `key` regardless of outstanding references
    ///
    /// Holders of the old `Arc<S>` keep a detached store; the next `create`
    /// builds a fresh one. Retiring an unknown key is a no-op.
    pub fn retire(&self, key: &K) -> bool {
        match self.stores.remove(key) {
            Some((_, entry)) => {
                self.finish_retire(key, entry);
                true
            }
            None => false,
        }
    }

    /// Retire every entry
    pub fn retire_all(&self) {
        for key in self.keys() {
            self.retire(&key);
        }
    }

    fn finish_retire(&self, key: &K, entry: RegistryEntry<S>) {
        // Runs outside the map lock; the hook may notify subscribers
        entry.store.on_retire();

        tracing::debug!(
            registry = %self.config.label,
            key = ?key,
            generation = entry.generation,
            outstanding = entry.refs,
            "Store retired"
        );
    }

    /// Check if a store exists for `key`
    pub fn contains(&self, key: &K) -> bool {
        self.stores.contains_key(key)
    }

    /// Get entry statistics
    pub fn stats(&self, key: &K) -> Option<EntryStats> {
        self.stores.get(key).map(|entry| entry.stats())
    }

    /// Keys with a live store
    pub fn keys(&self) -> Vec<K> {
        self.stores.iter().map(|entry| entry.key().clone()).collect()
    }

    /// Get total number of stores
    pub fn len(&self) -> usize {
        self.stores.len()
    }

    /// Returns true if no store is registered
    pub fn is_empty(&self) -> bool {
        self.stores.is_empty()
    }
}

impl<K: Eq + Hash, S> fmt::Debug for StoreRegistry<K, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreRegistry")
            .field("label", &self.config.label)
            .field("len", &self.stores.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;
    use std::sync::{Barrier, Mutex};

    use super::*;
    use crate::registry::EntryState;
    use crate::selector::Selector;
    use crate::state::ObservableState;

    #[derive(Debug, Clone, Default, PartialEq)]
    struct Seats {
        live_id: String,
        occupied: Vec<String>,
    }

    struct SeatStore {
        state: ObservableState<Seats>,
        retired: Arc<AtomicUsize>,
    }

    impl Store for SeatStore {
        type State = Seats;

        fn state(&self) -> &ObservableState<Seats> {
            &self.state
        }

        fn on_retire(&self) {
            self.retired.fetch_add(1, Ordering::SeqCst);
            self.state.reset();
        }
    }

    fn registry() -> (StoreRegistry<String, SeatStore>, Arc<AtomicUsize>, Arc<AtomicUsize>) {
        let built = Arc::new(AtomicUsize::new(0));
        let retired = Arc::new(AtomicUsize::new(0));
        let b = Arc::clone(&built);
        let r = Arc::clone(&retired);

        let registry = StoreRegistry::new(move |live_id: &String| {
            b.fetch_add(1, Ordering::SeqCst);
            SeatStore {
                state: ObservableState::new(Seats {
                    live_id: live_id.clone(),
                    occupied: Vec::new(),
                }),
                retired: Arc::clone(&r),
            }
        });
        (registry, built, retired)
    }

    #[test]
    fn test_create_returns_shared_instance() {
        let (registry, built, _) = registry();
        let key = "live_1".to_string();

        let a = registry.create(&key);
        let b = registry.create(&key);
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(built.load(Ordering::SeqCst), 1);

        a.state().update(|s| s.occupied.push("alice".into())).unwrap();
        assert_eq!(b.value().occupied, vec!["alice".to_string()]);

        let stats = registry.stats(&key).unwrap();
        assert_eq!(stats.refs, 2);
        assert_eq!(stats.state, EntryState::Active);
    }

    #[test]
    fn test_keys_never_share_containers() {
        let (registry, _, _) = registry();
        let a = registry.create(&"live_1".to_string());
        let b = registry.create(&"live_2".to_string());

        assert!(!a.state().ptr_eq(b.state()));
        assert_eq!(b.value().live_id, "live_2");
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_concurrent_create_single_winner() {
        let (registry, built, _) = registry();
        let registry = Arc::new(registry);
        let barrier = Arc::new(Barrier::new(8));
        let key = "live_race".to_string();

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let registry = Arc::clone(&registry);
                let barrier = Arc::clone(&barrier);
                let key = key.clone();
                std::thread::spawn(move || {
                    barrier.wait();
                    let store = registry.create(&key);
                    store
                        .state()
                        .update(|s| s.occupied.push(format!("user_{}", i)))
                        .unwrap();
                    store
                })
            })
            .collect();

        let stores: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(built.load(Ordering::SeqCst), 1);
        for store in &stores {
            assert!(Arc::ptr_eq(store, &stores[0]));
        }
        assert_eq!(stores[0].value().occupied.len(), 8);
        assert_eq!(registry.stats(&key).unwrap().refs, 8);
    }

    #[test]
    fn test_last_release_retires_and_rebuilds_fresh() {
        let (registry, built, retired) = registry();
        let key = "live_1".to_string();

        let first = registry.create(&key);
        let again = registry.create(&key);
        first.state().update(|s| s.occupied.push("bob".into())).unwrap();

        registry.release(&key, &first);
        assert!(registry.contains(&key));
        registry.release(&key, &again);
        assert!(!registry.contains(&key));
        assert_eq!(retired.load(Ordering::SeqCst), 1);

        let fresh = registry.create(&key);
        assert!(!Arc::ptr_eq(&first, &fresh));
        assert!(fresh.value().occupied.is_empty());
        assert_eq!(built.load(Ordering::SeqCst), 2);
        assert_eq!(registry.stats(&key).unwrap().generation, 2);
    }

    #[test]
    fn test_retire_notifies_observers_of_stale_store() {
        let (registry, _, _) = registry();
        let key = "live_1".to_string();
        let store = registry.create(&key);
        store.state().update(|s| s.occupied.push("carol".into())).unwrap();

        let log = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&log);
        let _sub = store.subscribe(Selector::path(|s: &Seats| &s.occupied), move |v| {
            sink.lock().unwrap().push(v)
        });

        assert!(registry.retire(&key));
        assert!(!registry.retire(&key));

        let log = log.lock().unwrap();
        assert_eq!(log.len(), 2);
        assert!(log[1].is_empty());
    }

    #[test]
    fn test_release_unknown_key_is_noop() {
        let (registry, _, retired) = registry();
        let other = registry.create(&"live_2".to_string());

        registry.release(&"never_created".to_string(), &other);
        assert_eq!(registry.keys(), vec!["live_2".to_string()]);
        assert_eq!(registry.stats(&"live_2".to_string()).unwrap().refs, 1);
        assert_eq!(retired.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_release_of_retired_instance_is_noop() {
        let (registry, built, retired) = registry();
        let key = "live_1".to_string();

        let old = registry.create(&key);
        assert!(registry.retire(&key));
        assert_eq!(retired.load(Ordering::SeqCst), 1);

        let current = registry.create(&key);
        current.state().update(|s| s.occupied.push("erin".into())).unwrap();

        // The holder of the retired instance gives back its reference late
        registry.release(&key, &old);

        assert!(registry.contains(&key));
        assert_eq!(retired.load(Ordering::SeqCst), 1);
        assert_eq!(current.value().occupied, vec!["erin".to_string()]);

        let stats = registry.stats(&key).unwrap();
        assert_eq!(stats.refs, 1);
        assert_eq!(stats.generation, 2);

        let joined = registry.create(&key);
        assert!(Arc::ptr_eq(&current, &joined));
        assert_eq!(built.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_keep_on_last_release() {
        let built = Arc::new(AtomicUsize::new(0));
        let b = Arc::clone(&built);
        let registry = StoreRegistry::with_config(
            move |_: &u32| {
                b.fetch_add(1, Ordering::SeqCst);
                SeatStore {
                    state: ObservableState::default(),
                    retired: Arc::new(AtomicUsize::new(0)),
                }
            },
            RegistryConfig::default().label("seats").keep_on_last_release(),
        );

        let store = registry.create(&7);
        store.state().update(|s| s.occupied.push("dave".into())).unwrap();
        registry.release(&7, &store);

        assert_eq!(registry.stats(&7).unwrap().state, EntryState::Idle);
        let again = registry.create(&7);
        assert!(Arc::ptr_eq(&store, &again));
        assert_eq!(built.load(Ordering::SeqCst), 1);

        registry.retire_all();
        assert!(registry.is_empty());
    }

    #[test]
    fn test_try_create_factory_panic() {
        crate::init_tracing();
        let registry: StoreRegistry<String, SeatStore> = StoreRegistry::new(|key: &String| {
            if key == "bad" {
                panic!("sdk not initialized");
            }
            SeatStore {
                state: ObservableState::default(),
                retired: Arc::new(AtomicUsize::new(0)),
            }
        });

        let result = registry.try_create(&"bad".to_string());
        assert!(matches!(result, Err(StateError::FactoryPanicked { .. })));
        assert!(!registry.contains(&"bad".to_string()));

        // Map still usable after the unwind
        assert!(registry.try_create(&"good".to_string()).is_ok());
        assert_eq!(registry.keys(), vec!["good".to_string()]);
    }

    #[test]
    fn test_get_does_not_retain() {
        let (registry, _, _) = registry();
        let key = "live_1".to_string();
        assert!(registry.get(&key).is_none());

        let store = registry.create(&key);
        assert!(registry.get(&key).is_some());
        assert_eq!(registry.stats(&key).unwrap().refs, 1);

        registry.release(&key, &store);
        assert!(registry.get(&key).is_none());
    }

    #[test]
    fn test_ref_count_saturates() {
        let (registry, _, _) = registry();
        let key = "live_1".to_string();
        let store = registry.create(&key);
        if let Some(mut entry) = registry.stores.get_mut(&key) {
            entry.refs = u32::MAX;
        }

        let again = registry.create(&key);
        assert!(Arc::ptr_eq(&store, &again));
        assert_eq!(registry.stats(&key).unwrap().refs, u32::MAX);

        registry.release(&key, &store);
        assert_eq!(registry.stats(&key).unwrap().refs, u32::MAX - 1);
    }

    #[test]
    fn test_debug_impl() {
        let (registry, _, _) = registry();
        registry.create(&"live_1".to_string());
        let debug_str = format!("{:?}", registry);
        assert!(debug_str.contains("StoreRegistry"));
        assert!(debug_str.contains("len: 1"));
    }
}
