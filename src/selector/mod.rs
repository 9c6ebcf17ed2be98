//! Selectors: what a subscriber wants to know about a state value
//!
//! A [`Selector<T, V>`] is a pure projection from a whole state `T` to the
//! slice `V` a subscriber cares about, plus the [`Equality`] policy that decides
//! whether a re-evaluated slice is worth delivering.
//!
//! Two projection shapes exist:
//!
//! - **Path** selectors borrow straight into the state (`|s| &s.device.route`).
//!   Evaluating one never allocates; the value is only cloned when it changed.
//! - **Derived** selectors compute a fresh value (`|s| s.seats.len()`), and may
//!   close over an external key (`Selector::keyed(user_id, ..)`).
//!
//! Path selectors extend with [`Selector::then`] and stay path selectors, so
//! chaining never costs an extra subscription.

mod equality;

use std::fmt;
use std::sync::Arc;

pub use equality::{Equality, EqualityKind};

type PathFn<T, V> = Arc<dyn for<'a> Fn(&'a T) -> &'a V + Send + Sync>;
type DeriveFn<T, V> = Arc<dyn Fn(&T) -> V + Send + Sync>;

/// Pins a closure to the higher-ranked borrow signature path selectors need
fn path_fn<T, V, F>(f: F) -> F
where
    F: for<'a> Fn(&'a T) -> &'a V,
{
    f
}

enum Projection<T, V> {
    Path(PathFn<T, V>),
    Derived(DeriveFn<T, V>),
}

impl<T, V> Clone for Projection<T, V> {
    fn clone(&self) -> Self {
        match self {
            Projection::Path(f) => Projection::Path(Arc::clone(f)),
            Projection::Derived(f) => Projection::Derived(Arc::clone(f)),
        }
    }
}

/// Projection from a state value to a sub-value, with an equality policy
pub struct Selector<T, V> {
    projection: Projection<T, V>,
    equality: Equality<V>,
}

impl<T: 'static, V: Clone + 'static> Selector<T, V> {
    /// Path selector over an equatable field
    pub fn path<F>(f: F) -> Self
    where
        F: for<'a> Fn(&'a T) -> &'a V + Send + Sync + 'static,
        V: PartialEq,
    {
        Self {
            projection: Projection::Path(Arc::new(f)),
            equality: Equality::structural(),
        }
    }

    /// Path selector over a value without `PartialEq`; every update delivers
    pub fn path_opaque<F>(f: F) -> Self
    where
        F: for<'a> Fn(&'a T) -> &'a V + Send + Sync + 'static,
    {
        Self {
            projection: Projection::Path(Arc::new(f)),
            equality: Equality::never(),
        }
    }

    /// Derived selector computing an equatable value
    pub fn map<F>(f: F) -> Self
    where
        F: Fn(&T) -> V + Send + Sync + 'static,
        V: PartialEq,
    {
        Self {
            projection: Projection::Derived(Arc::new(f)),
            equality: Equality::structural(),
        }
    }

    /// Derived selector that also reads an external key
    ///
    /// Used for lookups such as "the score of this room's own user", where the
    /// key is fixed when the subscriber is built.
    pub fn keyed<K, F>(key: K, f: F) -> Self
    where
        K: Send + Sync + 'static,
        F: Fn(&T, &K) -> V + Send + Sync + 'static,
        V: PartialEq,
    {
        Self::map(move |state: &T| f(state, &key))
    }

    /// Derived selector computing a value without `PartialEq`
    pub fn opaque<F>(f: F) -> Self
    where
        F: Fn(&T) -> V + Send + Sync + 'static,
    {
        Self {
            projection: Projection::Derived(Arc::new(f)),
            equality: Equality::never(),
        }
    }

    /// Extend the selector by one borrowed field
    ///
    /// A path selector stays a path selector.
    pub fn then<W, G>(self, g: G) -> Selector<T, W>
    where
        G: for<'a> Fn(&'a V) -> &'a W + Send + Sync + 'static,
        W: PartialEq + Clone + 'static,
    {
        let projection: Projection<T, W> = match self.projection {
            Projection::Path(f) => {
                let extended: PathFn<T, W> =
                    Arc::new(path_fn::<T, W, _>(move |state: &T| g(f(state))));
                Projection::Path(extended)
            }
            Projection::Derived(f) => {
                let extended: DeriveFn<T, W> = Arc::new(move |state: &T| g(&f(state)).clone());
                Projection::Derived(extended)
            }
        };

        Selector {
            projection,
            equality: Equality::structural(),
        }
    }

    /// Derive a new value from the selected one
    pub fn map_value<W, G>(self, g: G) -> Selector<T, W>
    where
        G: Fn(&V) -> W + Send + Sync + 'static,
        W: PartialEq + Clone + 'static,
    {
        let projection: DeriveFn<T, W> = match self.projection {
            Projection::Path(f) => Arc::new(move |state: &T| g(f(state))),
            Projection::Derived(f) => Arc::new(move |state: &T| g(&f(state))),
        };

        Selector {
            projection: Projection::Derived(projection),
            equality: Equality::structural(),
        }
    }

    /// Replace the equality policy with a custom predicate
    pub fn distinct_by(mut self, eq: impl Fn(&V, &V) -> bool + Send + Sync + 'static) -> Self {
        self.equality = Equality::by(eq);
        self
    }

    /// Drop deduplication; every update delivers
    pub fn always_changed(mut self) -> Self {
        self.equality = Equality::never();
        self
    }

    /// Evaluate the selector against a state value
    pub fn select(&self, state: &T) -> V {
        match &self.projection {
            Projection::Path(f) => f(state).clone(),
            Projection::Derived(f) => f(state),
        }
    }

    /// Returns the new projection if it differs from `last`
    ///
    /// `None` for `last` means nothing was delivered yet, which always counts
    /// as a change.
    pub(crate) fn changed(&self, state: &T, last: Option<&V>) -> Option<V> {
        match &self.projection {
            Projection::Path(f) => {
                let current = f(state);
                match last {
                    Some(prev) if self.equality.same(prev, current) => None,
                    _ => Some(current.clone()),
                }
            }
            Projection::Derived(f) => {
                let current = f(state);
                match last {
                    Some(prev) if self.equality.same(prev, &current) => None,
                    _ => Some(current),
                }
            }
        }
    }
}

impl<T: PartialEq + Clone + 'static> Selector<T, T> {
    /// Selects the whole state
    pub fn identity() -> Self {
        Self::path(|state: &T| state)
    }
}

impl<T, V> Selector<T, V> {
    /// Returns true for borrow-based path selectors
    pub fn is_path(&self) -> bool {
        matches!(self.projection, Projection::Path(_))
    }

    /// Returns true if unchanged projections are suppressed
    pub fn is_equatable(&self) -> bool {
        self.equality.is_equatable()
    }

    /// The selector's equality policy
    pub fn equality(&self) -> &Equality<V> {
        &self.equality
    }
}

impl<T, V> Clone for Selector<T, V> {
    fn clone(&self) -> Self {
        Self {
            projection: self.projection.clone(),
            equality: self.equality.clone(),
        }
    }
}

impl<T, V> fmt::Debug for Selector<T, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Selector")
            .field("path", &self.is_path())
            .field("equality", &self.equality)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Device {
        microphone_on: bool,
        route: String,
    }

    #[derive(Debug, Clone, PartialEq)]
    struct CallState {
        self_id: String,
        device: Device,
        participants: Vec<String>,
    }

    fn state() -> CallState {
        CallState {
            self_id: "alice".into(),
            device: Device {
                microphone_on: false,
                route: "speaker".into(),
            },
            participants: vec!["alice".into(), "bob".into()],
        }
    }

    #[test]
    fn test_path_select() {
        let sel = Selector::path(|s: &CallState| &s.device.route);
        assert!(sel.is_path());
        assert!(sel.is_equatable());
        assert_eq!(sel.select(&state()), "speaker");
    }

    #[test]
    fn test_then_stays_path() {
        let sel = Selector::path(|s: &CallState| &s.device).then(|d: &Device| &d.microphone_on);
        assert!(sel.is_path());
        assert!(!sel.select(&state()));
    }

    #[test]
    fn test_then_on_derived() {
        let sel = Selector::map(|s: &CallState| s.device.clone()).then(|d: &Device| &d.route);
        assert!(!sel.is_path());
        assert_eq!(sel.select(&state()), "speaker");
    }

    #[test]
    fn test_keyed_first_remote() {
        let sel = Selector::keyed("alice".to_string(), |s: &CallState, me: &String| {
            s.participants.iter().find(|p| *p != me).cloned()
        });
        assert_eq!(sel.select(&state()), Some("bob".to_string()));
    }

    #[test]
    fn test_map_value() {
        let sel = Selector::path(|s: &CallState| &s.participants).map_value(|p| p.len());
        assert!(!sel.is_path());
        assert_eq!(sel.select(&state()), 2);
    }

    #[test]
    fn test_changed_dedup() {
        let sel = Selector::path(|s: &CallState| &s.device.route);
        let s = state();

        assert_eq!(sel.changed(&s, None), Some("speaker".to_string()));
        assert_eq!(sel.changed(&s, Some(&"speaker".to_string())), None);
        assert_eq!(
            sel.changed(&s, Some(&"earpiece".to_string())),
            Some("speaker".to_string())
        );
    }

    #[test]
    fn test_opaque_always_changed() {
        let sel = Selector::opaque(|s: &CallState| s.participants.len());
        assert!(!sel.is_equatable());
        let s = state();
        assert_eq!(sel.changed(&s, Some(&2)), Some(2));

        let sel = Selector::path(|s: &CallState| &s.self_id).always_changed();
        assert_eq!(sel.changed(&s, Some(&"alice".to_string())), Some("alice".into()));
    }

    #[test]
    fn test_distinct_by() {
        let sel = Selector::path(|s: &CallState| &s.device.route)
            .distinct_by(|a, b| a.eq_ignore_ascii_case(b));
        assert_eq!(sel.changed(&state(), Some(&"SPEAKER".to_string())), None);
    }

    #[test]
    fn test_identity() {
        let sel = Selector::<CallState, CallState>::identity();
        assert_eq!(sel.select(&state()), state());
        assert!(sel.is_path());
    }

    #[test]
    fn test_debug() {
        let sel = Selector::opaque(|s: &CallState| s.participants.len());
        let debug_str = format!("{:?}", sel);
        assert!(debug_str.contains("Selector"));
        assert!(debug_str.contains("Never"));
    }
}
