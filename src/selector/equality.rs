//! Equality policies for selected values

use std::fmt;
use std::sync::Arc;

type EqFn<V> = Arc<dyn Fn(&V, &V) -> bool + Send + Sync>;

/// Decides whether a freshly selected value differs from the last delivered one
///
/// A policy without a comparator treats every evaluation as a change. That is
/// how values without `PartialEq` (closures, opaque aggregates) are handled:
/// they are always delivered, never rejected.
pub struct Equality<V> {
    cmp: Option<EqFn<V>>,
    kind: EqualityKind,
}

/// Which policy an [`Equality`] carries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EqualityKind {
    /// `PartialEq` comparison
    Structural,
    /// Caller-supplied predicate
    Custom,
    /// Every evaluation counts as a change
    Never,
}

impl<V: 'static> Equality<V> {
    /// Structural equality for `PartialEq` values
    pub fn structural() -> Self
    where
        V: PartialEq,
    {
        Self {
            cmp: Some(Arc::new(|a: &V, b: &V| a == b)),
            kind: EqualityKind::Structural,
        }
    }

    /// Custom predicate; returning true means "equal, skip delivery"
    pub fn by(eq: impl Fn(&V, &V) -> bool + Send + Sync + 'static) -> Self {
        Self {
            cmp: Some(Arc::new(eq)),
            kind: EqualityKind::Custom,
        }
    }

    /// No comparison; every evaluation is delivered
    pub fn never() -> Self {
        Self {
            cmp: None,
            kind: EqualityKind::Never,
        }
    }
}

impl<V> Equality<V> {
    /// True when `a` and `b` are known to be equal
    pub fn same(&self, a: &V, b: &V) -> bool {
        match &self.cmp {
            Some(cmp) => cmp(a, b),
            None => false,
        }
    }

    /// Returns true if this policy can ever suppress a delivery
    pub fn is_equatable(&self) -> bool {
        self.cmp.is_some()
    }

    /// The policy kind
    pub fn kind(&self) -> EqualityKind {
        self.kind
    }
}

impl<V> Clone for Equality<V> {
    fn clone(&self) -> Self {
        Self {
            cmp: self.cmp.clone(),
            kind: self.kind,
        }
    }
}

impl<V> fmt::Debug for Equality<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_structural() {
        let eq = Equality::<u32>::structural();
        assert!(eq.same(&1, &1));
        assert!(!eq.same(&1, &2));
        assert!(eq.is_equatable());
        assert_eq!(eq.kind(), EqualityKind::Structural);
    }

    #[test]
    fn test_custom_case_insensitive() {
        let eq = Equality::<String>::by(|a, b| a.eq_ignore_ascii_case(b));
        assert!(eq.same(&"Speaker".to_string(), &"speaker".to_string()));
        assert!(!eq.same(&"speaker".to_string(), &"earpiece".to_string()));
        assert_eq!(eq.kind(), EqualityKind::Custom);
    }

    #[test]
    fn test_never_always_changed() {
        let eq = Equality::<u32>::never();
        assert!(!eq.same(&1, &1));
        assert!(!eq.is_equatable());
        assert_eq!(format!("{:?}", eq), "Never");
    }
}
