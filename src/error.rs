//! Error types
//!
//! Errors are returned to the immediate caller of `update`/`try_create` and
//! never reach subscriber callbacks.

use thiserror::Error;

/// Boxed error carried by a rejected reducer
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Error type for state and registry operations
#[derive(Debug, Error)]
pub enum StateError {
    /// The reducer returned an error; the update was rolled back
    #[error("update rejected: {0}")]
    Rejected(#[source] BoxError),

    /// The reducer panicked; the update was rolled back
    #[error("reducer panicked: {message}")]
    ReducerPanicked { message: String },

    /// A registry factory panicked while building the store for `key`
    #[error("store factory panicked for key {key}")]
    FactoryPanicked { key: String },
}

impl StateError {
    /// Build a rejection from any error value
    pub fn rejected(err: impl Into<BoxError>) -> Self {
        StateError::Rejected(err.into())
    }

    /// The rejection reason, if it has type `E`
    pub fn rejection<E: std::error::Error + 'static>(&self) -> Option<&E> {
        match self {
            StateError::Rejected(err) => err.downcast_ref::<E>(),
            _ => None,
        }
    }

    /// Returns true if the failure was a panic rather than a rejection
    pub fn is_panic(&self) -> bool {
        matches!(
            self,
            StateError::ReducerPanicked { .. } | StateError::FactoryPanicked { .. }
        )
    }
}

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, StateError>;

/// Extract a readable message from a panic payload
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
