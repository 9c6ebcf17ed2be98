//! Container configuration

use std::sync::Arc;

use crate::executor::ExecutorRef;

/// Configuration for an [`ObservableState`](super::ObservableState)
#[derive(Debug, Clone)]
pub struct StateConfig {
    /// Label attached to every log event of the container
    pub label: Arc<str>,

    /// Executor used by `subscribe` when none is given explicitly
    pub executor: ExecutorRef,
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            label: Arc::from("state"),
            executor: ExecutorRef::inline(),
        }
    }
}

impl StateConfig {
    /// Create a config with a custom label
    pub fn labeled(label: impl Into<Arc<str>>) -> Self {
        Self {
            label: label.into(),
            ..Default::default()
        }
    }

    /// Set the label
    pub fn label(mut self, label: impl Into<Arc<str>>) -> Self {
        self.label = label.into();
        self
    }

    /// Set the default delivery executor
    pub fn executor(mut self, executor: impl Into<ExecutorRef>) -> Self {
        self.executor = executor.into();
        self
    }
}
