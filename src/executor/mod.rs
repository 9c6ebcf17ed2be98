//! Delivery executors
//!
//! Every subscription names the context its callback runs on. The container
//! never invokes a callback while it holds a lock: it computes the diff, queues
//! one [`Job`] per changed subscription in its outbox, and after releasing its
//! locks hands the jobs to their executors in order.
//!
//! ```text
//!   writer thread                       executors
//!  ┌──────────────────────┐
//!  │ update(reduce)       │
//!  │  lock, reduce, swap  │
//!  │  diff ──► outbox ────┼──► Inline           (runs on the flushing thread)
//!  │  unlock, flush       │──► DispatchQueue    (tokio mpsc, drained in order)
//!  └──────────────────────┘──► Fn(Job)          (caller-provided scheduler)
//! ```
//!
//! Executors must run jobs in the order they receive them; that is what keeps
//! per-subscription delivery order equal to update order.

mod outbox;
mod queue;

use std::fmt;

pub(crate) use outbox::{Delivery, Outbox};
pub use queue::{DispatchQueue, QueueDriver};

/// A unit of delivery work
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// An execution context that runs delivery jobs in submission order
pub trait Executor: Send + Sync + 'static {
    /// Run or schedule `job`
    fn execute(&self, job: Job);
}

impl<F> Executor for F
where
    F: Fn(Job) + Send + Sync + 'static,
{
    fn execute(&self, job: Job) {
        self(job)
    }
}

/// Runs jobs directly on the thread that flushes the container's outbox
///
/// The flush happens after the writer released every container lock, so an
/// inline callback may read or update the same container. A re-entrant update
/// only queues its deliveries; the outer flush picks them up in order.
#[derive(Debug, Clone, Copy, Default)]
pub struct Inline;

impl Executor for Inline {
    fn execute(&self, job: Job) {
        job()
    }
}

/// Executor handle stored by containers and subscriptions
#[derive(Clone)]
pub struct ExecutorRef(std::sync::Arc<dyn Executor>);

impl ExecutorRef {
    /// Wrap an executor
    pub fn new(executor: impl Executor) -> Self {
        Self(std::sync::Arc::new(executor))
    }

    /// The inline executor
    pub fn inline() -> Self {
        Self::new(Inline)
    }

    pub(crate) fn execute(&self, job: Job) {
        self.0.execute(job)
    }
}

impl Default for ExecutorRef {
    fn default() -> Self {
        Self::inline()
    }
}

impl fmt::Debug for ExecutorRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ExecutorRef").finish()
    }
}

impl From<Inline> for ExecutorRef {
    fn from(executor: Inline) -> Self {
        Self::new(executor)
    }
}

impl From<DispatchQueue> for ExecutorRef {
    fn from(queue: DispatchQueue) -> Self {
        Self::new(queue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_inline_runs_immediately() {
        let hits = Arc::new(AtomicUsize::new(0));
        let h = Arc::clone(&hits);
        Inline.execute(Box::new(move || {
            h.fetch_add(1, Ordering::SeqCst);
        }));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_closure_executor_defers() {
        let parked: Arc<Mutex<Vec<Job>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&parked);
        let executor = ExecutorRef::new(move |job: Job| sink.lock().unwrap().push(job));

        let hits = Arc::new(AtomicUsize::new(0));
        let h = Arc::clone(&hits);
        executor.execute(Box::new(move || {
            h.fetch_add(1, Ordering::SeqCst);
        }));
        assert_eq!(hits.load(Ordering::SeqCst), 0);

        for job in parked.lock().unwrap().drain(..) {
            job();
        }
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}
