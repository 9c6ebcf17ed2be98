//! Serial dispatch queue
//!
//! A [`DispatchQueue`] is the usual stand-in for a UI/main context: jobs are
//! posted through a tokio unbounded channel and run one at a time, in order,
//! by the matching [`QueueDriver`]. The driver either runs as a task
//! ([`QueueDriver::run`]) or is pumped from a main loop
//! ([`QueueDriver::run_pending`]).

use std::fmt;
use std::sync::Arc;

use tokio::sync::mpsc;

use super::{Executor, Job};

/// Sending half of a serial queue
#[derive(Clone)]
pub struct DispatchQueue {
    tx: mpsc::UnboundedSender<Job>,
    label: Arc<str>,
}

/// Receiving half of a serial queue; runs the jobs
pub struct QueueDriver {
    rx: mpsc::UnboundedReceiver<Job>,
    label: Arc<str>,
}

impl DispatchQueue {
    /// Create a queue and the driver that drains it
    pub fn new(label: impl Into<Arc<str>>) -> (Self, QueueDriver) {
        let (tx, rx) = mpsc::unbounded_channel();
        let label = label.into();

        (
            Self {
                tx,
                label: Arc::clone(&label),
            },
            QueueDriver { rx, label },
        )
    }

    /// Create a queue whose driver runs on a spawned tokio task
    ///
    /// Must be called from within a tokio runtime. The task ends once every
    /// `DispatchQueue` clone is dropped.
    pub fn spawn(label: impl Into<Arc<str>>) -> (Self, tokio::task::JoinHandle<()>) {
        let (queue, driver) = Self::new(label);
        let handle = tokio::spawn(driver.run());
        (queue, handle)
    }

    /// Queue label used in log events
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Returns true once the driver is gone
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

impl Executor for DispatchQueue {
    fn execute(&self, job: Job) {
        if self.tx.send(job).is_err() {
            tracing::warn!(queue = %self.label, "Dispatch queue closed, dropping delivery");
        }
    }
}

impl fmt::Debug for DispatchQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatchQueue")
            .field("label", &self.label)
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl QueueDriver {
    /// Run jobs until every sender is dropped
    pub async fn run(mut self) {
        tracing::debug!(queue = %self.label, "Dispatch queue started");

        while let Some(job) = self.rx.recv().await {
            job();
        }

        tracing::debug!(queue = %self.label, "Dispatch queue stopped");
    }

    /// Run every job that is already queued, without waiting
    ///
    /// Returns the number of jobs run.
    pub fn run_pending(&mut self) -> usize {
        let mut ran = 0;
        while let Ok(job) = self.rx.try_recv() {
            job();
            ran += 1;
        }
        ran
    }

    /// Wait for the next job and run it
    ///
    /// Returns false once every sender is dropped.
    pub async fn run_next(&mut self) -> bool {
        match self.rx.recv().await {
            Some(job) => {
                job();
                true
            }
            None => false,
        }
    }

    /// Queue label used in log events
    pub fn label(&self) -> &str {
        &self.label
    }
}

impl fmt::Debug for QueueDriver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueueDriver")
            .field("label", &self.label)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_jobs_wait_for_driver() {
        let (queue, mut driver) = DispatchQueue::new("main");
        let log = Arc::new(Mutex::new(Vec::new()));

        for i in 0..3 {
            let log = Arc::clone(&log);
            queue.execute(Box::new(move || log.lock().unwrap().push(i)));
        }
        assert!(log.lock().unwrap().is_empty());

        assert_eq!(driver.run_pending(), 3);
        assert_eq!(*log.lock().unwrap(), vec![0, 1, 2]);
        assert_eq!(driver.run_pending(), 0);
    }

    #[test]
    fn test_closed_queue_drops_jobs() {
        let (queue, driver) = DispatchQueue::new("main");
        drop(driver);
        assert!(queue.is_closed());

        // Dropped silently, no panic
        queue.execute(Box::new(|| unreachable!()));
    }

    #[tokio::test]
    async fn test_spawned_queue_runs_in_order() {
        let (queue, handle) = DispatchQueue::spawn("ui");
        let (done_tx, mut done_rx) = mpsc::unbounded_channel();

        for i in 0..10 {
            let done_tx = done_tx.clone();
            queue.execute(Box::new(move || {
                let _ = done_tx.send(i);
            }));
        }

        for expected in 0..10 {
            assert_eq!(done_rx.recv().await, Some(expected));
        }

        drop(queue);
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_run_next() {
        let (queue, mut driver) = DispatchQueue::new("main");
        let log = Arc::new(Mutex::new(Vec::new()));
        let l = Arc::clone(&log);
        queue.execute(Box::new(move || l.lock().unwrap().push("first")));

        assert!(driver.run_next().await);
        assert_eq!(*log.lock().unwrap(), vec!["first"]);

        drop(queue);
        assert!(!driver.run_next().await);
    }

    #[test]
    fn test_debug_impl() {
        let (queue, driver) = DispatchQueue::new("main");
        assert!(format!("{:?}", queue).contains("main"));
        assert!(format!("{:?}", driver).contains("QueueDriver"));
        assert_eq!(queue.label(), "main");
        assert_eq!(driver.label(), "main");
    }
}
