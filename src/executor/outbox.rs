//! Per-container ordered outbox
//!
//! Deliveries are pushed while the container's writer lock is held, so the
//! queue order is the update order. Flushing happens outside the lock with a
//! single flusher at a time; a thread that finds a flush in progress leaves its
//! deliveries to the active flusher.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

use super::{ExecutorRef, Job};

/// A job bound to the executor it must run on
pub(crate) struct Delivery {
    pub(crate) executor: ExecutorRef,
    pub(crate) job: Job,
}

/// Ordered queue of pending deliveries
#[derive(Default)]
pub(crate) struct Outbox {
    queue: Mutex<VecDeque<Delivery>>,
    flushing: AtomicBool,
}

/// Clears the flushing flag even if an executor panics
struct FlushGuard<'a>(&'a AtomicBool);

impl Drop for FlushGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl Outbox {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&self, delivery: Delivery) {
        self.queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(delivery);
    }

    fn pop(&self) -> Option<Delivery> {
        self.queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
    }

    fn is_empty(&self) -> bool {
        self.queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_empty()
    }

    /// Hand queued deliveries to their executors
    ///
    /// Returns the number of deliveries this call handed off.
    pub(crate) fn flush(&self) -> usize {
        let mut handed = 0;

        loop {
            if self
                .flushing
                .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                .is_err()
            {
                return handed;
            }

            {
                let _guard = FlushGuard(&self.flushing);
                while let Some(delivery) = self.pop() {
                    delivery.executor.execute(delivery.job);
                    handed += 1;
                }
            }

            // A push may have landed between the last pop and clearing the flag
            if self.is_empty() {
                return handed;
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn recording(log: &Arc<Mutex<Vec<u32>>>, value: u32) -> Delivery {
        let log = Arc::clone(log);
        Delivery {
            executor: ExecutorRef::inline(),
            job: Box::new(move || log.lock().unwrap().push(value)),
        }
    }

    #[test]
    fn test_flush_in_order() {
        let outbox = Outbox::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        for i in 0..5 {
            outbox.push(recording(&log, i));
        }
        assert_eq!(outbox.len(), 5);

        assert_eq!(outbox.flush(), 5);
        assert_eq!(*log.lock().unwrap(), vec![0, 1, 2, 3, 4]);
        assert_eq!(outbox.len(), 0);
    }

    #[test]
    fn test_reentrant_push_is_drained_by_outer_flush() {
        let outbox = Arc::new(Outbox::new());
        let log = Arc::new(Mutex::new(Vec::new()));

        let inner_outbox = Arc::clone(&outbox);
        let inner_log = Arc::clone(&log);
        outbox.push(Delivery {
            executor: ExecutorRef::inline(),
            job: Box::new(move || {
                inner_log.lock().unwrap().push(1);
                inner_outbox.push(recording(&inner_log, 2));
                // Nested flush sees the outer flusher and backs off
                assert_eq!(inner_outbox.flush(), 0);
            }),
        });

        assert_eq!(outbox.flush(), 2);
        assert_eq!(*log.lock().unwrap(), vec![1, 2]);
    }

    #[test]
    fn test_flag_cleared_after_executor_panic() {
        let outbox = Outbox::new();
        outbox.push(Delivery {
            executor: ExecutorRef::new(|_job: Job| panic!("scheduler down")),
            job: Box::new(|| {}),
        });

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| outbox.flush()));
        assert!(result.is_err());

        let log = Arc::new(Mutex::new(Vec::new()));
        outbox.push(recording(&log, 9));
        assert_eq!(outbox.flush(), 1);
        assert_eq!(*log.lock().unwrap(), vec![9]);
    }
}
