//! Drive a stream into a callback

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use futures::{Stream, StreamExt};

use crate::executor::ExecutorRef;
use crate::state::{deliver, Callback, Subscription, SubscriptionId};

// Kept apart from container ids, which count per container
static NEXT_ID: AtomicU64 = AtomicU64::new(1 << 48);

/// Post every item of `stream` to `callback` on `executor`
///
/// The stream is driven on a tokio task, so this must be called from inside
/// a runtime. Cancelling (or dropping) the returned subscription aborts the
/// task and skips any item already posted to the executor.
pub fn observe<S, F>(stream: S, executor: impl Into<ExecutorRef>, callback: F) -> Subscription
where
    S: Stream + Send + 'static,
    S::Item: Send + 'static,
    F: Fn(S::Item) + Send + Sync + 'static,
{
    let id = SubscriptionId(NEXT_ID.fetch_add(1, Ordering::Relaxed));
    let live = Arc::new(AtomicBool::new(true));
    let executor = executor.into();
    let callback: Callback<S::Item> = Arc::new(callback);

    let task_live = Arc::clone(&live);
    let handle = tokio::spawn(async move {
        let mut stream = Box::pin(stream);

        while let Some(item) = stream.next().await {
            let live = Arc::clone(&task_live);
            let callback = Arc::clone(&callback);
            executor.execute(Box::new(move || {
                deliver("observe", id, &live, &callback, item)
            }));
        }

        tracing::debug!(subscription = %id, "Observed stream ended");
    });

    tracing::debug!(subscription = %id, "Observing stream");
    Subscription::task(id, live, handle.abort_handle())
}
