//! Request-rate throttling queue.
//!
//! Work submitted from any number of tasks runs one item at a time, in
//! submission order, and each item starts at least
//! `60s / requests_per_minute` after the previous one started.

use super::error::ClientError;
use futures::future::{BoxFuture, FutureExt};
use std::collections::VecDeque;
use std::fmt;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tokio::time::{sleep, Instant};
use tracing::{debug, trace, warn};

/// Budget used by [`RateLimiter::default`]
pub const DEFAULT_REQUESTS_PER_MINUTE: u32 = 90;

/// A submitted operation bound to the channel that delivers its outcome
type WorkItem = Box<dyn FnOnce() -> BoxFuture<'static, ()> + Send>;

/// FIFO rate limiter shared by cloning.
///
/// Every clone feeds the same queue, so one instance can enforce a single
/// request budget for a whole application.
#[derive(Clone)]
pub struct RateLimiter {
    inner: Arc<Inner>,
}

struct Inner {
    requests_per_minute: u32,
    min_interval: Duration,
    state: Mutex<QueueState>,
}

#[derive(Default)]
struct QueueState {
    /// Items waiting to start
    pending: VecDeque<WorkItem>,
    /// A drain task is alive
    draining: bool,
    /// Start time of the most recent item
    last_start: Option<Instant>,
}

impl Inner {
    fn lock_state(&self) -> MutexGuard<'_, QueueState> {
        // The lock is never held across user code, so a poisoned state is still consistent
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl RateLimiter {
    /// Create a limiter allowing `requests_per_minute` starts per minute
    pub fn new(requests_per_minute: u32) -> Result<Self, ClientError> {
        if requests_per_minute == 0 {
            return Err(ClientError::InvalidRateLimit);
        }
        Ok(Self::with_budget(requests_per_minute))
    }

    /// `requests_per_minute` must be non-zero
    fn with_budget(requests_per_minute: u32) -> Self {
        Self {
            inner: Arc::new(Inner {
                requests_per_minute,
                min_interval: Duration::from_secs(60) / requests_per_minute,
                state: Mutex::new(QueueState::default()),
            }),
        }
    }

    /// Queue `operation` and return a future resolving to its output.
    ///
    /// The item is enqueued before this function returns, so execution order
    /// follows call order even if the returned futures are polled out of order.
    /// Dropping the returned future does not cancel the item.
    ///
    /// # Panics
    ///
    /// Panics when called outside a Tokio runtime. If `operation` panics, the
    /// panic is resumed in whichever task awaits the returned future. The
    /// returned future also panics if the runtime running the queue shuts
    /// down before the item completes.
    pub fn submit<F, Fut>(&self, operation: F) -> impl Future<Output = Fut::Output> + Send + 'static
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future + Send + 'static,
        Fut::Output: Send + 'static,
    {
        let handle = Handle::current();
        let (tx, rx) = oneshot::channel();

        let item: WorkItem = Box::new(move || {
            async move {
                let outcome = AssertUnwindSafe(async move { operation().await })
                    .catch_unwind()
                    .await;
                // Receiver gone means the caller stopped waiting
                let _ = tx.send(outcome);
            }
            .boxed()
        });

        self.enqueue(&handle, item);

        async move {
            match rx.await {
                Ok(Ok(output)) => output,
                Ok(Err(payload)) => panic::resume_unwind(payload),
                Err(_) => panic!("rate limiter dropped a work item before it completed"),
            }
        }
    }

    fn enqueue(&self, handle: &Handle, item: WorkItem) {
        let start_drain = {
            let mut state = self.inner.lock_state();
            state.pending.push_back(item);
            trace!(pending = state.pending.len(), "Work item queued");
            !std::mem::replace(&mut state.draining, true)
        };

        if start_drain {
            handle.spawn(drain(DrainGuard::new(Arc::clone(&self.inner))));
        }
    }

    /// Configured budget
    pub fn requests_per_minute(&self) -> u32 {
        self.inner.requests_per_minute
    }

    /// Minimum spacing between two starts
    pub fn min_interval(&self) -> Duration {
        self.inner.min_interval
    }

    /// Number of items waiting to start (the running item is not counted)
    pub fn pending(&self) -> usize {
        self.inner.lock_state().pending.len()
    }

    /// Whether a drain task is currently alive
    pub fn is_draining(&self) -> bool {
        self.inner.lock_state().draining
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::with_budget(DEFAULT_REQUESTS_PER_MINUTE)
    }
}

impl fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.lock_state();
        f.debug_struct("RateLimiter")
            .field("requests_per_minute", &self.inner.requests_per_minute)
            .field("pending", &state.pending.len())
            .field("draining", &state.draining)
            .finish()
    }
}

/// Ownership of the `draining` flag held by the drain task.
///
/// If the task is dropped before it finishes (its runtime shut down, or the
/// task was never polled), the flag is cleared and the stranded items are
/// dropped so their callers see a closed channel and the next `submit`
/// starts a fresh drain task.
struct DrainGuard {
    inner: Arc<Inner>,
    finished: bool,
}

impl DrainGuard {
    fn new(inner: Arc<Inner>) -> Self {
        Self {
            inner,
            finished: false,
        }
    }
}

impl Drop for DrainGuard {
    fn drop(&mut self) {
        if self.finished {
            return;
        }

        let stranded = {
            let mut state = self.inner.lock_state();
            state.draining = false;
            std::mem::take(&mut state.pending)
        };

        warn!(
            stranded = stranded.len(),
            "Drain task stopped before the queue was empty"
        );
        // Dropped outside the lock: item destructors may touch the limiter
        drop(stranded);
    }
}

/// Run queued items until the queue is empty.
///
/// Only one drain task exists per limiter: `enqueue` spawns it when it flips
/// `draining` on, and it exits only after flipping it off under the same lock
/// that observed an empty queue.
async fn drain(mut guard: DrainGuard) {
    let inner = Arc::clone(&guard.inner);
    debug!(
        requests_per_minute = inner.requests_per_minute,
        "Drain cycle started"
    );

    loop {
        let wait = {
            let mut state = inner.lock_state();
            if state.pending.is_empty() {
                state.draining = false;
                guard.finished = true;
                break;
            }
            state
                .last_start
                .map(|last| inner.min_interval.saturating_sub(last.elapsed()))
                .unwrap_or_default()
        };

        if !wait.is_zero() {
            debug!(
                wait_ms = wait.as_millis() as u64,
                "Rate limit: waiting before next request"
            );
            sleep(wait).await;
        }

        // Items are only appended while we sleep, so the head is unchanged
        let item = {
            let mut state = inner.lock_state();
            state.last_start = Some(Instant::now());
            state.pending.pop_front()
        };

        if let Some(item) = item {
            item().await;
        }
    }

    debug!("Queue empty, drain cycle finished");
}
