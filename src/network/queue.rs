//! Request Queue Module
//!
//! Bounds the number of concurrently running async operations. Tasks beyond
//! the limit wait in FIFO order and are dispatched as running ones settle.

use std::collections::VecDeque;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::future::{self, BoxFuture, Either};
use futures::FutureExt;
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::error::QueueError;

/// Default concurrency ceiling, matching typical per-origin connection limits
pub const DEFAULT_MAX_CONCURRENT: usize = 6;

/// A queued task: starts the caller's work and reports back on its channel.
type Job = Box<dyn FnOnce() -> BoxFuture<'static, ()> + Send>;

// == Request Queue ==
/// FIFO queue with a fixed number of concurrency slots.
///
/// Cloning yields another handle to the same queue.
#[derive(Clone)]
pub struct RequestQueue {
    inner: Arc<QueueInner>,
}

struct QueueInner {
    max_concurrent: usize,
    state: Mutex<QueueState>,
}

#[derive(Default)]
struct QueueState {
    pending: VecDeque<Job>,
    running: usize,
}

impl Default for RequestQueue {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CONCURRENT)
    }
}

impl std::fmt::Debug for RequestQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("RequestQueue")
            .field("max_concurrent", &self.inner.max_concurrent)
            .field("running", &state.running)
            .field("pending", &state.pending.len())
            .finish()
    }
}

impl RequestQueue {
    // == Constructor ==
    /// Creates a queue running at most `max_concurrent` tasks at once.
    ///
    /// A limit of zero is treated as one.
    pub fn new(max_concurrent: usize) -> Self {
        Self {
            inner: Arc::new(QueueInner {
                max_concurrent: max_concurrent.max(1),
                state: Mutex::new(QueueState::default()),
            }),
        }
    }

    // == Add ==
    /// Enqueues `task` and returns a future resolving with its output.
    ///
    /// The task is enqueued immediately, so FIFO order follows call order
    /// rather than the order in which the returned futures are polled.
    ///
    /// # Errors
    /// - `QueueError::Cancelled` if `clear()` dropped the task before it ran
    /// - `QueueError::Panicked` if the task panicked
    /// - `QueueError::NoRuntime` if called outside a tokio runtime; the task
    ///   is not enqueued
    pub fn add<F, Fut, T>(&self, task: F) -> impl Future<Output = Result<T, QueueError>> + Send
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        if Handle::try_current().is_err() {
            warn!("Request queue used outside a tokio runtime; task rejected");
            return Either::Left(future::ready(Err(QueueError::NoRuntime)));
        }

        let (tx, rx) = oneshot::channel();

        let job: Job = Box::new(move || {
            async move {
                let outcome = AssertUnwindSafe(async move { task().await })
                    .catch_unwind()
                    .await
                    .map_err(|_| QueueError::Panicked);
                // Receiver may be gone if the caller stopped waiting
                let _ = tx.send(outcome);
            }
            .boxed()
        });

        self.inner.state.lock().pending.push_back(job);
        self.dispatch();

        Either::Right(async move { rx.await.unwrap_or(Err(QueueError::Cancelled)) })
    }

    // == Clear ==
    /// Drops every task that has not started yet.
    ///
    /// Their callers resolve with `QueueError::Cancelled`; running tasks are
    /// unaffected. Returns the number of tasks dropped.
    pub fn clear(&self) -> usize {
        let dropped: Vec<Job> = self.inner.state.lock().pending.drain(..).collect();
        let count = dropped.len();
        // Dropping outside the lock closes each task's result channel
        drop(dropped);
        if count > 0 {
            debug!(count, "Cleared pending tasks");
        }
        count
    }

    /// Number of tasks currently running.
    pub fn running(&self) -> usize {
        self.inner.state.lock().running
    }

    /// Number of tasks waiting for a slot.
    pub fn pending(&self) -> usize {
        self.inner.state.lock().pending.len()
    }

    pub fn max_concurrent(&self) -> usize {
        self.inner.max_concurrent
    }

    // == Dispatch ==
    /// Starts queued tasks while slots are free.
    fn dispatch(&self) {
        // Only reached from `add` and slot release, both inside a runtime
        let Ok(handle) = Handle::try_current() else {
            return;
        };

        loop {
            let job = {
                let mut state = self.inner.state.lock();
                if state.running >= self.inner.max_concurrent {
                    return;
                }
                match state.pending.pop_front() {
                    Some(job) => {
                        state.running += 1;
                        job
                    }
                    None => return,
                }
            };

            let slot = SlotGuard {
                queue: self.clone(),
            };
            handle.spawn(async move {
                let _slot = slot;
                job().await;
            });
        }
    }

    fn release(&self) {
        {
            let mut state = self.inner.state.lock();
            state.running = state.running.saturating_sub(1);
        }
        self.dispatch();
    }
}

// == Slot Guard ==
/// Returns a concurrency slot when the running task finishes, however it ends.
struct SlotGuard {
    queue: RequestQueue,
}

impl Drop for SlotGuard {
    fn drop(&mut self) {
        self.queue.release();
    }
}
