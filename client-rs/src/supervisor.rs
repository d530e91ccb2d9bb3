//! Retry timer ownership for automatic reconnection
//!
//! The supervisor holds at most one scheduled retry. Arming replaces any
//! pending timer, the firing path and the cancel path both clear the slot,
//! and dropping the supervisor aborts whatever is still pending.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

struct RetryTimer {
    id: u64,
    task: JoinHandle<()>,
}

pub(crate) struct Supervisor {
    delay: Duration,
    pending: Mutex<Option<RetryTimer>>,
    next_id: AtomicU64,
}

impl Supervisor {
    pub(crate) fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: Mutex::new(None),
            next_id: AtomicU64::new(0),
        }
    }

    pub(crate) fn delay(&self) -> Duration {
        self.delay
    }

    /// Schedule `on_fire` to run once after the retry delay
    ///
    /// `on_fire` receives the timer id and must call [`Supervisor::take_fired`]
    /// with it before acting, so a replaced or cancelled timer stays inert.
    pub(crate) fn arm<F>(&self, on_fire: F) -> u64
    where
        F: FnOnce(u64) + Send + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let delay = self.delay;

        // Hold the slot while spawning so the timer cannot fire before it is stored
        let mut pending = self.pending.lock();
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            on_fire(id);
        });

        if let Some(previous) = pending.replace(RetryTimer { id, task }) {
            warn!(previous = previous.id, "Replacing a pending retry timer");
            previous.task.abort();
        }

        debug!(timer = id, ?delay, "Retry armed");
        id
    }

    /// Clear the slot if it still holds timer `id`
    ///
    /// Returns false when the timer was cancelled or replaced in the meantime.
    pub(crate) fn take_fired(&self, id: u64) -> bool {
        let mut pending = self.pending.lock();
        match pending.as_ref() {
            Some(timer) if timer.id == id => {
                *pending = None;
                true
            }
            _ => false,
        }
    }

    /// Cancel the pending retry, if any
    pub(crate) fn cancel(&self) -> bool {
        match self.pending.lock().take() {
            Some(timer) => {
                timer.task.abort();
                debug!(timer = timer.id, "Retry cancelled");
                true
            }
            None => false,
        }
    }

    pub(crate) fn is_pending(&self) -> bool {
        self.pending.lock().is_some()
    }
}

impl Drop for Supervisor {
    fn drop(&mut self) {
        if let Some(timer) = self.pending.get_mut().take() {
            timer.task.abort();
        }
    }
}
