//! Wakeup signal — a counting, cross-task notification primitive with a
//! pollable handle for the host's event loop.

use std::sync::Arc;

use tokio::sync::Semaphore;

/// Counting signal: one `raise` per enqueued unit, one consume per
/// delivered unit. Safe for many raisers and one logical consumer.
///
/// The count mirrors queue occupancy. It may lag a push for the instant
/// between the queue unlocking and the raise landing, but it converges
/// before the unit can be consumed, so `try_consume` returning `true`
/// always guarantees a queued unit.
#[derive(Clone)]
pub struct WakeupSignal {
    sem: Arc<Semaphore>,
}

impl WakeupSignal {
    pub fn new() -> Self {
        Self {
            sem: Arc::new(Semaphore::new(0)),
        }
    }

    /// Increment the counter and wake any waiter.
    pub fn raise(&self) {
        self.sem.add_permits(1);
    }

    /// Decrement the counter if it is positive. Never blocks.
    pub fn try_consume(&self) -> bool {
        match self.sem.try_acquire() {
            Ok(permit) => {
                permit.forget();
                true
            }
            Err(_) => false,
        }
    }

    /// Wait until the counter is positive, then decrement it.
    ///
    /// Returns `false` if the signal was closed by shutdown instead.
    pub async fn wait_consume(&self) -> bool {
        match self.sem.acquire().await {
            Ok(permit) => {
                permit.forget();
                true
            }
            Err(_) => false,
        }
    }

    /// Current count.
    pub fn pending(&self) -> usize {
        self.sem.available_permits()
    }

    /// Waitable handle for the host's event loop.
    pub fn poll_handle(&self) -> PollHandle {
        PollHandle {
            sem: self.sem.clone(),
        }
    }

    /// Unblock every waiter; `readable` and `wait_consume` report closure
    /// from here on. Called once at shutdown.
    pub fn close(&self) {
        self.sem.close();
    }
}

impl Default for WakeupSignal {
    fn default() -> Self {
        Self::new()
    }
}

/// Cloneable, waitable view of a [`WakeupSignal`].
///
/// `readable` waits without consuming, so the holder can park on it in a
/// `select!` next to sockets and timers, then call `receive` on the facade.
#[derive(Clone)]
pub struct PollHandle {
    sem: Arc<Semaphore>,
}

impl PollHandle {
    /// Wait until at least one unit is queued. Returns `false` once the
    /// signal is closed by shutdown.
    pub async fn readable(&self) -> bool {
        // Acquire and immediately release: the count is observed, not spent.
        match self.sem.acquire().await {
            Ok(_permit) => true,
            Err(_) => false,
        }
    }

    /// Non-blocking probe.
    pub fn is_readable(&self) -> bool {
        self.sem.available_permits() > 0
    }
}
