//! In-flight request accounting for graceful drain.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tokio::sync::Notify;

/// Counts admission requests currently being handled.
///
/// Each handler holds an [`InFlightGuard`] for its lifetime; dropping the last
/// guard wakes anyone waiting in [`InFlight::wait_idle`].
#[derive(Debug, Default)]
pub struct InFlight {
    count: AtomicUsize,
    idle: Notify,
}

impl InFlight {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a request; the returned guard releases it on drop
    pub fn enter(self: &Arc<Self>) -> InFlightGuard {
        self.count.fetch_add(1, Ordering::AcqRel);
        InFlightGuard {
            tracker: Arc::clone(self),
        }
    }

    /// Requests currently in flight
    pub fn count(&self) -> usize {
        self.count.load(Ordering::Acquire)
    }

    /// Resolve once no request is in flight
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.count() == 0 {
                return;
            }
            notified.await;
        }
    }

    /// Wait for idle up to `timeout`.
    ///
    /// Returns the number of requests still running when the timeout hit, or
    /// 0 on a clean drain.
    pub async fn drain(&self, timeout: Duration) -> usize {
        match tokio::time::timeout(timeout, self.wait_idle()).await {
            Ok(()) => 0,
            Err(_) => self.count(),
        }
    }
}

/// RAII marker for one in-flight request
#[derive(Debug)]
pub struct InFlightGuard {
    tracker: Arc<InFlight>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        if self.tracker.count.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.tracker.idle.notify_waiters();
        }
    }
}
