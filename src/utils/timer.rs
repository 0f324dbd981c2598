use std::time::Duration;
use tokio::task::AbortHandle;
use tracing::trace;

/// Whether an interval callback wants to keep running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlFlow {
    Continue,
    Break,
}

/// A named, cancelable timer running a callback on the tokio runtime.
///
/// Dropping the handle cancels the timer, so a component that stores its handles
/// in fields gets cancellation on teardown for free. A message the callback
/// already posted before cancellation can still be sitting in the owner's inbox;
/// owners guard against that with a generation or sequence check.
#[derive(Debug)]
pub struct TimerHandle {
    name: &'static str,
    handle: AbortHandle,
}

impl TimerHandle {
    /// Run `callback` once after `delay`.
    pub fn once<F>(name: &'static str, delay: Duration, callback: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        trace!("Arming timer '{}' for {:?}", name, delay);
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            callback();
        });
        Self {
            name,
            handle: task.abort_handle(),
        }
    }

    /// Run `callback` every `period`, first one period from now, until it
    /// returns [`ControlFlow::Break`] or the handle is dropped.
    pub fn interval<F>(name: &'static str, period: Duration, mut callback: F) -> Self
    where
        F: FnMut() -> ControlFlow + Send + 'static,
    {
        trace!("Arming interval '{}' every {:?}", name, period);
        let task = tokio::spawn(async move {
            let start = tokio::time::Instant::now() + period;
            let mut ticker = tokio::time::interval_at(start, period);
            loop {
                ticker.tick().await;
                if callback() == ControlFlow::Break {
                    break;
                }
            }
        });
        Self {
            name,
            handle: task.abort_handle(),
        }
    }

    /// Cancel explicitly. Equivalent to dropping the handle.
    pub fn cancel(self) {
        trace!("Canceling timer '{}'", self.name);
    }
}

impl Drop for TimerHandle {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
