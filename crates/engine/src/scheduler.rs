//! Cancellable one-shot timers.

use std::time::Duration;

/// Owns a scheduled callback; dropping the handle cancels the timer.
///
/// Cancellation is synchronous on drop: once the handle is gone the
/// callback will not run.
#[derive(Debug)]
pub struct ScopedTimer {
    handle: tokio::task::AbortHandle,
}

impl Drop for ScopedTimer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Run `cb` once after `delay`, unless the returned handle is dropped
/// first.
pub(crate) fn schedule<F>(delay: Duration, cb: F) -> ScopedTimer
where
    F: FnOnce() + Send + 'static,
{
    let handle = tokio::task::spawn(async move {
        tokio::time::sleep(delay).await;
        cb();
    })
    .abort_handle();
    ScopedTimer { handle }
}
