use std::future::Future;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use tokio_util::sync::CancellationToken;

/// One-shot timers that can be cancelled together.
///
/// Each timer is a tokio task holding a child of the set's root token;
/// [`cancel_all`](Self::cancel_all) cancels the root and installs a fresh one.
#[derive(Debug, Default)]
pub struct TimerSet {
    root: Mutex<CancellationToken>,
}

impl TimerSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `callback` once `delay` has elapsed, unless cancelled first.
    /// Must be called from within a tokio runtime.
    /// A callback that already started is not interrupted by cancellation.
    pub fn after<F>(&self, delay: Duration, callback: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let token = self
            .root
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .child_token();
        tokio::spawn(async move {
            tokio::select! {
                biased;
                _ = token.cancelled() => {}
                _ = tokio::time::sleep(delay) => callback.await,
            }
        });
    }

    /// Cancel every timer armed so far. Timers armed afterwards are unaffected.
    pub fn cancel_all(&self) {
        let mut root = self.root.lock().unwrap_or_else(PoisonError::into_inner);
        root.cancel();
        *root = CancellationToken::new();
    }
}
