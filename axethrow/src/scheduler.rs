//! Session timers.
//!
//! A [`TimerSet`] owns one cancellation token for a group of timers. Every
//! timer task it spawns sleeps on that token, so cancelling the set stops
//! all of them at once. A callback that is already running is never
//! interrupted; it simply is not re-armed afterwards.

use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::trace;

/// A group of timers cancelled together.
///
/// Dropping the set cancels it.
#[derive(Debug, Default)]
pub struct TimerSet {
    cancel: CancellationToken,
}

impl TimerSet {
    /// Creates an empty, live timer set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a token cancelled together with this set.
    #[must_use]
    pub fn child_token(&self) -> CancellationToken {
        self.cancel.child_token()
    }

    /// Cancels every timer in the set. Idempotent.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Returns `true` once the set has been cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Runs `f` once after `delay` unless the set is cancelled first.
    pub fn after<F, Fut>(&self, name: &'static str, delay: Duration, f: F) -> JoinHandle<()>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let cancel = self.cancel.clone();
        tokio::spawn(async move {
            tokio::select! {
                () = cancel.cancelled() => {
                    trace!(timer = name, "timer cancelled before firing");
                }
                () = tokio::time::sleep(delay) => f().await,
            }
        })
    }

    /// Runs `f` after `first_delay`, then again after whatever delay it
    /// returns, until it returns `None` or the set is cancelled.
    pub fn rearm<F, Fut>(&self, name: &'static str, first_delay: Duration, mut f: F) -> JoinHandle<()>
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = Option<Duration>> + Send + 'static,
    {
        let cancel = self.cancel.clone();
        tokio::spawn(async move {
            let mut delay = first_delay;
            loop {
                tokio::select! {
                    () = cancel.cancelled() => break,
                    () = tokio::time::sleep(delay) => {}
                }
                match f().await {
                    Some(next) if !cancel.is_cancelled() => delay = next,
                    _ => break,
                }
            }
            trace!(timer = name, "timer finished");
        })
    }

    /// Runs `f` every `period` while it returns `true`.
    pub fn every<F, Fut>(&self, name: &'static str, period: Duration, mut f: F) -> JoinHandle<()>
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = bool> + Send + 'static,
    {
        self.rearm(name, period, move || {
            let tick = f();
            async move { tick.await.then_some(period) }
        })
    }
}

impl Drop for TimerSet {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
