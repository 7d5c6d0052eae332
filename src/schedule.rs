//! Timer plumbing for the live display layer.
//!
//! Two primitives: a [`Debouncer`] that coalesces bursts of edits into one
//! recomputation after a quiet period, and a [`Ticker`] that fires a
//! callback at a fixed interval. Both abort their background task on drop
//! so a torn-down session leaves no timers running.

use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time;

/// Runs an action once the caller has been quiet for the configured
/// period. Each `trigger` cancels the previous pending run, so only the
/// last edit in a burst produces work.
pub struct Debouncer {
    quiet: Duration,
    pending: Option<JoinHandle<()>>,
}

impl Debouncer {
    pub fn new(quiet: Duration) -> Self {
        Self {
            quiet,
            pending: None,
        }
    }

    /// Schedule `action` to run after the quiet period, replacing any
    /// previously scheduled run.
    pub fn trigger<F, Fut>(&mut self, action: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send,
    {
        self.cancel();
        let quiet = self.quiet;
        self.pending = Some(tokio::spawn(async move {
            time::sleep(quiet).await;
            action().await;
        }));
    }

    /// Drop the pending run, if any, without executing it.
    pub fn cancel(&mut self) {
        if let Some(handle) = self.pending.take() {
            handle.abort();
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending
            .as_ref()
            .map(|h| !h.is_finished())
            .unwrap_or(false)
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Fires `action` every `interval` until stopped or dropped.
pub struct Ticker {
    handle: JoinHandle<()>,
}

impl Ticker {
    pub fn spawn<F, Fut>(interval: Duration, action: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send,
    {
        let mut action = action;
        let handle = tokio::spawn(async move {
            let mut clock = time::interval(interval);
            // The first tick of a tokio interval completes immediately.
            clock.tick().await;
            loop {
                clock.tick().await;
                action().await;
            }
        });
        Self { handle }
    }

    pub fn stop(self) {
        self.handle.abort();
    }
}

impl Drop for Ticker {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_debouncer_coalesces_burst() {
        let hits = Arc::new(AtomicUsize::new(0));
        let mut debouncer = Debouncer::new(Duration::from_millis(20));

        for _ in 0..5 {
            let hits = hits.clone();
            debouncer.trigger(move || async move {
                hits.fetch_add(1, Ordering::SeqCst);
            });
            time::sleep(Duration::from_millis(5)).await;
        }
        time::sleep(Duration::from_millis(60)).await;
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_debouncer_cancel_suppresses_run() {
        let hits = Arc::new(AtomicUsize::new(0));
        let mut debouncer = Debouncer::new(Duration::from_millis(10));

        let counter = hits.clone();
        debouncer.trigger(move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        debouncer.cancel();
        time::sleep(Duration::from_millis(40)).await;
        assert_eq!(hits.load(Ordering::SeqCst), 0);
        assert!(!debouncer.is_pending());
    }

    #[tokio::test]
    async fn test_ticker_fires_repeatedly_and_stops_on_drop() {
        let hits = Arc::new(AtomicUsize::new(0));
        {
            let counter = hits.clone();
            let _ticker = Ticker::spawn(Duration::from_millis(10), move || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                }
            });
            time::sleep(Duration::from_millis(55)).await;
        }
        let after_drop = hits.load(Ordering::SeqCst);
        assert!(after_drop >= 3, "expected several ticks, got {after_drop}");
        time::sleep(Duration::from_millis(30)).await;
        assert_eq!(hits.load(Ordering::SeqCst), after_drop);
    }
}
