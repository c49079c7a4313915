//! Progress-callback trait for job-level conversion events.
//!
//! Inject an [`Arc<dyn ConversionProgressCallback>`] via
//! [`crate::config::ConversionConfigBuilder::progress_callback`] to receive
//! events as the orchestrator works through its job list.
//!
//! Callbacks carry no data back into the pipeline: they are for user
//! feedback only and can never change a job's outcome.
//!
//! # Heartbeat
//!
//! A conversion request can sit on the wire for minutes. While it is in
//! flight a [`Heartbeat`] task calls
//! [`ConversionProgressCallback::on_heartbeat`] at a fixed cadence so a
//! terminal can show a live spinner. The heartbeat is stopped and joined
//! before the response is inspected.

use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::debug;

/// Called by the orchestrator and client as jobs progress.
///
/// Implementations must be `Send + Sync`: the heartbeat fires from a
/// spawned task. All methods have default no-op implementations so callers
/// only override what they care about.
pub trait ConversionProgressCallback: Send + Sync {
    /// Called once before the first job is dispatched.
    fn on_run_start(&self, total_jobs: usize) {
        let _ = total_jobs;
    }

    /// Called just before a job is handed to the client.
    ///
    /// # Arguments
    /// * `index`: 1-indexed position in the job list
    /// * `total`: number of jobs in the run
    /// * `label`: file name (or folder name for image batches)
    fn on_job_start(&self, index: usize, total: usize, label: &str) {
        let _ = (index, total, label);
    }

    /// Called before each HTTP attempt of the current job.
    fn on_attempt(&self, attempt: u32, max_attempts: u32) {
        let _ = (attempt, max_attempts);
    }

    /// Called periodically while a conversion request is in flight.
    fn on_heartbeat(&self, elapsed: Duration) {
        let _ = elapsed;
    }

    /// Called when a job's Markdown has been written.
    fn on_job_complete(&self, index: usize, total: usize, markdown_len: usize) {
        let _ = (index, total, markdown_len);
    }

    /// Called when a job resolves to a failure.
    fn on_job_error(&self, index: usize, total: usize, error: &str) {
        let _ = (index, total, error);
    }

    /// Called once after every job has been attempted.
    fn on_run_complete(&self, total_jobs: usize, success_count: usize) {
        let _ = (total_jobs, success_count);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ConversionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ConversionConfig`].
pub type ProgressCallback = Arc<dyn ConversionProgressCallback>;

/// Default heartbeat cadence.
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_millis(300);

/// Background ticker that reports elapsed time while a request is in flight.
///
/// Created with [`Heartbeat::start`] and torn down with [`Heartbeat::stop`],
/// which signals the task and waits for it to exit. Without a callback no
/// task is spawned at all.
pub struct Heartbeat {
    stop_tx: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<u64>>,
}

impl Heartbeat {
    pub fn start(callback: Option<&ProgressCallback>, interval: Duration) -> Self {
        let Some(cb) = callback else {
            return Self {
                stop_tx: None,
                handle: None,
            };
        };

        let cb = Arc::clone(cb);
        let (stop_tx, mut stop_rx) = oneshot::channel::<()>();
        let handle = tokio::spawn(async move {
            let started = Instant::now();
            let mut ticker = tokio::time::interval(interval);
            let mut ticks = 0u64;
            loop {
                tokio::select! {
                    _ = &mut stop_rx => break,
                    _ = ticker.tick() => {
                        cb.on_heartbeat(started.elapsed());
                        ticks += 1;
                    }
                }
            }
            ticks
        });

        Self {
            stop_tx: Some(stop_tx),
            handle: Some(handle),
        }
    }

    /// Signal the ticker and wait for it to finish. Returns the tick count.
    pub async fn stop(mut self) -> u64 {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }
        match self.handle.take() {
            Some(handle) => match handle.await {
                Ok(ticks) => ticks,
                Err(e) => {
                    debug!("heartbeat task ended abnormally: {e}");
                    0
                }
            },
            None => 0,
        }
    }
}

impl Drop for Heartbeat {
    fn drop(&mut self) {
        // Dropped without `stop()` (e.g. the owning future was cancelled).
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct TrackingCallback {
        heartbeats: AtomicUsize,
        starts: AtomicUsize,
        completes: AtomicUsize,
        errors: AtomicUsize,
    }

    impl TrackingCallback {
        fn new() -> Self {
            Self {
                heartbeats: AtomicUsize::new(0),
                starts: AtomicUsize::new(0),
                completes: AtomicUsize::new(0),
                errors: AtomicUsize::new(0),
            }
        }
    }

    impl ConversionProgressCallback for TrackingCallback {
        fn on_job_start(&self, _index: usize, _total: usize, _label: &str) {
            self.starts.fetch_add(1, Ordering::SeqCst);
        }

        fn on_heartbeat(&self, _elapsed: Duration) {
            self.heartbeats.fetch_add(1, Ordering::SeqCst);
        }

        fn on_job_complete(&self, _index: usize, _total: usize, _markdown_len: usize) {
            self.completes.fetch_add(1, Ordering::SeqCst);
        }

        fn on_job_error(&self, _index: usize, _total: usize, _error: &str) {
            self.errors.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_run_start(2);
        cb.on_job_start(1, 2, "a.pdf");
        cb.on_attempt(1, 3);
        cb.on_heartbeat(Duration::from_secs(1));
        cb.on_job_complete(1, 2, 42);
        cb.on_job_error(2, 2, "boom");
        cb.on_run_complete(2, 1);
    }

    #[test]
    fn tracking_callback_receives_events() {
        let tracker = TrackingCallback::new();
        tracker.on_job_start(1, 2, "a.pdf");
        tracker.on_job_complete(1, 2, 100);
        tracker.on_job_start(2, 2, "b.pdf");
        tracker.on_job_error(2, 2, "HTTP 500");

        assert_eq!(tracker.starts.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.completes.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.errors.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn heartbeat_ticks_until_stopped() {
        let tracker = Arc::new(TrackingCallback::new());
        let cb: ProgressCallback = tracker.clone();

        let hb = Heartbeat::start(Some(&cb), Duration::from_millis(10));
        tokio::time::sleep(Duration::from_millis(60)).await;
        let ticks = hb.stop().await;

        assert!(ticks >= 1, "expected at least one tick, got {ticks}");
        let seen = tracker.heartbeats.load(Ordering::SeqCst);
        assert_eq!(seen as u64, ticks);

        // Joined: no further ticks after stop() returns.
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(tracker.heartbeats.load(Ordering::SeqCst), seen);
    }

    #[tokio::test]
    async fn heartbeat_without_callback_spawns_nothing() {
        let hb = Heartbeat::start(None, Duration::from_millis(1));
        assert_eq!(hb.stop().await, 0);
    }
}
