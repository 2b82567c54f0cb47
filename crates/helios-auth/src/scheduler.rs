//! Background renewal scheduling.
//!
//! Two tasks run while a session is established:
//!
//! - The renewal loop sleeps for the current interval and triggers a
//!   renewal on each tick. The interval lives in a watch channel; a
//!   renewal that reports a new expiry updates it and the loop
//!   recomputes its deadline immediately.
//! - The sleep-check loop samples a monotonic clock on a short period.
//!   A gap of at least twice the period means the process was suspended
//!   (laptop sleep), so a renewal is triggered out of band rather than
//!   waiting for a possibly-stale main tick.
//!
//! Serialization of renewals themselves (one exchange in flight, excess
//! triggers dropped) is the caller's concern; see the renewal lock in
//! the client.

use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::debug;

/// Never renew more often than this, regardless of reported expiry.
pub(crate) const REFRESH_INTERVAL_FLOOR: Duration = Duration::from_secs(30);

/// Renew this long before the reported expiry, to survive clock skew
/// and in-flight latency.
pub(crate) const REFRESH_SAFETY_MARGIN: Duration = Duration::from_secs(45);

/// Sampling period of the sleep-check loop.
pub(crate) const SLEEP_SAMPLE_PERIOD: Duration = Duration::from_secs(2);

/// What caused a renewal attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RefreshTrigger {
    /// First renewal on startup.
    Startup,
    /// Scheduled tick of the renewal loop.
    Timer,
    /// Wake-from-suspend detection.
    Wake,
    /// Explicit application call.
    Manual,
}

/// Interval before the next renewal for a token with the given
/// lifetime, unless a fixed interval is configured.
pub(crate) fn refresh_interval(expires_in: Duration, fixed: Option<Duration>) -> Duration {
    match fixed {
        Some(interval) => interval,
        None => expires_in
            .saturating_sub(REFRESH_SAFETY_MARGIN)
            .max(REFRESH_INTERVAL_FLOOR),
    }
}

/// A sampling gap this large means the process was suspended.
pub(crate) fn suspension_detected(elapsed: Duration, sample_period: Duration) -> bool {
    elapsed >= sample_period * 2
}

pub(crate) struct RefreshScheduler {
    interval: watch::Sender<Duration>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl RefreshScheduler {
    pub fn new() -> Self {
        let (interval, _) = watch::channel(REFRESH_INTERVAL_FLOOR);
        Self {
            interval,
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// Update the renewal interval. The renewal loop recomputes its
    /// deadline from now.
    pub fn set_interval(&self, interval: Duration) {
        self.interval.send_replace(interval);
    }

    /// Spawn the renewal and sleep-check loops, replacing any previous
    /// ones. `refresh` resolves to false once its owner is gone, which
    /// ends the loop.
    pub fn start<F, Fut>(&self, refresh: F)
    where
        F: Fn(RefreshTrigger) -> Fut + Send + Sync + Clone + 'static,
        Fut: Future<Output = bool> + Send + 'static,
    {
        self.stop();

        let mut tasks = self.tasks.lock().expect("scheduler lock poisoned");
        tasks.push(tokio::spawn(renewal_loop(
            self.interval.subscribe(),
            refresh.clone(),
        )));
        tasks.push(tokio::spawn(sleep_check_loop(refresh)));
        debug!(interval = ?*self.interval.borrow(), "Renewal scheduler started");
    }

    /// Abort both loops.
    pub fn stop(&self) {
        let mut tasks = self.tasks.lock().expect("scheduler lock poisoned");
        if tasks.is_empty() {
            return;
        }
        for task in tasks.drain(..) {
            task.abort();
        }
        debug!("Renewal scheduler stopped");
    }
}

impl Drop for RefreshScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn renewal_loop<F, Fut>(mut interval: watch::Receiver<Duration>, refresh: F)
where
    F: Fn(RefreshTrigger) -> Fut,
    Fut: Future<Output = bool>,
{
    loop {
        let deadline = *interval.borrow_and_update();
        tokio::select! {
            _ = tokio::time::sleep(deadline) => {
                if !refresh(RefreshTrigger::Timer).await {
                    break;
                }
            }
            changed = interval.changed() => {
                if changed.is_err() {
                    break;
                }
                // Deadline recomputed from the new interval.
            }
        }
    }
}

async fn sleep_check_loop<F, Fut>(refresh: F)
where
    F: Fn(RefreshTrigger) -> Fut,
    Fut: Future<Output = bool>,
{
    let mut ticker = tokio::time::interval(SLEEP_SAMPLE_PERIOD);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    ticker.tick().await;

    let mut last_sample = std::time::Instant::now();
    loop {
        ticker.tick().await;
        let now = std::time::Instant::now();
        if suspension_detected(now.duration_since(last_sample), SLEEP_SAMPLE_PERIOD) {
            debug!(
                gap = ?now.duration_since(last_sample),
                "Wake from suspend detected, renewing out of band"
            );
            if !refresh(RefreshTrigger::Wake).await {
                break;
            }
        }
        last_sample = now;
    }
}
