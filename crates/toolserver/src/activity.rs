//! Client liveness tracking and idle self-shutdown.
//!
//! The UI sends heartbeats while its window is open. Once the grace period
//! after boot has passed, no download is running and no heartbeat arrived
//! within the timeout, the monitor invokes its idle action, which in the
//! binary is a hard process exit.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, warn};

pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(60);
pub const DEFAULT_HEARTBEAT_TIMEOUT: Duration = Duration::from_secs(60);
pub const SAMPLE_INTERVAL: Duration = Duration::from_secs(2);

/// Outcome of one monitor sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Still inside the startup grace period.
    Grace,
    /// At least one download is running.
    Busy,
    /// A heartbeat arrived recently enough.
    Alive,
    /// Nothing is keeping the process around.
    Idle,
}

pub struct ActivityMonitor {
    started: Instant,
    grace_period: Duration,
    heartbeat_timeout: Duration,
    last_heartbeat: Mutex<Instant>,
    active_downloads: Mutex<usize>,
}

impl ActivityMonitor {
    pub fn new(grace_period: Duration, heartbeat_timeout: Duration) -> Self {
        Self::started_at(Instant::now(), grace_period, heartbeat_timeout)
    }

    pub fn started_at(started: Instant, grace_period: Duration, heartbeat_timeout: Duration) -> Self {
        Self {
            started,
            grace_period,
            heartbeat_timeout,
            last_heartbeat: Mutex::new(started),
            active_downloads: Mutex::new(0),
        }
    }

    fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
        mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Records client (or engine) activity.
    pub fn mark_activity(&self) {
        *Self::lock(&self.last_heartbeat) = Instant::now();
    }

    pub fn last_heartbeat(&self) -> Instant {
        *Self::lock(&self.last_heartbeat)
    }

    pub fn active_downloads(&self) -> usize {
        *Self::lock(&self.active_downloads)
    }

    /// Counts a running download until the returned guard is dropped.
    pub fn begin_download(self: &Arc<Self>) -> DownloadGuard {
        *Self::lock(&self.active_downloads) += 1;
        DownloadGuard {
            monitor: Arc::clone(self),
        }
    }

    fn end_download(&self) {
        let mut active = Self::lock(&self.active_downloads);
        *active = active.saturating_sub(1);
    }

    pub fn evaluate(&self, now: Instant) -> Verdict {
        if now.saturating_duration_since(self.started) < self.grace_period {
            return Verdict::Grace;
        }
        if self.active_downloads() > 0 {
            return Verdict::Busy;
        }
        if now.saturating_duration_since(self.last_heartbeat()) > self.heartbeat_timeout {
            Verdict::Idle
        } else {
            Verdict::Alive
        }
    }

    /// Samples every [`SAMPLE_INTERVAL`] until the process is idle, then runs
    /// `on_idle` and returns.
    pub async fn run<F>(self: Arc<Self>, on_idle: F)
    where
        F: FnOnce(),
    {
        let mut ticker = time::interval(SAMPLE_INTERVAL);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            match self.evaluate(Instant::now()) {
                Verdict::Idle => {
                    warn!(
                        timeout_secs = self.heartbeat_timeout.as_secs(),
                        "no heartbeat detected, shutting down"
                    );
                    on_idle();
                    return;
                }
                verdict => debug!(?verdict, "activity sample"),
            }
        }
    }
}

impl Default for ActivityMonitor {
    fn default() -> Self {
        Self::new(DEFAULT_GRACE_PERIOD, DEFAULT_HEARTBEAT_TIMEOUT)
    }
}

/// Keeps the active-download count raised while alive.
pub struct DownloadGuard {
    monitor: Arc<ActivityMonitor>,
}

impl Drop for DownloadGuard {
    fn drop(&mut self) {
        self.monitor.end_download();
    }
}
