use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::info;

#[derive(Debug)]
struct Activity {
    last: Instant,
    breached: bool,
}

/// Shared record of the last user interaction.
///
/// Cloned into every input path; each clone touches the same timestamp.
#[derive(Debug, Clone)]
pub struct ActivityClock {
    inner: Arc<Mutex<Activity>>,
}

impl ActivityClock {
    fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Activity {
                last: Instant::now(),
                breached: false,
            })),
        }
    }

    pub fn touch(&self) {
        let mut activity = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        activity.last = Instant::now();
        activity.breached = false;
    }

    pub fn idle_for(&self) -> Duration {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .last
            .elapsed()
    }

    /// Marks the current idle stretch as handled. True only for the first
    /// check that finds it longer than `threshold`.
    fn breach(&self, threshold: Duration) -> bool {
        let mut activity = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        if activity.breached || activity.last.elapsed() <= threshold {
            return false;
        }
        activity.breached = true;
        true
    }
}

/// Fires `on_idle` once per idle stretch longer than the threshold.
pub struct InactivityMonitor {
    clock: ActivityClock,
    task: JoinHandle<()>,
}

impl InactivityMonitor {
    /// Starts observing immediately; the clock counts as touched at spawn time.
    pub fn spawn<F>(idle_timeout: Duration, check_every: Duration, on_idle: F) -> Self
    where
        F: Fn() + Send + 'static,
    {
        let clock = ActivityClock::new();
        let watched = clock.clone();
        let task = tokio::spawn(async move {
            let mut ticker = time::interval_at(Instant::now() + check_every, check_every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if watched.breach(idle_timeout) {
                    info!(
                        idle_secs = watched.idle_for().as_secs(),
                        "inactivity threshold reached"
                    );
                    on_idle();
                }
            }
        });
        Self { clock, task }
    }

    pub fn clock(&self) -> ActivityClock {
        self.clock.clone()
    }

    pub fn touch(&self) {
        self.clock.touch();
    }
}

impl Drop for InactivityMonitor {
    fn drop(&mut self) {
        self.task.abort();
    }
}
