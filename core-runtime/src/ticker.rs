//! # Restartable Ticker
//!
//! One periodic task per session (position reporting, amplitude metering).
//!
//! Starting a ticker always cancels the schedule it replaces, so a session
//! can never have two tick loops running at once. The tick callback returns
//! a [`TickControl`] so a loop can end itself (for example when a track
//! finishes in `Pause` mode) without aborting its own task.

use parking_lot::Mutex;
use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::trace;

/// Returned by each tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickControl {
    Continue,
    Break,
}

struct TickerTask {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

/// Holder for at most one running tick loop.
pub struct Ticker {
    name: &'static str,
    task: Mutex<Option<TickerTask>>,
}

impl Ticker {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            task: Mutex::new(None),
        }
    }

    /// Start ticking every `period`, replacing any running schedule.
    ///
    /// The first tick fires one full period after the call. Must be called
    /// from within a tokio runtime.
    pub fn start<F, Fut>(&self, period: Duration, mut on_tick: F)
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = TickControl> + Send + 'static,
    {
        let period = period.max(Duration::from_millis(1));
        let token = CancellationToken::new();
        let child = token.clone();
        let name = self.name;

        let handle = tokio::spawn(async move {
            let mut interval = interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = child.cancelled() => break,
                    _ = interval.tick() => {
                        if on_tick().await == TickControl::Break {
                            trace!(ticker = name, "tick loop ended itself");
                            break;
                        }
                    }
                }
            }
        });

        let previous = self.task.lock().replace(TickerTask { token, handle });
        if let Some(previous) = previous {
            previous.token.cancel();
            previous.handle.abort();
        }
        trace!(ticker = self.name, period_ms = period.as_millis() as u64, "ticker started");
    }

    /// Cancel the running schedule, if any. Idempotent.
    pub fn stop(&self) {
        if let Some(task) = self.task.lock().take() {
            task.token.cancel();
            task.handle.abort();
            trace!(ticker = self.name, "ticker stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.task
            .lock()
            .as_ref()
            .is_some_and(|task| !task.handle.is_finished() && !task.token.is_cancelled())
    }
}

impl Drop for Ticker {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for Ticker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ticker")
            .field("name", &self.name)
            .field("running", &self.is_running())
            .finish()
    }
}
