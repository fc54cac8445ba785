// ── Heartbeat timer ──
//
// Periodic keep-alive while the channel is acknowledged. Running only
// while Connected; the manager starts and stops it on transitions.

use std::time::Duration;

use tokio::time::{Instant, Interval, MissedTickBehavior};

pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Debug)]
pub(crate) struct Heartbeat {
    period: Duration,
    interval: Option<Interval>,
}

impl Heartbeat {
    pub(crate) fn new(period: Duration) -> Self {
        Self {
            period,
            interval: None,
        }
    }

    /// Arm the timer. The first tick lands one full period from now.
    /// A zero period disables heartbeating.
    pub(crate) fn start(&mut self) {
        if self.period.is_zero() {
            return;
        }
        let mut interval = tokio::time::interval_at(Instant::now() + self.period, self.period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        self.interval = Some(interval);
    }

    pub(crate) fn stop(&mut self) {
        self.interval = None;
    }

    pub(crate) fn is_running(&self) -> bool {
        self.interval.is_some()
    }

    /// Resolves on each tick while running; pends forever when stopped.
    pub(crate) async fn tick(&mut self) {
        match self.interval.as_mut() {
            Some(interval) => {
                interval.tick().await;
            }
            None => std::future::pending::<()>().await,
        }
    }
}
