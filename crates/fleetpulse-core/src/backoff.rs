// ── Reconnect backoff ──
//
// Pure delay calculation plus the single owned reconnect timer the
// connection manager arms between attempts.

use std::pin::Pin;
use std::time::Duration;

use tokio::time::{Instant, Sleep};

/// Exponential backoff configuration for reconnection.
///
/// `delay = min(initial_delay * 2^attempt, max_delay)`, deterministic
/// and saturating for any attempt count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    /// Delay before the first reconnection attempt. Default: 1s.
    pub initial_delay: Duration,

    /// Upper bound on backoff delay. Default: 30s.
    pub max_delay: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl BackoffPolicy {
    pub fn new(initial_delay: Duration, max_delay: Duration) -> Self {
        Self {
            initial_delay,
            max_delay,
        }
    }

    /// Delay to wait before reconnect attempt number `attempt` (0-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = 1_u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.initial_delay
            .checked_mul(factor)
            .map_or(self.max_delay, |d| d.min(self.max_delay))
    }
}

// ── ReconnectTimer ───────────────────────────────────────────────────

/// The one pending reconnect, if any.
///
/// Scheduling replaces any previous deadline, so there is never more
/// than one timer outstanding.
#[derive(Debug, Default)]
pub(crate) struct ReconnectTimer {
    sleep: Option<Pin<Box<Sleep>>>,
}

impl ReconnectTimer {
    pub(crate) fn schedule(&mut self, delay: Duration) {
        self.sleep = Some(Box::pin(tokio::time::sleep_until(Instant::now() + delay)));
    }

    pub(crate) fn cancel(&mut self) {
        self.sleep = None;
    }

    pub(crate) fn is_pending(&self) -> bool {
        self.sleep.is_some()
    }

    /// Resolves when the pending timer elapses; pends forever when idle.
    /// Cancel-safe: dropping the future leaves the deadline armed.
    pub(crate) async fn fired(&mut self) {
        if let Some(sleep) = self.sleep.as_mut() {
            sleep.as_mut().await;
            self.sleep = None;
        } else {
            std::future::pending::<()>().await;
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn default_policy() {
        let policy = BackoffPolicy::default();
        assert_eq!(policy.initial_delay, Duration::from_secs(1));
        assert_eq!(policy.max_delay, Duration::from_secs(30));
    }

    #[test]
    fn delay_doubles_until_cap() {
        let policy = BackoffPolicy::default();
        assert_eq!(policy.delay(0), ms(1000));
        assert_eq!(policy.delay(1), ms(2000));
        assert_eq!(policy.delay(2), ms(4000));
        assert_eq!(policy.delay(4), ms(16000));
        assert_eq!(policy.delay(5), ms(30000));
        assert_eq!(policy.delay(10), ms(30000));
    }

    #[test]
    fn cap_holds_for_huge_attempts() {
        let policy = BackoffPolicy::default();
        for attempt in [31, 32, 63, 64, 1000, u32::MAX] {
            assert_eq!(policy.delay(attempt), ms(30000), "attempt {attempt}");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn timer_fires_once_after_delay() {
        let mut timer = ReconnectTimer::default();
        assert!(!timer.is_pending());

        let start = Instant::now();
        timer.schedule(ms(1500));
        assert!(timer.is_pending());

        timer.fired().await;
        assert_eq!(start.elapsed(), ms(1500));
        assert!(!timer.is_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn rescheduling_replaces_deadline() {
        let mut timer = ReconnectTimer::default();
        let start = Instant::now();

        timer.schedule(ms(10_000));
        timer.schedule(ms(2000));
        timer.fired().await;

        assert_eq!(start.elapsed(), ms(2000));
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_timer_never_fires() {
        let mut timer = ReconnectTimer::default();
        timer.schedule(ms(1000));
        timer.cancel();

        let fired = tokio::time::timeout(ms(60_000), timer.fired()).await;
        assert!(fired.is_err(), "cancelled timer fired");
    }
}
