// ── User-facing notifications ──
//
// Alerts pushed by the server surface through a `Notifier`. The engine
// decides level, text, and dismissal; the sink decides presentation.

use std::time::Duration;

use tokio::sync::mpsc;

use fleetpulse_api::{AlertResolved, AlertSeverity, AlertTriggered};

/// How long non-critical notifications stay on screen.
pub const AUTO_DISMISS: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum NotificationLevel {
    Critical,
    Warning,
    Info,
    Success,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub level: NotificationLevel,
    pub title: String,
    pub message: String,
    /// `None` keeps the notification until the user dismisses it.
    pub auto_dismiss: Option<Duration>,
}

impl Notification {
    /// Notification for `alert:triggered`. Critical alerts persist.
    pub fn alert_triggered(alert: &AlertTriggered) -> Self {
        let level = match alert.severity {
            AlertSeverity::Critical => NotificationLevel::Critical,
            AlertSeverity::Info => NotificationLevel::Info,
            AlertSeverity::Warning | AlertSeverity::Other(_) => NotificationLevel::Warning,
        };
        let title = if alert.device_name.is_empty() {
            format!("{} alert", alert.severity.as_str())
        } else {
            format!("{} alert: {}", alert.severity.as_str(), alert.device_name)
        };

        Self {
            level,
            title,
            message: alert.message.clone(),
            auto_dismiss: (!alert.severity.is_critical()).then_some(AUTO_DISMISS),
        }
    }

    /// Notification for `alert:resolved`.
    pub fn alert_resolved(resolved: &AlertResolved) -> Self {
        Self {
            level: NotificationLevel::Success,
            title: format!("Alert #{} resolved", resolved.record_id),
            message: resolved.reason.clone(),
            auto_dismiss: Some(AUTO_DISMISS),
        }
    }

    pub fn is_persistent(&self) -> bool {
        self.auto_dismiss.is_none()
    }
}

// ── Sinks ────────────────────────────────────────────────────────────

/// Receives notifications from the event router. Must not block.
pub trait Notifier: Send + Sync + 'static {
    fn notify(&self, notification: Notification);
}

/// Writes notifications to the `tracing` log.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, n: Notification) {
        match n.level {
            NotificationLevel::Critical | NotificationLevel::Warning => {
                tracing::warn!(level = %n.level, title = %n.title, message = %n.message, "notification");
            }
            NotificationLevel::Info | NotificationLevel::Success => {
                tracing::info!(level = %n.level, title = %n.title, message = %n.message, "notification");
            }
        }
    }
}

/// Forwards notifications to a channel. Dropped silently once the
/// receiver is gone.
impl Notifier for mpsc::UnboundedSender<Notification> {
    fn notify(&self, notification: Notification) {
        let _ = self.send(notification);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triggered(severity: &str) -> AlertTriggered {
        AlertTriggered {
            severity: AlertSeverity::from(severity.to_owned()),
            message: "Temperature above threshold".into(),
            device_name: "Boiler 2".into(),
        }
    }

    #[test]
    fn critical_alerts_persist() {
        let n = Notification::alert_triggered(&triggered("critical"));
        assert_eq!(n.level, NotificationLevel::Critical);
        assert!(n.is_persistent());
        assert_eq!(n.title, "critical alert: Boiler 2");
    }

    #[test]
    fn other_alerts_auto_dismiss() {
        for severity in ["warning", "info", "minor"] {
            let n = Notification::alert_triggered(&triggered(severity));
            assert_eq!(n.auto_dismiss, Some(AUTO_DISMISS), "{severity}");
        }
        assert_eq!(
            Notification::alert_triggered(&triggered("minor")).level,
            NotificationLevel::Warning
        );
    }

    #[test]
    fn resolved_is_transient_success() {
        let n = Notification::alert_resolved(&AlertResolved {
            record_id: 88,
            reason: "Value back in range".into(),
        });
        assert_eq!(n.level, NotificationLevel::Success);
        assert_eq!(n.title, "Alert #88 resolved");
        assert!(!n.is_persistent());
    }

    #[test]
    fn level_renders_lowercase() {
        assert_eq!(NotificationLevel::Critical.to_string(), "critical");
    }
}
