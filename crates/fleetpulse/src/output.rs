//! Output formatting for streamed events and summaries.
//!
//! Text lines are colored with `owo-colors` when enabled; JSON mode
//! emits one compact object per line. Tables use `tabled`.

use std::io::{self, IsTerminal, Write};

use chrono::{SecondsFormat, Utc};
use owo_colors::OwoColorize;
use serde_json::json;
use tabled::{Table, Tabled, settings::Style};

use fleetpulse_core::{ConnectionState, Notification, NotificationLevel, ServerEvent};

use crate::cli::ColorMode;
use crate::error::CliError;

// ── Color helpers ────────────────────────────────────────────────────

/// Determine whether color output should be enabled.
pub fn should_color(mode: ColorMode) -> bool {
    match mode {
        ColorMode::Always => true,
        ColorMode::Never => false,
        ColorMode::Auto => io::stdout().is_terminal() && std::env::var("NO_COLOR").is_err(),
    }
}

// ── Tables ───────────────────────────────────────────────────────────

pub fn render_table<R: Tabled>(rows: &[R]) -> String {
    Table::new(rows).with(Style::rounded()).to_string()
}

pub fn print_line(line: &str) {
    let mut stdout = io::stdout().lock();
    let _ = writeln!(stdout, "{line}");
}

// ── Event stream printer ─────────────────────────────────────────────

/// Renders the `watch` stream in text or JSON lines.
#[derive(Debug, Clone, Copy)]
pub struct EventPrinter {
    json: bool,
    color: bool,
}

impl EventPrinter {
    pub fn new(json: bool, color: bool) -> Self {
        Self {
            json,
            color: color && !json,
        }
    }

    pub fn state(self, state: ConnectionState) -> Result<(), CliError> {
        if self.json {
            return self.emit_json(&json!({ "at": now(), "state": state.to_string() }));
        }
        let label = match (self.color, state) {
            (false, _) => state.to_string(),
            (true, ConnectionState::Connected) => state.green().bold().to_string(),
            (true, ConnectionState::Connecting) => state.yellow().to_string(),
            (true, ConnectionState::Disconnected) => state.red().to_string(),
        };
        print_line(&format!("{} ● {label}", self.stamp()));
        Ok(())
    }

    pub fn event(self, event: &ServerEvent) -> Result<(), CliError> {
        if self.json {
            let envelope = event.to_envelope();
            return self.emit_json(&json!({
                "at": now(),
                "type": envelope.kind,
                "data": envelope.data,
            }));
        }
        let kind = if self.color {
            event.kind().cyan().to_string()
        } else {
            event.kind().to_owned()
        };
        let detail = describe(event);
        if detail.is_empty() {
            print_line(&format!("{} {kind}", self.stamp()));
        } else {
            print_line(&format!("{} {kind} {detail}", self.stamp()));
        }
        Ok(())
    }

    pub fn notification(self, n: &Notification) -> Result<(), CliError> {
        if self.json {
            return self.emit_json(&json!({
                "at": now(),
                "notification": {
                    "level": n.level.to_string(),
                    "title": n.title,
                    "message": n.message,
                    "persistent": n.is_persistent(),
                }
            }));
        }
        let title = match (self.color, n.level) {
            (false, _) => n.title.clone(),
            (true, NotificationLevel::Critical) => n.title.red().bold().to_string(),
            (true, NotificationLevel::Warning) => n.title.yellow().to_string(),
            (true, NotificationLevel::Info) => n.title.blue().to_string(),
            (true, NotificationLevel::Success) => n.title.green().to_string(),
        };
        print_line(&format!("{} ! {title}: {}", self.stamp(), n.message));
        Ok(())
    }

    fn stamp(self) -> String {
        let at = now();
        if self.color { at.dimmed().to_string() } else { at }
    }

    #[allow(clippy::unused_self)]
    fn emit_json(self, value: &serde_json::Value) -> Result<(), CliError> {
        print_line(&serde_json::to_string(value)?);
        Ok(())
    }
}

fn now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// One-line human summary of an event's payload.
pub fn describe(event: &ServerEvent) -> String {
    match event {
        ServerEvent::Connected => "server acknowledged".into(),
        ServerEvent::Error(Some(data)) => data.to_string(),
        ServerEvent::AlertTriggered(alert) => format!(
            "[{}] {}: {}",
            alert.severity.as_str(),
            alert.device_name,
            alert.message
        ),
        ServerEvent::AlertResolved(resolved) => {
            format!("#{} {}", resolved.record_id, resolved.reason)
        }
        ServerEvent::DeviceRealtime(payload) => {
            let ids: Vec<String> = payload.updates.iter().map(|u| u.id.to_string()).collect();
            format!("{} update(s): {}", payload.updates.len(), ids.join(", "))
        }
        ServerEvent::DeviceOffline(payload) => {
            let ids: Vec<String> = payload.device_ids.iter().map(ToString::to_string).collect();
            format!("offline: {}", ids.join(", "))
        }
        _ => String::new(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn describe_alert() {
        let event = ServerEvent::decode(
            r#"{"type":"alert:triggered","data":{"severity":"critical","message":"Overheat","deviceName":"Kiln"}}"#,
        )
        .unwrap();
        assert_eq!(describe(&event), "[critical] Kiln: Overheat");
    }

    #[test]
    fn describe_realtime_lists_ids() {
        let event = ServerEvent::decode(
            r#"{"type":"device:realtime","data":{"updates":[{"id":3},{"id":8}]}}"#,
        )
        .unwrap();
        assert_eq!(describe(&event), "2 update(s): 3, 8");
    }

    #[test]
    fn describe_crud_is_empty() {
        let event = ServerEvent::decode(r#"{"type":"link:created"}"#).unwrap();
        assert_eq!(describe(&event), "");
    }

    #[test]
    fn json_disables_color() {
        let printer = EventPrinter::new(true, true);
        assert!(!printer.color);
    }
}
