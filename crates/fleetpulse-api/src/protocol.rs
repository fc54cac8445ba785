//! Wire protocol for the push channel.
//!
//! Every frame is a JSON text message shaped `{ "type": ..., "data": ... }`.
//! [`Envelope`] is the raw unit; [`ServerEvent`] is the closed, typed view
//! of the frames this client understands, with an [`ServerEvent::Other`]
//! fallback for CRUD notifications that only need their type string.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::Error;

// ── Event type names ─────────────────────────────────────────────────

pub const CONNECTED: &str = "connected";
pub const PONG: &str = "pong";
pub const ERROR: &str = "error";
pub const ALERT_TRIGGERED: &str = "alert:triggered";
pub const ALERT_RESOLVED: &str = "alert:resolved";
pub const DEVICE_REALTIME: &str = "device:realtime";
pub const DEVICE_OFFLINE: &str = "device:offline";

// ── Envelope ─────────────────────────────────────────────────────────

/// Raw frame envelope. `kind` is the dispatch discriminant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub kind: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl Envelope {
    /// Parse a text frame into an envelope.
    pub fn parse(text: &str) -> Result<Self, Error> {
        serde_json::from_str(text).map_err(|e| Error::Decode {
            message: e.to_string(),
            body: text.to_owned(),
        })
    }

    /// Decode `data` into a typed payload. A missing `data` field decodes
    /// as an empty object so payloads with all-default fields still parse.
    fn payload<T: DeserializeOwned>(&self) -> Result<T, Error> {
        let value = self
            .data
            .clone()
            .unwrap_or_else(|| serde_json::Value::Object(serde_json::Map::new()));
        serde_json::from_value(value).map_err(|e| Error::Decode {
            message: format!("{}: {e}", self.kind),
            body: self.data.as_ref().map(ToString::to_string).unwrap_or_default(),
        })
    }
}

// ── Client → server ──────────────────────────────────────────────────

/// Frames the client sends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ClientMessage {
    /// Heartbeat keep-alive.
    Ping,
}

impl ClientMessage {
    /// Serialize into a text frame.
    pub fn encode(&self) -> Result<String, Error> {
        Ok(serde_json::to_string(self)?)
    }
}

// ── Server → client ──────────────────────────────────────────────────

/// A decoded server frame.
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum ServerEvent {
    /// The server accepted the channel.
    Connected,
    /// Heartbeat acknowledgement.
    Pong,
    /// Server-side error report. The payload shape is not fixed.
    Error(Option<serde_json::Value>),
    AlertTriggered(AlertTriggered),
    AlertResolved(AlertResolved),
    DeviceRealtime(RealtimePayload),
    DeviceOffline(OfflinePayload),
    /// Any other type. Resolved against the invalidation table.
    Other {
        kind: String,
        data: Option<serde_json::Value>,
    },
}

impl ServerEvent {
    /// Decode a text frame straight into a typed event.
    pub fn decode(text: &str) -> Result<Self, Error> {
        Self::try_from(Envelope::parse(text)?)
    }

    /// The wire type string of this event.
    pub fn kind(&self) -> &str {
        match self {
            Self::Connected => CONNECTED,
            Self::Pong => PONG,
            Self::Error(_) => ERROR,
            Self::AlertTriggered(_) => ALERT_TRIGGERED,
            Self::AlertResolved(_) => ALERT_RESOLVED,
            Self::DeviceRealtime(_) => DEVICE_REALTIME,
            Self::DeviceOffline(_) => DEVICE_OFFLINE,
            Self::Other { kind, .. } => kind,
        }
    }

    /// Re-encode as a wire envelope (for logging and JSON output).
    pub fn to_envelope(&self) -> Envelope {
        let data = match self {
            Self::Connected | Self::Pong => None,
            Self::Error(data) | Self::Other { data, .. } => data.clone(),
            Self::AlertTriggered(p) => serde_json::to_value(p).ok(),
            Self::AlertResolved(p) => serde_json::to_value(p).ok(),
            Self::DeviceRealtime(p) => serde_json::to_value(p).ok(),
            Self::DeviceOffline(p) => serde_json::to_value(p).ok(),
        };
        Envelope {
            kind: self.kind().to_owned(),
            data,
        }
    }
}

impl TryFrom<Envelope> for ServerEvent {
    type Error = Error;

    fn try_from(envelope: Envelope) -> Result<Self, <Self as TryFrom<Envelope>>::Error> {
        let event = match envelope.kind.as_str() {
            CONNECTED => Self::Connected,
            PONG => Self::Pong,
            ERROR => Self::Error(envelope.data),
            ALERT_TRIGGERED => Self::AlertTriggered(envelope.payload()?),
            ALERT_RESOLVED => Self::AlertResolved(envelope.payload()?),
            DEVICE_REALTIME => Self::DeviceRealtime(envelope.payload()?),
            DEVICE_OFFLINE => Self::DeviceOffline(envelope.payload()?),
            _ => Self::Other {
                kind: envelope.kind,
                data: envelope.data,
            },
        };
        Ok(event)
    }
}

// ── Alert payloads ───────────────────────────────────────────────────

/// Alert severity. Only `critical` changes client behaviour; every other
/// value is carried through for display.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum AlertSeverity {
    Critical,
    Warning,
    #[default]
    Info,
    Other(String),
}

impl AlertSeverity {
    pub fn is_critical(&self) -> bool {
        matches!(self, Self::Critical)
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Critical => "critical",
            Self::Warning => "warning",
            Self::Info => "info",
            Self::Other(s) => s,
        }
    }
}

impl From<String> for AlertSeverity {
    fn from(raw: String) -> Self {
        match raw.to_ascii_lowercase().as_str() {
            "critical" => Self::Critical,
            "warning" => Self::Warning,
            "info" => Self::Info,
            _ => Self::Other(raw),
        }
    }
}

impl From<AlertSeverity> for String {
    fn from(severity: AlertSeverity) -> Self {
        match severity {
            AlertSeverity::Other(s) => s,
            known => known.as_str().to_owned(),
        }
    }
}

/// `alert:triggered` data.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertTriggered {
    #[serde(default)]
    pub severity: AlertSeverity,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub device_name: String,
}

/// `alert:resolved` data.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertResolved {
    #[serde(default)]
    pub record_id: i64,
    #[serde(default)]
    pub reason: String,
}

// ── Telemetry payloads ───────────────────────────────────────────────

/// `device:realtime` data.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RealtimePayload {
    #[serde(default)]
    pub updates: Vec<RealtimeUpdate>,
}

/// `device:offline` data.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfflinePayload {
    #[serde(default)]
    pub device_ids: Vec<i64>,
}

/// Sparse patch for one device.
///
/// Outer `None` means the field was absent ("no change"); `Some(None)`
/// means the server sent `null` ("cleared").
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RealtimeUpdate {
    pub id: i64,

    #[serde(
        default,
        deserialize_with = "nullable",
        skip_serializing_if = "Option::is_none"
    )]
    pub report_time: Option<Option<DateTime<Utc>>>,

    #[serde(
        default,
        deserialize_with = "nullable",
        skip_serializing_if = "Option::is_none"
    )]
    pub last_heartbeat_time: Option<Option<DateTime<Utc>>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elements: Option<Vec<Element>>,

    #[serde(
        default,
        deserialize_with = "nullable",
        skip_serializing_if = "Option::is_none"
    )]
    pub image: Option<Option<DeviceImage>>,
}

/// One measured element (sensor channel) of a device.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Element {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identifier: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default)]
    pub value: serde_json::Value,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,

    /// Everything else the server attaches to an element.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Latest captured image of a device.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceImage {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub data: String,
}

/// Deserialize a present field (value or `null`) as `Some(..)`. Paired
/// with `#[serde(default)]` so an absent field stays `None`.
fn nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn ping_encodes_as_type_only() {
        assert_eq!(ClientMessage::Ping.encode().unwrap(), r#"{"type":"ping"}"#);
    }

    #[test]
    fn decode_control_frames() {
        assert_eq!(
            ServerEvent::decode(r#"{"type":"connected"}"#).unwrap(),
            ServerEvent::Connected
        );
        assert_eq!(
            ServerEvent::decode(r#"{"type":"pong","data":null}"#).unwrap(),
            ServerEvent::Pong
        );
    }

    #[test]
    fn decode_alert_triggered() {
        let raw = json!({
            "type": "alert:triggered",
            "data": { "severity": "critical", "message": "Temperature high", "deviceName": "Boiler-3" }
        });
        let event = ServerEvent::decode(&raw.to_string()).unwrap();
        let ServerEvent::AlertTriggered(alert) = event else {
            panic!("expected AlertTriggered, got {event:?}");
        };
        assert!(alert.severity.is_critical());
        assert_eq!(alert.message, "Temperature high");
        assert_eq!(alert.device_name, "Boiler-3");
    }

    #[test]
    fn unknown_severity_is_preserved() {
        let alert: AlertTriggered = serde_json::from_value(json!({ "severity": "Major" })).unwrap();
        assert_eq!(alert.severity, AlertSeverity::Other("Major".into()));
        assert_eq!(alert.severity.as_str(), "Major");
    }

    #[test]
    fn realtime_update_distinguishes_absent_from_null() {
        let update: RealtimeUpdate = serde_json::from_value(json!({
            "id": 7,
            "reportTime": null,
            "lastHeartbeatTime": "2026-03-01T10:00:00Z"
        }))
        .unwrap();

        assert_eq!(update.id, 7);
        assert_eq!(update.report_time, Some(None));
        assert!(matches!(update.last_heartbeat_time, Some(Some(_))));
        assert_eq!(update.elements, None);
        assert_eq!(update.image, None);
    }

    #[test]
    fn realtime_update_serializes_null_but_skips_absent() {
        let update = RealtimeUpdate {
            id: 1,
            report_time: Some(None),
            ..RealtimeUpdate::default()
        };
        assert_eq!(
            serde_json::to_value(&update).unwrap(),
            json!({ "id": 1, "reportTime": null })
        );
    }

    #[test]
    fn decode_offline_and_missing_data() {
        let event = ServerEvent::decode(r#"{"type":"device:offline","data":{"deviceIds":[2,5]}}"#)
            .unwrap();
        assert_eq!(
            event,
            ServerEvent::DeviceOffline(OfflinePayload {
                device_ids: vec![2, 5]
            })
        );

        let empty = ServerEvent::decode(r#"{"type":"device:realtime"}"#).unwrap();
        assert_eq!(empty, ServerEvent::DeviceRealtime(RealtimePayload::default()));
    }

    #[test]
    fn unknown_type_falls_through_to_other() {
        let event = ServerEvent::decode(r#"{"type":"link:created","data":{"id":3}}"#).unwrap();
        assert_eq!(event.kind(), "link:created");
        assert!(matches!(event, ServerEvent::Other { .. }));
    }

    #[test]
    fn malformed_frames_are_decode_errors() {
        assert!(matches!(
            ServerEvent::decode("not json at all"),
            Err(Error::Decode { .. })
        ));
        assert!(matches!(
            ServerEvent::decode(r#"{"data":{}}"#),
            Err(Error::Decode { .. })
        ));
        // Known type, wrong payload shape.
        assert!(matches!(
            ServerEvent::decode(r#"{"type":"device:offline","data":{"deviceIds":"all"}}"#),
            Err(Error::Decode { .. })
        ));
    }

    #[test]
    fn element_keeps_unknown_fields() {
        let element: Element = serde_json::from_value(json!({
            "identifier": "temp",
            "value": 21.5,
            "unit": "C",
            "threshold": 30
        }))
        .unwrap();
        assert_eq!(element.identifier.as_deref(), Some("temp"));
        assert_eq!(element.value, json!(21.5));
        assert_eq!(element.extra["threshold"], 30);
    }

    #[test]
    fn to_envelope_reencodes_payload() {
        let frame = r#"{"type":"device:offline","data":{"deviceIds":[4,5]}}"#;
        let envelope = ServerEvent::decode(frame).unwrap().to_envelope();
        assert_eq!(envelope.kind, "device:offline");
        assert_eq!(envelope.data, Some(json!({"deviceIds": [4, 5]})));

        let pong = ServerEvent::Pong.to_envelope();
        assert_eq!(serde_json::to_string(&pong).unwrap(), r#"{"type":"pong"}"#);
    }
}
