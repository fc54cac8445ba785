// ── Domain model ──
//
// Cached device records and the hierarchical keys that address cached
// regions. Records are shared as `Arc`s so an untouched record keeps its
// identity across merges.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use fleetpulse_api::{DeviceImage, Element, RealtimeUpdate};

// ── DeviceRecord ─────────────────────────────────────────────────────

/// One device as the dashboard caches it.
///
/// `report_time` doubles as the online marker: `None` means offline.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceRecord {
    pub id: i64,

    #[serde(default)]
    pub report_time: Option<DateTime<Utc>>,

    #[serde(default)]
    pub last_heartbeat_time: Option<DateTime<Utc>>,

    #[serde(default)]
    pub elements: Vec<Element>,

    #[serde(default)]
    pub image: Option<DeviceImage>,

    /// Fields the realtime path never touches (name, model, location, ...).
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl DeviceRecord {
    pub fn is_online(&self) -> bool {
        self.report_time.is_some()
    }

    /// Display name from the passthrough fields, if the server sent one.
    pub fn name(&self) -> Option<&str> {
        self.extra.get("name").and_then(serde_json::Value::as_str)
    }
}

impl From<RealtimeUpdate> for DeviceRecord {
    fn from(update: RealtimeUpdate) -> Self {
        Self {
            id: update.id,
            report_time: update.report_time.flatten(),
            last_heartbeat_time: update.last_heartbeat_time.flatten(),
            elements: update.elements.unwrap_or_default(),
            image: update.image.flatten(),
            extra: serde_json::Map::new(),
        }
    }
}

/// Immutable snapshot of a device region.
pub type DeviceList = Arc<Vec<Arc<DeviceRecord>>>;

// ── RegionKey ────────────────────────────────────────────────────────

/// Hierarchical cache key, e.g. `["home", "monitor"]`.
///
/// Invalidation matches by prefix: `["device"]` covers `["device", "42"]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RegionKey(Vec<String>);

impl RegionKey {
    pub fn new<I, S>(parts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(parts.into_iter().map(Into::into).collect())
    }

    pub fn from_static(parts: &[&str]) -> Self {
        Self::new(parts.iter().copied())
    }

    pub fn parts(&self) -> &[String] {
        &self.0
    }

    /// Whether `prefix` addresses this region or one of its ancestors.
    pub fn starts_with(&self, prefix: &RegionKey) -> bool {
        self.0.starts_with(&prefix.0)
    }

    /// Extend the key by one segment.
    #[must_use]
    pub fn child(&self, part: impl Into<String>) -> Self {
        let mut parts = self.0.clone();
        parts.push(part.into());
        Self(parts)
    }

    // ── Well-known regions ───────────────────────────────────────────

    pub fn alerts() -> Self {
        Self::from_static(&["alert"])
    }

    pub fn devices() -> Self {
        Self::from_static(&["device"])
    }

    /// The live monitor list fed by `device:realtime`.
    pub fn monitor() -> Self {
        Self::from_static(&["home", "monitor"])
    }

    pub fn links() -> Self {
        Self::from_static(&["links"])
    }

    pub fn protocols() -> Self {
        Self::from_static(&["protocols"])
    }

    pub fn system() -> Self {
        Self::from_static(&["system"])
    }
}

impl fmt::Display for RegionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join("/"))
    }
}

impl FromStr for RegionKey {
    type Err = std::convert::Infallible;

    /// `home/monitor` → `["home", "monitor"]`. Empty segments are dropped.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::new(s.split('/').filter(|p| !p.is_empty())))
    }
}
