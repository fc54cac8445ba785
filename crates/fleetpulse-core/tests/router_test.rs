#![allow(clippy::unwrap_used)]
// Integration tests for `EventRouter` against an in-memory cache.

use std::sync::{Arc, Mutex};

use pretty_assertions::assert_eq;
use serde_json::json;
use tokio::sync::mpsc;

use fleetpulse_core::{
    DeviceList, DeviceRecord, EventRouter, MergeOutcome, Notification, NotificationLevel,
    QueryCache, RegionCache, RegionKey, Routed, ServerEvent,
};

// ── Helpers ─────────────────────────────────────────────────────────

/// Cache that records every call before delegating.
#[derive(Default)]
struct RecordingCache {
    inner: RegionCache,
    invalidated: Mutex<Vec<RegionKey>>,
    sets: Mutex<Vec<RegionKey>>,
}

impl RecordingCache {
    fn invalidated(&self) -> Vec<RegionKey> {
        self.invalidated.lock().unwrap().clone()
    }

    fn sets(&self) -> Vec<RegionKey> {
        self.sets.lock().unwrap().clone()
    }
}

impl QueryCache for RecordingCache {
    fn get(&self, region: &RegionKey) -> Option<DeviceList> {
        self.inner.get(region)
    }

    fn set(&self, region: RegionKey, devices: DeviceList) {
        self.sets.lock().unwrap().push(region.clone());
        self.inner.set(region, devices);
    }

    fn invalidate(&self, prefix: &RegionKey) {
        self.invalidated.lock().unwrap().push(prefix.clone());
        self.inner.invalidate(prefix);
    }
}

struct Harness {
    router: EventRouter,
    cache: Arc<RecordingCache>,
    notifications: mpsc::UnboundedReceiver<Notification>,
}

fn setup() -> Harness {
    let cache = Arc::new(RecordingCache::default());
    let (tx, notifications) = mpsc::unbounded_channel();
    let router = EventRouter::new(cache.clone(), Arc::new(tx), RegionKey::monitor());
    Harness {
        router,
        cache,
        notifications,
    }
}

fn event(frame: serde_json::Value) -> ServerEvent {
    ServerEvent::decode(&frame.to_string()).unwrap()
}

fn seed(cache: &RecordingCache, devices: serde_json::Value) -> DeviceList {
    let records: Vec<DeviceRecord> = serde_json::from_value(devices).unwrap();
    let list: DeviceList = Arc::new(records.into_iter().map(Arc::new).collect());
    cache.inner.set(RegionKey::monitor(), Arc::clone(&list));
    list
}

// ── Control frames ──────────────────────────────────────────────────

#[test]
fn test_connected_is_acknowledgement() {
    let h = setup();
    assert_eq!(
        h.router.route(&event(json!({"type": "connected"}))),
        Routed::Acknowledged
    );
    assert!(h.cache.invalidated().is_empty());
}

#[test]
fn test_pong_error_and_unknown_are_ignored() {
    let mut h = setup();
    for frame in [
        json!({"type": "pong"}),
        json!({"type": "error", "data": {"message": "bad token"}}),
        json!({"type": "firmware:progress", "data": {"pct": 40}}),
    ] {
        assert_eq!(h.router.route(&event(frame)), Routed::Ignored);
    }
    assert!(h.cache.invalidated().is_empty());
    assert!(h.cache.sets().is_empty());
    assert!(h.notifications.try_recv().is_err());
}

// ── Alerts ──────────────────────────────────────────────────────────

#[test]
fn test_critical_alert_notifies_and_invalidates_alerts() {
    let mut h = setup();

    let routed = h.router.route(&event(json!({
        "type": "alert:triggered",
        "data": {
            "severity": "critical",
            "message": "Pressure above 9 bar",
            "deviceName": "Pump 4"
        }
    })));

    assert_eq!(routed, Routed::Notified);
    let n = h.notifications.try_recv().unwrap();
    assert_eq!(n.level, NotificationLevel::Critical);
    assert_eq!(n.message, "Pressure above 9 bar");
    assert!(n.is_persistent());
    assert_eq!(h.cache.invalidated(), vec![RegionKey::alerts()]);
}

#[test]
fn test_resolved_alert_notifies_and_invalidates_alerts() {
    let mut h = setup();

    h.router.route(&event(json!({
        "type": "alert:resolved",
        "data": {"recordId": 12, "reason": "acknowledged"}
    })));

    let n = h.notifications.try_recv().unwrap();
    assert_eq!(n.level, NotificationLevel::Success);
    assert!(!n.is_persistent());
    assert_eq!(h.cache.invalidated(), vec![RegionKey::alerts()]);
}

// ── Invalidation table ──────────────────────────────────────────────

#[test]
fn test_link_created_invalidates_links_once() {
    let h = setup();

    let routed = h.router.route(&event(json!({"type": "link:created", "data": {"id": 5}})));

    assert_eq!(routed, Routed::Invalidated { regions: 1 });
    assert_eq!(h.cache.invalidated(), vec![RegionKey::links()]);
    assert!(h.cache.sets().is_empty());
}

#[test]
fn test_device_deleted_invalidates_device_and_monitor() {
    let h = setup();
    seed(&h.cache, json!([{"id": 1, "reportTime": "2024-05-01T10:00:00Z"}]));

    h.router.route(&event(json!({"type": "device:deleted", "data": {"id": 1}})));

    assert_eq!(
        h.cache.invalidated(),
        vec![RegionKey::devices(), RegionKey::monitor()]
    );
    assert!(h.cache.inner.is_stale(&RegionKey::monitor()));
}

#[test]
fn test_system_settings_invalidates_system() {
    let h = setup();
    h.router.route(&event(json!({"type": "system:settings"})));
    assert_eq!(h.cache.invalidated(), vec![RegionKey::system()]);
}

// ── Telemetry ───────────────────────────────────────────────────────

#[test]
fn test_realtime_patch_merges_without_invalidation() {
    let h = setup();
    let before = seed(
        &h.cache,
        json!([
            {"id": 1, "name": "Well A", "reportTime": "2024-05-01T10:00:00Z"},
            {"id": 2, "name": "Well B", "reportTime": "2024-05-01T10:00:00Z"}
        ]),
    );

    let routed = h.router.route(&event(json!({
        "type": "device:realtime",
        "data": {"updates": [
            {"id": 2, "reportTime": "2024-05-01T10:00:05Z",
             "elements": [{"identifier": "lvl", "value": 3.2, "unit": "m"}]}
        ]}
    })));

    assert_eq!(
        routed,
        Routed::Merged(MergeOutcome::Updated {
            changed: 1,
            appended: 0
        })
    );
    let after = h.cache.get(&RegionKey::monitor()).unwrap();
    assert!(Arc::ptr_eq(&before[0], &after[0]));
    assert_eq!(after[1].name(), Some("Well B"));
    assert_eq!(after[1].elements.len(), 1);
    assert!(h.cache.invalidated().is_empty());
}

#[test]
fn test_repeated_realtime_patch_writes_once() {
    let h = setup();
    seed(&h.cache, json!([{"id": 1}]));
    let frame = json!({
        "type": "device:realtime",
        "data": {"updates": [{"id": 1, "lastHeartbeatTime": "2024-05-01T10:00:00Z"}]}
    });

    h.router.route(&event(frame.clone()));
    let second = h.router.route(&event(frame));

    assert_eq!(second, Routed::Merged(MergeOutcome::Unchanged));
    assert_eq!(h.cache.sets(), vec![RegionKey::monitor()]);
}

#[test]
fn test_offline_clears_report_time_of_listed_devices() {
    let h = setup();
    let before = seed(
        &h.cache,
        json!([
            {"id": 1, "reportTime": "2024-05-01T10:00:00Z"},
            {"id": 2, "reportTime": "2024-05-01T10:00:00Z"}
        ]),
    );

    h.router.route(&event(json!({
        "type": "device:offline",
        "data": {"deviceIds": [2]}
    })));

    let after = h.cache.get(&RegionKey::monitor()).unwrap();
    assert!(Arc::ptr_eq(&before[0], &after[0]));
    assert!(after[0].is_online());
    assert!(!after[1].is_online());
}

#[test]
fn test_realtime_into_empty_cache_installs_batch() {
    let h = setup();

    h.router.route(&event(json!({
        "type": "device:realtime",
        "data": {"updates": [{"id": 3}, {"id": 1}]}
    })));

    let ids: Vec<i64> = h
        .cache
        .get(&RegionKey::monitor())
        .unwrap()
        .iter()
        .map(|d| d.id)
        .collect();
    assert_eq!(ids, vec![3, 1]);
}

#[test]
fn test_empty_telemetry_frames_leave_empty_cache_untouched() {
    let h = setup();
    for frame in [
        json!({"type": "device:realtime", "data": {"updates": []}}),
        json!({"type": "device:realtime"}),
        json!({"type": "device:offline", "data": {"deviceIds": []}}),
        json!({"type": "device:offline"}),
    ] {
        assert_eq!(h.router.route(&event(frame)), Routed::Ignored);
    }
    assert!(h.cache.sets().is_empty());
    assert!(h.cache.invalidated().is_empty());
    assert!(h.cache.get(&RegionKey::monitor()).is_none());
}

#[test]
fn test_empty_offline_list_keeps_seeded_records() {
    let h = setup();
    let before = seed(&h.cache, json!([{"id": 1, "reportTime": "2024-05-01T10:00:00Z"}]));

    let routed = h.router.route(&event(json!({
        "type": "device:offline",
        "data": {"deviceIds": []}
    })));

    assert_eq!(routed, Routed::Ignored);
    assert!(h.cache.sets().is_empty());
    assert!(Arc::ptr_eq(&before, &h.cache.get(&RegionKey::monitor()).unwrap()));
}
