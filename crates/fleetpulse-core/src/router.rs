// ── Event router ──
//
// Dispatches decoded server events. Order matters: control frames and
// the dedicated alert/telemetry handlers are matched first, then the
// static invalidation table covers CRUD notifications.

use std::sync::Arc;

use fleetpulse_api::ServerEvent;

use crate::cache::QueryCache;
use crate::merge::{self, MergeOutcome};
use crate::model::RegionKey;
use crate::notify::{Notification, Notifier};

/// Event types whose arrival marks cached regions stale.
static INVALIDATIONS: &[(&str, &[&[&str]])] = &[
    ("device:created", &[&["device"], &["home", "monitor"]]),
    ("device:deleted", &[&["device"], &["home", "monitor"]]),
    ("device:updated", &[&["device"]]),
    ("link:created", &[&["links"]]),
    ("link:updated", &[&["links"]]),
    ("link:deleted", &[&["links"]]),
    ("protocol:created", &[&["protocols"]]),
    ("protocol:updated", &[&["protocols"]]),
    ("protocol:deleted", &[&["protocols"]]),
    ("system:updated", &[&["system"]]),
    ("system:settings", &[&["system"]]),
];

/// Regions to invalidate for an event type, if it is in the table.
pub fn invalidation_regions(kind: &str) -> Option<Vec<RegionKey>> {
    INVALIDATIONS
        .iter()
        .find(|(k, _)| *k == kind)
        .map(|(_, regions)| regions.iter().map(|r| RegionKey::from_static(r)).collect())
}

/// What the router did with an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Routed {
    /// The server acknowledged the channel.
    Acknowledged,
    /// An alert was surfaced to the user.
    Notified,
    /// Telemetry was merged into the device region.
    Merged(MergeOutcome),
    /// Cached regions were invalidated.
    Invalidated { regions: usize },
    /// Nothing to do (pong, error report, unknown type).
    Ignored,
}

pub struct EventRouter {
    cache: Arc<dyn QueryCache>,
    notifier: Arc<dyn Notifier>,
    device_region: RegionKey,
}

impl EventRouter {
    pub fn new(
        cache: Arc<dyn QueryCache>,
        notifier: Arc<dyn Notifier>,
        device_region: RegionKey,
    ) -> Self {
        Self {
            cache,
            notifier,
            device_region,
        }
    }

    pub fn route(&self, event: &ServerEvent) -> Routed {
        match event {
            ServerEvent::Connected => Routed::Acknowledged,
            ServerEvent::Pong => {
                tracing::trace!("pong");
                Routed::Ignored
            }
            ServerEvent::Error(data) => {
                tracing::warn!(data = ?data, "server reported an error");
                Routed::Ignored
            }
            ServerEvent::AlertTriggered(alert) => {
                self.notifier.notify(Notification::alert_triggered(alert));
                self.cache.invalidate(&RegionKey::alerts());
                Routed::Notified
            }
            ServerEvent::AlertResolved(resolved) => {
                self.notifier.notify(Notification::alert_resolved(resolved));
                self.cache.invalidate(&RegionKey::alerts());
                Routed::Notified
            }
            ServerEvent::DeviceRealtime(payload) if payload.updates.is_empty() => {
                tracing::trace!("empty realtime batch");
                Routed::Ignored
            }
            ServerEvent::DeviceRealtime(payload) => {
                let outcome =
                    merge::merge_realtime(self.cache.as_ref(), &self.device_region, &payload.updates);
                tracing::trace!(
                    updates = payload.updates.len(),
                    wrote = outcome.wrote(),
                    ?outcome,
                    "realtime merged"
                );
                Routed::Merged(outcome)
            }
            ServerEvent::DeviceOffline(payload) if payload.device_ids.is_empty() => {
                tracing::trace!("empty offline list");
                Routed::Ignored
            }
            ServerEvent::DeviceOffline(payload) => {
                let outcome = merge::clear_report_time(
                    self.cache.as_ref(),
                    &self.device_region,
                    &payload.device_ids,
                );
                tracing::debug!(devices = ?payload.device_ids, ?outcome, "devices offline");
                Routed::Merged(outcome)
            }
            other => self.invalidate_for(other.kind()),
        }
    }

    fn invalidate_for(&self, kind: &str) -> Routed {
        let Some(regions) = invalidation_regions(kind) else {
            tracing::trace!(kind, "unhandled event type");
            return Routed::Ignored;
        };
        for region in &regions {
            self.cache.invalidate(region);
        }
        tracing::debug!(kind, regions = regions.len(), "invalidated");
        Routed::Invalidated {
            regions: regions.len(),
        }
    }
}

impl std::fmt::Debug for EventRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventRouter")
            .field("device_region", &self.device_region)
            .finish_non_exhaustive()
    }
}
