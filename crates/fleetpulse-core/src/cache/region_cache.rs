// ── Reactive region cache ──
//
// Concurrent storage keyed by region, with push-based change
// notification via `watch` channels and a broadcast of every
// invalidation prefix.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{broadcast, watch};

use super::QueryCache;
use super::stream::RegionStream;
use crate::model::{DeviceList, DeviceRecord, RegionKey};

const INVALIDATION_CHANNEL_CAPACITY: usize = 64;

/// In-memory [`QueryCache`] with per-region subscriptions.
///
/// Each region keeps its snapshot in a `watch` channel so readers get
/// the latest list without locking. `set` replaces the snapshot
/// wholesale; `invalidate` leaves data in place and marks it stale,
/// bumping a per-region generation so refetchers can react.
pub struct RegionCache {
    regions: DashMap<RegionKey, Region>,
    invalidations: broadcast::Sender<RegionKey>,
}

struct Region {
    snapshot: watch::Sender<Option<DeviceList>>,
    /// Bumped on every invalidation that covers this region.
    generation: watch::Sender<u64>,
    /// Number of `set` calls. Untouched merges leave it alone.
    writes: u64,
    stale: bool,
}

impl Region {
    fn new() -> Self {
        let (snapshot, _) = watch::channel(None);
        let (generation, _) = watch::channel(0);
        Self {
            snapshot,
            generation,
            writes: 0,
            stale: false,
        }
    }
}

impl Default for RegionCache {
    fn default() -> Self {
        Self::new()
    }
}

impl RegionCache {
    pub fn new() -> Self {
        let (invalidations, _) = broadcast::channel(INVALIDATION_CHANNEL_CAPACITY);
        Self {
            regions: DashMap::new(),
            invalidations,
        }
    }

    /// Subscribe to one region's snapshot. Creates an empty region if
    /// nothing has been stored under the key yet.
    pub fn subscribe(&self, region: &RegionKey) -> RegionStream {
        let receiver = self
            .regions
            .entry(region.clone())
            .or_insert_with(Region::new)
            .snapshot
            .subscribe();
        RegionStream::new(receiver)
    }

    /// Watch a region's invalidation generation.
    pub fn generation(&self, region: &RegionKey) -> watch::Receiver<u64> {
        self.regions
            .entry(region.clone())
            .or_insert_with(Region::new)
            .generation
            .subscribe()
    }

    /// Every invalidation prefix, in order, whether or not it matched a
    /// stored region.
    pub fn invalidations(&self) -> broadcast::Receiver<RegionKey> {
        self.invalidations.subscribe()
    }

    pub fn is_stale(&self, region: &RegionKey) -> bool {
        self.regions.get(region).is_some_and(|r| r.stale)
    }

    pub fn write_count(&self, region: &RegionKey) -> u64 {
        self.regions.get(region).map_or(0, |r| r.writes)
    }

    /// Look up a single device within a region.
    pub fn device(&self, region: &RegionKey, id: i64) -> Option<Arc<DeviceRecord>> {
        self.get(region)?.iter().find(|d| d.id == id).cloned()
    }

    /// Keys of all known regions, sorted.
    pub fn regions(&self) -> Vec<RegionKey> {
        let mut keys: Vec<RegionKey> = self.regions.iter().map(|e| e.key().clone()).collect();
        keys.sort();
        keys
    }
}

impl QueryCache for RegionCache {
    fn get(&self, region: &RegionKey) -> Option<DeviceList> {
        self.regions
            .get(region)
            .and_then(|r| r.snapshot.borrow().clone())
    }

    fn set(&self, region: RegionKey, devices: DeviceList) {
        let mut entry = self.regions.entry(region).or_insert_with(Region::new);
        // send_replace stores the value even with no receivers
        entry.snapshot.send_replace(Some(devices));
        entry.writes = entry.writes.saturating_add(1);
        entry.stale = false;
    }

    fn invalidate(&self, prefix: &RegionKey) {
        let mut matched = 0_usize;
        for mut entry in self.regions.iter_mut() {
            if !entry.key().starts_with(prefix) {
                continue;
            }
            let region = entry.value_mut();
            region.stale = true;
            region.generation.send_modify(|g| *g = g.saturating_add(1));
            matched += 1;
        }

        tracing::debug!(prefix = %prefix, matched, "cache regions invalidated");
        let _ = self.invalidations.send(prefix.clone());
    }
}
