// ── Realtime merge ──
//
// Folds sparse `device:realtime` patches into the cached device list.
// Identity is load-bearing: a record with no effective change keeps its
// `Arc`, and a batch with no effective change performs no cache write,
// so subscribers are never woken for nothing.

use std::collections::HashSet;
use std::sync::Arc;

use indexmap::IndexMap;

use fleetpulse_api::RealtimeUpdate;

use crate::cache::QueryCache;
use crate::model::{DeviceRecord, RegionKey};

/// What a merge did to the cached region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// Nothing differed; the cache was not written.
    Unchanged,
    /// The region was empty and the batch was installed as-is.
    Installed { count: usize },
    /// Existing records were replaced and/or new ones appended.
    Updated { changed: usize, appended: usize },
}

impl MergeOutcome {
    pub fn wrote(self) -> bool {
        !matches!(self, Self::Unchanged)
    }
}

/// Merge a batch of realtime patches into `region`.
pub fn merge_realtime(
    cache: &dyn QueryCache,
    region: &RegionKey,
    updates: &[RealtimeUpdate],
) -> MergeOutcome {
    let Some(existing) = cache.get(region) else {
        let installed: Vec<Arc<DeviceRecord>> = updates
            .iter()
            .cloned()
            .map(|u| Arc::new(DeviceRecord::from(u)))
            .collect();
        let count = installed.len();
        cache.set(region.clone(), Arc::new(installed));
        return MergeOutcome::Installed { count };
    };

    match fold_updates(&existing, updates) {
        Some((merged, outcome)) => {
            cache.set(region.clone(), Arc::new(merged));
            outcome
        }
        None => MergeOutcome::Unchanged,
    }
}

/// Pure merge step. Returns `None` when no record would change.
///
/// Patches are looked up by id; when a batch repeats an id the last
/// patch wins. Patches that match no existing record are appended in
/// the order their ids first appeared.
pub fn fold_updates(
    existing: &[Arc<DeviceRecord>],
    updates: &[RealtimeUpdate],
) -> Option<(Vec<Arc<DeviceRecord>>, MergeOutcome)> {
    let mut pending: IndexMap<i64, &RealtimeUpdate> = IndexMap::with_capacity(updates.len());
    for update in updates {
        pending.insert(update.id, update);
    }

    let mut consumed = vec![false; pending.len()];
    let mut changed = 0_usize;

    let mut merged: Vec<Arc<DeviceRecord>> = existing
        .iter()
        .map(|record| {
            let Some((index, _, update)) = pending.get_full(&record.id) else {
                return Arc::clone(record);
            };
            if let Some(flag) = consumed.get_mut(index) {
                *flag = true;
            }
            match apply(record, update) {
                Some(next) => {
                    changed += 1;
                    Arc::new(next)
                }
                None => Arc::clone(record),
            }
        })
        .collect();

    let appended: Vec<Arc<DeviceRecord>> = pending
        .values()
        .zip(&consumed)
        .filter(|&(_, &used)| !used)
        .map(|(&update, _)| Arc::new(DeviceRecord::from(update.clone())))
        .collect();

    if changed == 0 && appended.is_empty() {
        return None;
    }

    let outcome = MergeOutcome::Updated {
        changed,
        appended: appended.len(),
    };
    merged.extend(appended);
    Some((merged, outcome))
}

/// Apply one patch. `None` when every present field already matches.
fn apply(record: &DeviceRecord, update: &RealtimeUpdate) -> Option<DeviceRecord> {
    let report_time = update.report_time.unwrap_or(record.report_time);
    let last_heartbeat_time = update
        .last_heartbeat_time
        .unwrap_or(record.last_heartbeat_time);
    let elements = update.elements.as_ref().unwrap_or(&record.elements);
    let image = match &update.image {
        Some(image) => image.as_ref(),
        None => record.image.as_ref(),
    };

    let same = report_time == record.report_time
        && last_heartbeat_time == record.last_heartbeat_time
        && *elements == record.elements
        && image == record.image.as_ref();
    if same {
        return None;
    }

    Some(DeviceRecord {
        id: record.id,
        report_time,
        last_heartbeat_time,
        elements: elements.clone(),
        image: image.cloned(),
        extra: record.extra.clone(),
    })
}

// ── Offline ──────────────────────────────────────────────────────────

/// Clear `report_time` for the listed devices. Records already offline,
/// and devices not in the region, are left untouched.
pub fn clear_report_time(cache: &dyn QueryCache, region: &RegionKey, ids: &[i64]) -> MergeOutcome {
    let Some(existing) = cache.get(region) else {
        return MergeOutcome::Unchanged;
    };
    let ids: HashSet<i64> = ids.iter().copied().collect();

    let mut changed = 0_usize;
    let next: Vec<Arc<DeviceRecord>> = existing
        .iter()
        .map(|record| {
            if ids.contains(&record.id) && record.report_time.is_some() {
                changed += 1;
                Arc::new(DeviceRecord {
                    report_time: None,
                    ..DeviceRecord::clone(record)
                })
            } else {
                Arc::clone(record)
            }
        })
        .collect();

    if changed == 0 {
        return MergeOutcome::Unchanged;
    }
    cache.set(region.clone(), Arc::new(next));
    MergeOutcome::Updated {
        changed,
        appended: 0,
    }
}

// ── Tests ────────────────────────────────────────────────────────────
