// ── Query cache ──
//
// The seam between the sync engine and whatever holds the dashboard's
// fetched data. The engine writes telemetry directly into the device
// region and invalidates everything else by key prefix.

mod region_cache;
mod stream;

pub use region_cache::RegionCache;
pub use stream::{RegionStream, RegionWatchStream};

use std::sync::Arc;

use crate::model::{DeviceList, RegionKey};

/// Keyed cache the event router writes into.
///
/// Implementations must be cheap to call from the connection task:
/// every method is synchronous and must not block on I/O.
pub trait QueryCache: Send + Sync + 'static {
    /// Current list for an exact region, if one has been stored.
    fn get(&self, region: &RegionKey) -> Option<DeviceList>;

    /// Replace the list stored for an exact region.
    fn set(&self, region: RegionKey, devices: DeviceList);

    /// Mark every region whose key starts with `prefix` as stale.
    fn invalidate(&self, prefix: &RegionKey);
}

impl<T: QueryCache + ?Sized> QueryCache for Arc<T> {
    fn get(&self, region: &RegionKey) -> Option<DeviceList> {
        (**self).get(region)
    }

    fn set(&self, region: RegionKey, devices: DeviceList) {
        (**self).set(region, devices);
    }

    fn invalidate(&self, prefix: &RegionKey) {
        (**self).invalidate(prefix);
    }
}
