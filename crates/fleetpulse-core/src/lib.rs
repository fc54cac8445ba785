// fleetpulse-core: Real-time sync engine between fleetpulse-api and the dashboard cache.

pub mod backoff;
pub mod cache;
pub mod config;
pub mod error;
pub mod manager;
pub mod merge;
pub mod model;
pub mod notify;
pub mod router;

mod heartbeat;

// ── Primary re-exports ──────────────────────────────────────────────
pub use backoff::BackoffPolicy;
pub use cache::{QueryCache, RegionCache, RegionStream};
pub use config::SyncConfig;
pub use error::CoreError;
pub use heartbeat::DEFAULT_HEARTBEAT_INTERVAL;
pub use manager::{ConnectionState, SyncClient};
pub use merge::MergeOutcome;
pub use model::{DeviceList, DeviceRecord, RegionKey};
pub use notify::{Notification, NotificationLevel, Notifier, TracingNotifier};
pub use router::{EventRouter, Routed};

// Wire types consumers commonly need alongside the engine.
pub use fleetpulse_api::{Connector, ServerEvent, WsConnector};
