// ── Runtime sync configuration ──
//
// Describes *where* the push channel lives and how the connection is
// tuned. Carries the credential but never touches disk; the CLI builds
// a `SyncConfig` from its profile and hands it in.

use std::time::Duration;

use secrecy::SecretString;
use url::Url;

use crate::backoff::BackoffPolicy;
use crate::error::CoreError;
use crate::heartbeat::DEFAULT_HEARTBEAT_INTERVAL;
use crate::model::RegionKey;

pub const DEFAULT_SOCKET_PATH: &str = "/ws";

/// Configuration for one sync client.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Dashboard origin (e.g., `https://fleet.example.com`). The socket
    /// scheme follows it: `https` → `wss`, `http` → `ws`.
    pub origin: Url,
    /// Socket path on the origin.
    pub socket_path: String,
    /// Bearer token. Without one, `connect` does nothing.
    pub credential: Option<SecretString>,
    pub backoff: BackoffPolicy,
    /// Ping period while connected. Zero disables heartbeats.
    pub heartbeat_interval: Duration,
    /// Region that `device:realtime` and `device:offline` write into.
    pub device_region: RegionKey,
    /// How long to wait for a clean close on explicit disconnect.
    pub close_timeout: Duration,
}

impl SyncConfig {
    pub fn new(origin: Url) -> Self {
        Self {
            origin,
            socket_path: DEFAULT_SOCKET_PATH.into(),
            credential: None,
            backoff: BackoffPolicy::default(),
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
            device_region: RegionKey::monitor(),
            close_timeout: Duration::from_secs(2),
        }
    }

    #[must_use]
    pub fn with_credential(mut self, credential: SecretString) -> Self {
        self.credential = Some(credential);
        self
    }

    /// Socket URL for the given credential.
    pub fn socket_url(&self, credential: &SecretString) -> Result<Url, CoreError> {
        Ok(fleetpulse_api::socket_url(
            &self.origin,
            &self.socket_path,
            credential,
        )?)
    }

    /// Reject settings the connection manager cannot run with.
    pub fn validate(&self) -> Result<(), CoreError> {
        if !matches!(self.origin.scheme(), "http" | "https" | "ws" | "wss") {
            return Err(CoreError::Config {
                message: format!("unsupported origin scheme '{}'", self.origin.scheme()),
            });
        }
        if !self.socket_path.starts_with('/') {
            return Err(CoreError::Config {
                message: format!("socket path '{}' must start with '/'", self.socket_path),
            });
        }
        if self.backoff.initial_delay.is_zero() || self.backoff.initial_delay > self.backoff.max_delay {
            return Err(CoreError::Config {
                message: "backoff base must be non-zero and not exceed the cap".into(),
            });
        }
        Ok(())
    }
}
