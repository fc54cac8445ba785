// ── Core error types ──
//
// User-facing errors from fleetpulse-core. Consumers never see frame
// decode failures or raw socket errors directly; the
// `From<fleetpulse_api::Error>` impl translates transport-layer errors
// into domain variants.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Connection errors ────────────────────────────────────────────
    #[error("Cannot connect to push channel at {url}: {reason}")]
    ConnectionFailed { url: String, reason: String },

    #[error("Push channel closed by server ({code}): {reason}")]
    Disconnected { code: u16, reason: String },

    // ── Protocol errors ──────────────────────────────────────────────
    #[error("Malformed frame: {message}")]
    Protocol { message: String },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Lifecycle errors ─────────────────────────────────────────────
    #[error("Sync client has shut down")]
    ClientStopped,

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<fleetpulse_api::Error> for CoreError {
    fn from(err: fleetpulse_api::Error) -> Self {
        use fleetpulse_api::Error as Api;

        match err {
            Api::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            Api::UnsupportedScheme(scheme) => CoreError::Config {
                message: format!("Unsupported URL scheme '{scheme}' (expected http or https)"),
            },
            Api::WebSocketConnect(reason) | Api::Send(reason) => CoreError::ConnectionFailed {
                url: "<push channel>".into(),
                reason,
            },
            Api::WebSocketClosed { code, reason } => CoreError::Disconnected { code, reason },
            Api::Decode { message, .. } => CoreError::Protocol { message },
            Api::Encode(e) => CoreError::Internal(format!("Frame encoding failed: {e}")),
        }
    }
}
