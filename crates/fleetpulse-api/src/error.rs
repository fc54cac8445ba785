use thiserror::Error;

/// Top-level error type for the `fleetpulse-api` crate.
///
/// Covers every failure mode of the push channel: URL construction,
/// the WebSocket handshake, frame I/O, and envelope decoding.
/// `fleetpulse-core` maps these into its own diagnostics.
#[derive(Debug, Error)]
pub enum Error {
    // ── Transport ───────────────────────────────────────────────────
    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// The origin URL cannot be mapped to a socket scheme.
    #[error("Unsupported origin scheme '{0}' (expected http or https)")]
    UnsupportedScheme(String),

    // ── WebSocket ───────────────────────────────────────────────────
    /// WebSocket handshake or read failed.
    #[error("WebSocket connection failed: {0}")]
    WebSocketConnect(String),

    /// WebSocket closed by the server with a close frame.
    #[error("WebSocket closed (code {code}): {reason}")]
    WebSocketClosed { code: u16, reason: String },

    /// Writing a frame to the socket failed.
    #[error("WebSocket send failed: {0}")]
    Send(String),

    // ── Data ────────────────────────────────────────────────────────
    /// JSON decoding failed, with the raw frame for debugging.
    #[error("Decode error: {message}")]
    Decode { message: String, body: String },

    /// Encoding an outgoing frame failed.
    #[error("Encode error: {0}")]
    Encode(#[from] serde_json::Error),
}

impl Error {
    /// Returns `true` if reconnecting might resolve this error.
    ///
    /// Every socket-level failure is transient; configuration and
    /// decode errors are not.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::WebSocketConnect(_) | Self::WebSocketClosed { .. } | Self::Send(_)
        )
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for Error {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::WebSocketConnect(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn socket_errors_are_transient() {
        assert!(Error::WebSocketConnect("refused".into()).is_transient());
        assert!(
            Error::WebSocketClosed {
                code: 1006,
                reason: "abnormal".into()
            }
            .is_transient()
        );
        assert!(!Error::UnsupportedScheme("ftp".into()).is_transient());
        assert!(
            !Error::Decode {
                message: "eof".into(),
                body: String::new()
            }
            .is_transient()
        );
    }
}
