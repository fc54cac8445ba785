//! WebSocket transport for the push channel.
//!
//! [`Connector`] is the seam between the connection manager and the socket:
//! it opens one [`Channel`] per call and knows nothing about reconnection.
//! [`WsConnector`] is the production implementation on top of
//! `tokio-tungstenite`; tests substitute in-memory channels.
//!
//! # Example
//!
//! ```rust,ignore
//! use fleetpulse_api::websocket::{Connector, WsConnector, socket_url};
//! use futures_util::StreamExt;
//!
//! let origin = url::Url::parse("https://fleet.example.com")?;
//! let url = socket_url(&origin, "/ws", &token)?;
//! let mut channel = WsConnector.connect(&url).await?;
//!
//! while let Some(Ok(text)) = channel.incoming.next().await {
//!     println!("{text}");
//! }
//! ```

use std::future::Future;
use std::pin::Pin;

use futures_core::Stream;
use futures_util::{Sink, SinkExt, StreamExt, future};
use secrecy::{ExposeSecret, SecretString};
use tokio_tungstenite::tungstenite::{self, Message};
use url::Url;

use crate::error::Error;

/// Query parameter carrying the bearer credential.
pub const TOKEN_PARAM: &str = "token";

// ── Channel ──────────────────────────────────────────────────────────

/// Incoming text frames. The stream ends when the socket closes.
pub type FrameStream = Pin<Box<dyn Stream<Item = Result<String, Error>> + Send>>;

/// Outgoing text frames.
pub type FrameSink = Pin<Box<dyn Sink<String, Error = Error> + Send>>;

/// One open, bidirectional push channel.
pub struct Channel {
    pub incoming: FrameStream,
    pub outgoing: FrameSink,
}

impl Channel {
    pub fn new<St, Si>(incoming: St, outgoing: Si) -> Self
    where
        St: Stream<Item = Result<String, Error>> + Send + 'static,
        Si: Sink<String, Error = Error> + Send + 'static,
    {
        Self {
            incoming: Box::pin(incoming),
            outgoing: Box::pin(outgoing),
        }
    }
}

impl std::fmt::Debug for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Channel").finish_non_exhaustive()
    }
}

// ── Connector ────────────────────────────────────────────────────────

/// Opens push channels. One call, one socket.
pub trait Connector: Send + Sync + 'static {
    fn connect(&self, url: &Url) -> impl Future<Output = Result<Channel, Error>> + Send;
}

/// `tokio-tungstenite` backed connector. `wss://` uses rustls with the
/// webpki root store.
#[derive(Debug, Clone, Copy, Default)]
pub struct WsConnector;

impl Connector for WsConnector {
    async fn connect(&self, url: &Url) -> Result<Channel, Error> {
        tracing::info!(url = %redacted(url), "Connecting to WebSocket");

        let (ws_stream, _response) = tokio_tungstenite::connect_async(url.as_str())
            .await
            .map_err(|e| Error::WebSocketConnect(e.to_string()))?;

        tracing::info!("WebSocket connected");

        let (write, mut read) = ws_stream.split();

        let incoming = async_stream::stream! {
            while let Some(frame) = read.next().await {
                match frame {
                    Ok(Message::Text(text)) => yield Ok(text.as_str().to_owned()),
                    Ok(Message::Ping(_)) => {
                        // tungstenite answers protocol pings itself
                        tracing::trace!("WebSocket ping");
                    }
                    Ok(Message::Close(frame)) => {
                        if let Some(cf) = frame {
                            tracing::info!(
                                code = %cf.code,
                                reason = cf.reason.as_str(),
                                "WebSocket close frame received"
                            );
                            yield Err(Error::WebSocketClosed {
                                code: u16::from(cf.code),
                                reason: cf.reason.as_str().to_owned(),
                            });
                        } else {
                            tracing::info!("WebSocket close frame received (no payload)");
                        }
                        break;
                    }
                    Ok(_) => {
                        // Binary, Pong, Frame -- not part of the protocol
                    }
                    Err(e) => {
                        yield Err(Error::from(e));
                        break;
                    }
                }
            }
        };

        let outgoing = write
            .with(|text: String| future::ready(Ok::<_, tungstenite::Error>(Message::text(text))))
            .sink_map_err(|e| Error::Send(e.to_string()));

        Ok(Channel::new(incoming, outgoing))
    }
}

// ── URL construction ─────────────────────────────────────────────────

/// Build the socket URL from the dashboard origin.
///
/// The socket scheme mirrors the origin's transport security
/// (`https` → `wss`, `http` → `ws`); the credential rides in the
/// `token` query parameter.
pub fn socket_url(origin: &Url, path: &str, token: &SecretString) -> Result<Url, Error> {
    let scheme = match origin.scheme() {
        "https" | "wss" => "wss",
        "http" | "ws" => "ws",
        other => return Err(Error::UnsupportedScheme(other.to_owned())),
    };

    let mut url = origin.clone();
    url.set_scheme(scheme)
        .map_err(|()| Error::UnsupportedScheme(origin.scheme().to_owned()))?;
    url.set_path(path);
    url.set_fragment(None);
    url.set_query(None);
    url.query_pairs_mut()
        .append_pair(TOKEN_PARAM, token.expose_secret());

    Ok(url)
}

/// Render a URL for logs with the credential masked.
pub fn redacted(url: &Url) -> String {
    let mut masked = url.clone();
    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| {
            if k == TOKEN_PARAM {
                (k.into_owned(), "***".to_owned())
            } else {
                (k.into_owned(), v.into_owned())
            }
        })
        .collect();

    if pairs.is_empty() {
        return masked.to_string();
    }

    masked.query_pairs_mut().clear().extend_pairs(pairs);
    masked.to_string()
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn token(raw: &str) -> SecretString {
        SecretString::from(raw.to_owned())
    }

    #[test]
    fn secure_origin_maps_to_wss() {
        let origin = Url::parse("https://fleet.example.com/dashboard#home").unwrap();
        let url = socket_url(&origin, "/ws", &token("abc")).unwrap();
        assert_eq!(url.as_str(), "wss://fleet.example.com/ws?token=abc");
    }

    #[test]
    fn plain_origin_keeps_port() {
        let origin = Url::parse("http://localhost:8080").unwrap();
        let url = socket_url(&origin, "/ws", &token("abc")).unwrap();
        assert_eq!(url.as_str(), "ws://localhost:8080/ws?token=abc");
    }

    #[test]
    fn token_is_percent_encoded() {
        let origin = Url::parse("http://localhost").unwrap();
        let url = socket_url(&origin, "/ws", &token("a b&c=d")).unwrap();
        assert_eq!(url.query(), Some("token=a+b%26c%3Dd"));
        let (_, value) = url.query_pairs().next().unwrap();
        assert_eq!(value, "a b&c=d");
    }

    #[test]
    fn unsupported_scheme_is_rejected() {
        let origin = Url::parse("ftp://files.example.com").unwrap();
        assert!(matches!(
            socket_url(&origin, "/ws", &token("abc")),
            Err(Error::UnsupportedScheme(s)) if s == "ftp"
        ));
    }

    #[test]
    fn redacted_masks_token_only() {
        let url = Url::parse("wss://fleet.example.com/ws?token=secret&v=2").unwrap();
        let shown = redacted(&url);
        assert!(!shown.contains("secret"), "token leaked: {shown}");
        assert!(shown.contains("v=2"));
    }
}
