#![allow(clippy::unwrap_used)]
// Loopback tests for `WsConnector` against a real tungstenite server.

use futures_util::{SinkExt, StreamExt};
use secrecy::SecretString;
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use url::Url;

use fleetpulse_api::{ClientMessage, Connector, Error, ServerEvent, WsConnector, socket_url};

// ── Helpers ─────────────────────────────────────────────────────────

async fn bind() -> (TcpListener, Url) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let origin = Url::parse(&format!("http://{addr}")).unwrap();
    let token = SecretString::from("t0ken".to_owned());
    (listener, socket_url(&origin, "/ws", &token).unwrap())
}

// ── Tests ───────────────────────────────────────────────────────────

#[tokio::test]
async fn test_text_frames_flow_both_ways() {
    let (listener, url) = bind().await;

    let server = tokio::spawn(async move {
        let (tcp, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(tcp).await.unwrap();
        ws.send(Message::text(r#"{"type":"connected"}"#)).await.unwrap();

        let Some(Ok(Message::Text(ping))) = ws.next().await else {
            panic!("expected a text ping");
        };
        ping.as_str().to_owned()
    });

    let mut channel = WsConnector.connect(&url).await.unwrap();

    let first = channel.incoming.next().await.unwrap().unwrap();
    assert_eq!(ServerEvent::decode(&first).unwrap(), ServerEvent::Connected);

    channel
        .outgoing
        .send(ClientMessage::Ping.encode().unwrap())
        .await
        .unwrap();

    assert_eq!(server.await.unwrap(), r#"{"type":"ping"}"#);
}

#[tokio::test]
async fn test_close_frame_ends_stream() {
    let (listener, url) = bind().await;

    tokio::spawn(async move {
        let (tcp, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(tcp).await.unwrap();
        ws.close(Some(CloseFrame {
            code: CloseCode::Away,
            reason: "restarting".into(),
        }))
        .await
        .unwrap();
    });

    let mut channel = WsConnector.connect(&url).await.unwrap();

    let closed = channel.incoming.next().await.unwrap();
    assert!(
        matches!(closed, Err(Error::WebSocketClosed { code: 1001, ref reason }) if reason == "restarting"),
        "expected close error, got {closed:?}"
    );
    assert!(channel.incoming.next().await.is_none());
}

#[tokio::test]
async fn test_refused_connection_is_transient() {
    let (listener, url) = bind().await;
    drop(listener);

    let err = WsConnector.connect(&url).await.unwrap_err();
    assert!(err.is_transient(), "expected transient error, got {err:?}");
}
