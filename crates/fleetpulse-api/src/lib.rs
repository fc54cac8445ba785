// fleetpulse-api: wire protocol and WebSocket transport for the fleet event channel

pub mod error;
pub mod protocol;
pub mod websocket;

pub use error::Error;
pub use protocol::{
    AlertResolved, AlertSeverity, AlertTriggered, ClientMessage, DeviceImage, Element, Envelope,
    OfflinePayload, RealtimePayload, RealtimeUpdate, ServerEvent,
};
pub use websocket::{Channel, Connector, WsConnector, socket_url};
