// ── Connection manager ──
//
// Owns the push channel lifecycle. A single background task holds every
// piece of mutable state (socket, reconnect timer, heartbeat, attempt
// counter); `SyncClient` handles talk to it over a command channel and
// observe it through `watch`/`broadcast` receivers.
//
//   Disconnected ──connect──▶ Connecting ──"connected" ack──▶ Connected
//        ▲                        │                             │
//        └────── close / error ───┴─────────────────────────────┘
//                 (reconnect scheduled with backoff)

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use secrecy::SecretString;
use tokio::sync::{Mutex, broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use fleetpulse_api::{Channel, ClientMessage, Connector, ServerEvent, websocket};

use crate::backoff::ReconnectTimer;
use crate::cache::QueryCache;
use crate::config::SyncConfig;
use crate::error::CoreError;
use crate::heartbeat::Heartbeat;
use crate::notify::Notifier;
use crate::router::{EventRouter, Routed};

const EVENT_CHANNEL_SIZE: usize = 256;

// ── ConnectionState ──────────────────────────────────────────────

/// Connection state observable by consumers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, strum::Display, strum::IntoStaticStr)]
#[strum(serialize_all = "lowercase")]
pub enum ConnectionState {
    #[default]
    Disconnected,
    /// Socket opening, or open and awaiting the server's acknowledgement.
    Connecting,
    Connected,
}

enum Command {
    Connect,
    Disconnect,
    SetCredential(Option<SecretString>),
}

// ── SyncClient ───────────────────────────────────────────────────

/// Handle to a running sync engine. Cheaply cloneable via `Arc`.
///
/// Every method returns immediately; the work happens on the engine
/// task. The task stops on [`shutdown`](Self::shutdown) or when the last
/// handle is dropped.
#[derive(Clone)]
pub struct SyncClient {
    inner: Arc<SyncClientInner>,
}

struct SyncClientInner {
    commands: mpsc::UnboundedSender<Command>,
    state: watch::Receiver<ConnectionState>,
    events: broadcast::Sender<Arc<ServerEvent>>,
    cancel: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl SyncClient {
    /// Start the engine task. Nothing connects until [`connect`](Self::connect).
    ///
    /// Must be called from within a Tokio runtime.
    pub fn spawn<C: Connector>(
        config: SyncConfig,
        connector: C,
        cache: Arc<dyn QueryCache>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let (commands, command_rx) = mpsc::unbounded_channel();
        let (state_tx, state) = watch::channel(ConnectionState::Disconnected);
        let (events, _) = broadcast::channel(EVENT_CHANNEL_SIZE);
        let cancel = CancellationToken::new();

        let engine = Engine {
            router: EventRouter::new(cache, notifier, config.device_region.clone()),
            heartbeat: Heartbeat::new(config.heartbeat_interval),
            credential: config.credential.clone(),
            config,
            connector: Arc::new(connector),
            state: state_tx,
            events: events.clone(),
            link: Link::Idle,
            reconnect: ReconnectTimer::default(),
            attempt: 0,
        };
        let task = tokio::spawn(engine.run(command_rx, cancel.clone()));

        Self {
            inner: Arc::new(SyncClientInner {
                commands,
                state,
                events,
                cancel,
                task: Mutex::new(Some(task)),
            }),
        }
    }

    /// Open the channel. No-op without a credential or when already
    /// connecting/connected; cancels any pending reconnect timer.
    pub fn connect(&self) -> Result<(), CoreError> {
        self.send(Command::Connect)
    }

    /// Close the channel without scheduling a reconnect.
    pub fn disconnect(&self) -> Result<(), CoreError> {
        self.send(Command::Disconnect)
    }

    /// Replace the credential. Tears down any open channel, then
    /// connects again if the new credential is present.
    pub fn set_credential(&self, credential: Option<SecretString>) -> Result<(), CoreError> {
        self.send(Command::SetCredential(credential))
    }

    /// Subscribe to connection state changes.
    pub fn state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state.clone()
    }

    pub fn current_state(&self) -> ConnectionState {
        *self.inner.state.borrow()
    }

    pub fn is_connected(&self) -> bool {
        self.current_state() == ConnectionState::Connected
    }

    /// Subscribe to every decoded server event, after it has been routed.
    pub fn events(&self) -> broadcast::Receiver<Arc<ServerEvent>> {
        self.inner.events.subscribe()
    }

    /// Stop the engine: close the channel, cancel timers, and wait for
    /// the task to finish. Idempotent.
    pub async fn shutdown(&self) {
        self.inner.cancel.cancel();
        let task = self.inner.task.lock().await.take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                warn!(error = %e, "sync engine task failed");
            }
        }
    }

    fn send(&self, command: Command) -> Result<(), CoreError> {
        self.inner
            .commands
            .send(command)
            .map_err(|_| CoreError::ClientStopped)
    }
}

impl std::fmt::Debug for SyncClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncClient")
            .field("state", &self.current_state())
            .finish_non_exhaustive()
    }
}

// ── Engine task ──────────────────────────────────────────────────

type OpenFuture = Pin<Box<dyn Future<Output = Result<Channel, fleetpulse_api::Error>> + Send>>;

/// The socket, in whichever phase it is.
enum Link {
    Idle,
    Opening(OpenFuture),
    Open(Channel),
}

enum LinkEvent {
    Opened(Result<Channel, fleetpulse_api::Error>),
    Frame(Option<Result<String, fleetpulse_api::Error>>),
}

struct Engine<C> {
    config: SyncConfig,
    connector: Arc<C>,
    router: EventRouter,
    credential: Option<SecretString>,
    state: watch::Sender<ConnectionState>,
    events: broadcast::Sender<Arc<ServerEvent>>,
    link: Link,
    reconnect: ReconnectTimer,
    heartbeat: Heartbeat,
    /// Reconnect attempts since the last acknowledged connection.
    attempt: u32,
}

impl<C: Connector> Engine<C> {
    async fn run(mut self, mut commands: mpsc::UnboundedReceiver<Command>, cancel: CancellationToken) {
        loop {
            tokio::select! {
                biased;

                () = cancel.cancelled() => break,

                command = commands.recv() => {
                    let Some(command) = command else { break };
                    self.handle_command(command).await;
                }

                event = poll_link(&mut self.link) => self.on_link_event(event),

                () = self.reconnect.fired() => {
                    debug!(attempt = self.attempt, "reconnect timer fired");
                    self.open();
                }

                () = self.heartbeat.tick() => self.send_ping().await,
            }
        }

        self.disconnect().await;
        debug!("sync engine stopped");
    }

    async fn handle_command(&mut self, command: Command) {
        match command {
            Command::Connect => self.connect(),
            Command::Disconnect => self.disconnect().await,
            Command::SetCredential(credential) => {
                self.disconnect().await;
                self.credential = credential;
                self.connect();
            }
        }
    }

    fn connect(&mut self) {
        if !matches!(self.link, Link::Idle) {
            debug!("connect ignored: channel already open or opening");
            return;
        }
        if self.credential.is_none() {
            debug!("connect ignored: no credential");
            return;
        }
        self.reconnect.cancel();
        self.open();
    }

    /// Start opening a socket. The link must be idle.
    fn open(&mut self) {
        let Some(credential) = &self.credential else {
            self.set_state(ConnectionState::Disconnected);
            return;
        };
        let url = match self.config.socket_url(credential) {
            Ok(url) => url,
            Err(e) => {
                warn!(error = %e, "cannot build push channel URL");
                self.set_state(ConnectionState::Disconnected);
                return;
            }
        };

        info!(url = %websocket::redacted(&url), attempt = self.attempt, "opening push channel");
        let connector = Arc::clone(&self.connector);
        self.link = Link::Opening(Box::pin(async move { connector.connect(&url).await }));
        self.set_state(ConnectionState::Connecting);
    }

    /// Explicit teardown: no reconnect follows.
    async fn disconnect(&mut self) {
        self.reconnect.cancel();
        self.heartbeat.stop();
        self.attempt = 0;

        match std::mem::replace(&mut self.link, Link::Idle) {
            Link::Open(mut channel) => {
                match tokio::time::timeout(self.config.close_timeout, channel.outgoing.close()).await
                {
                    Ok(Ok(())) => debug!("push channel closed"),
                    Ok(Err(e)) => debug!(error = %e, "error closing push channel"),
                    Err(_) => debug!("timed out closing push channel"),
                }
            }
            Link::Opening(_) => debug!("abandoned pending open"),
            Link::Idle => {}
        }

        self.set_state(ConnectionState::Disconnected);
    }

    fn on_link_event(&mut self, event: LinkEvent) {
        match event {
            LinkEvent::Opened(Ok(channel)) => {
                debug!("push channel open, awaiting acknowledgement");
                self.link = Link::Open(channel);
            }
            LinkEvent::Opened(Err(e)) => {
                warn!(error = %e, transient = e.is_transient(), "failed to open push channel");
                self.on_lost();
            }
            LinkEvent::Frame(Some(Ok(text))) => self.on_frame(&text),
            LinkEvent::Frame(Some(Err(e))) => {
                warn!(error = %e, "push channel error");
                self.on_lost();
            }
            LinkEvent::Frame(None) => {
                info!("push channel closed by server");
                self.on_lost();
            }
        }
    }

    /// Unexpected close or failed open: back off and try again.
    fn on_lost(&mut self) {
        self.link = Link::Idle;
        self.heartbeat.stop();
        self.set_state(ConnectionState::Disconnected);

        if self.credential.is_none() {
            return;
        }
        let delay = self.config.backoff.delay(self.attempt);
        info!(
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            attempt = self.attempt,
            "scheduling reconnect"
        );
        self.reconnect.schedule(delay);
        self.attempt = self.attempt.saturating_add(1);
    }

    fn on_frame(&mut self, text: &str) {
        let event = match ServerEvent::decode(text) {
            Ok(event) => event,
            Err(e) => {
                debug!(error = %e, "dropping undecodable frame");
                return;
            }
        };

        trace!(kind = event.kind(), "frame received");
        if self.router.route(&event) == Routed::Acknowledged {
            self.on_acknowledged();
        }
        // no subscribers is fine
        let _ = self.events.send(Arc::new(event));
    }

    fn on_acknowledged(&mut self) {
        if !matches!(self.link, Link::Open(_)) {
            return;
        }
        self.attempt = 0;
        if !self.heartbeat.is_running() {
            self.heartbeat.start();
        }
        self.set_state(ConnectionState::Connected);
    }

    async fn send_ping(&mut self) {
        let Link::Open(channel) = &mut self.link else {
            self.heartbeat.stop();
            return;
        };
        let frame = match ClientMessage::Ping.encode() {
            Ok(frame) => frame,
            Err(e) => {
                warn!(error = %e, "failed to encode ping");
                return;
            }
        };
        match channel.outgoing.send(frame).await {
            Ok(()) => trace!("ping sent"),
            // the read side reports the close
            Err(e) => debug!(error = %e, "ping not sent"),
        }
    }

    fn set_state(&self, next: ConnectionState) {
        self.state.send_if_modified(|current| {
            if *current == next {
                return false;
            }
            info!(from = %current, to = %next, "connection state changed");
            *current = next;
            true
        });
    }
}

/// Resolves with the next thing that happens on the link; pends forever
/// when idle. Cancel-safe: the boxed open future and the frame stream
/// stay in place when dropped mid-poll.
async fn poll_link(link: &mut Link) -> LinkEvent {
    match link {
        Link::Idle => std::future::pending().await,
        Link::Opening(open) => LinkEvent::Opened(open.as_mut().await),
        Link::Open(channel) => LinkEvent::Frame(channel.incoming.next().await),
    }
}
