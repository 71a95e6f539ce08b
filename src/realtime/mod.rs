//! Realtime push channel.
//!
//! A single persistent WebSocket connection to TickTick, authenticated with
//! the bearer token. On open the channel subscribes to the `task_updates`
//! stream; every inbound `task_update` event is forwarded to the
//! orchestrator's single-task reconciliation path.
//!
//! Reconnect policy: fixed 5 second delay, hard ceiling of 5 consecutive
//! failures, counter reset on any successful open. The ceiling is terminal —
//! the channel publishes `ChannelState::Exhausted` and stops; a supervisor
//! watching [`RealtimeChannel::state`] must restart it.

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header::{HeaderValue, AUTHORIZATION};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, warn};

use crate::error::SyncError;
use crate::remote::RemoteTask;
use crate::sync::SyncOrchestrator;

pub const MAX_RECONNECT_ATTEMPTS: u32 = 5;
pub const RECONNECT_DELAY: Duration = Duration::from_secs(5);

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

// ─── State machine ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
    /// Terminal: the reconnect ceiling was hit with no intervening success.
    /// The channel will not self-heal; an external supervisor must restart it.
    Exhausted,
}

impl ChannelState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Reconnecting => "reconnecting",
            Self::Exhausted => "exhausted",
        }
    }
}

/// Reconnect bookkeeping, split out so the policy is testable without a
/// socket: counter reset on success, fixed delay below the ceiling, `None`
/// once exhausted.
#[derive(Debug)]
pub struct ReconnectPolicy {
    attempts: u32,
    max_attempts: u32,
    delay: Duration,
}

impl ReconnectPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            attempts: 0,
            max_attempts,
            delay,
        }
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// A successful open resets the counter.
    pub fn connected(&mut self) {
        self.attempts = 0;
    }

    /// Record a failure. Returns the delay before the next attempt, or
    /// `None` when the ceiling is reached.
    pub fn connection_lost(&mut self) -> Option<Duration> {
        self.attempts += 1;
        if self.attempts >= self.max_attempts {
            None
        } else {
            Some(self.delay)
        }
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::new(MAX_RECONNECT_ATTEMPTS, RECONNECT_DELAY)
    }
}

// ─── Event parsing ────────────────────────────────────────────────────────────

/// Parse an inbound frame. `Ok(Some)` for a `task_update` event, `Ok(None)`
/// for a recognized-but-irrelevant message type, `Err` for anything the
/// channel should log and drop.
pub fn parse_event(text: &str) -> Result<Option<RemoteTask>, SyncError> {
    let value: serde_json::Value =
        serde_json::from_str(text).map_err(|e| SyncError::MalformedEvent(e.to_string()))?;
    if value.get("type").and_then(|t| t.as_str()) != Some("task_update") {
        return Ok(None);
    }
    let data = value
        .get("data")
        .cloned()
        .ok_or_else(|| SyncError::MalformedEvent("task_update without data payload".into()))?;
    let task =
        serde_json::from_value(data).map_err(|e| SyncError::MalformedEvent(e.to_string()))?;
    Ok(Some(task))
}

// ─── Channel ──────────────────────────────────────────────────────────────────

pub struct RealtimeChannel {
    ws_url: String,
    access_token: String,
    orchestrator: Arc<SyncOrchestrator>,
    max_attempts: u32,
    delay: Duration,
    state_tx: watch::Sender<ChannelState>,
    shutdown_tx: watch::Sender<bool>,
    task: tokio::sync::Mutex<Option<JoinHandle<()>>>,
}

impl RealtimeChannel {
    pub fn new(
        ws_url: impl Into<String>,
        access_token: impl Into<String>,
        orchestrator: Arc<SyncOrchestrator>,
    ) -> Self {
        let (state_tx, _) = watch::channel(ChannelState::Disconnected);
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            ws_url: ws_url.into(),
            access_token: access_token.into(),
            orchestrator,
            max_attempts: MAX_RECONNECT_ATTEMPTS,
            delay: RECONNECT_DELAY,
            state_tx,
            shutdown_tx,
            task: tokio::sync::Mutex::new(None),
        }
    }

    /// Override the reconnect policy. Used by tests; production keeps the
    /// 5-attempt / 5-second defaults for TickTick compatibility.
    pub fn with_reconnect(mut self, max_attempts: u32, delay: Duration) -> Self {
        self.max_attempts = max_attempts;
        self.delay = delay;
        self
    }

    /// Observe the connection state. `Exhausted` is the terminal value a
    /// supervisor should watch for.
    pub fn state(&self) -> watch::Receiver<ChannelState> {
        self.state_tx.subscribe()
    }

    /// Start the connection loop. Idempotent: a second call while the loop
    /// is alive is a no-op and never replaces the live connection.
    pub async fn start(self: Arc<Self>) {
        let mut guard = self.task.lock().await;
        if let Some(handle) = guard.as_ref() {
            if !handle.is_finished() {
                debug!("realtime channel already running");
                return;
            }
        }
        let _ = self.shutdown_tx.send(false);
        let this = self.clone();
        *guard = Some(tokio::spawn(async move { this.run_loop().await }));
    }

    /// Explicit close. Idempotent; does not count as a failure and does not
    /// trigger a reconnect.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    fn set_state(&self, state: ChannelState) {
        self.state_tx.send_replace(state);
    }

    async fn run_loop(&self) {
        let mut policy = ReconnectPolicy::new(self.max_attempts, self.delay);
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        loop {
            if *shutdown_rx.borrow() {
                break;
            }
            self.set_state(ChannelState::Connecting);

            match self.connect_once().await {
                Ok(ws) => {
                    info!(url = %self.ws_url, "realtime channel connected");
                    policy.connected();
                    self.set_state(ChannelState::Connected);
                    if self.drive(ws, &mut shutdown_rx).await {
                        // Explicit shutdown — not a failure.
                        break;
                    }
                    warn!("realtime connection closed");
                }
                Err(e) => warn!(err = %e, "realtime connect failed"),
            }

            match policy.connection_lost() {
                Some(delay) => {
                    self.set_state(ChannelState::Reconnecting);
                    info!(
                        attempt = policy.attempts(),
                        max = self.max_attempts,
                        "reconnecting in {}ms",
                        delay.as_millis()
                    );
                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        _ = shutdown_rx.changed() => {}
                    }
                }
                None => {
                    error!(
                        attempts = policy.attempts(),
                        "realtime reconnect attempts exhausted — restart required"
                    );
                    self.set_state(ChannelState::Exhausted);
                    return;
                }
            }
        }
        self.set_state(ChannelState::Disconnected);
    }

    async fn connect_once(&self) -> Result<WsStream, SyncError> {
        let mut request = self.ws_url.as_str().into_client_request()?;
        let bearer = HeaderValue::from_str(&format!("Bearer {}", self.access_token))
            .map_err(|_| {
                SyncError::Configuration(
                    "access token contains characters not allowed in an Authorization header"
                        .into(),
                )
            })?;
        request.headers_mut().insert(AUTHORIZATION, bearer);
        let (ws, _) = connect_async(request).await?;
        Ok(ws)
    }

    /// Drive an open connection: subscribe, then pump inbound events until
    /// the connection drops (returns `false`) or a shutdown is requested
    /// (returns `true`).
    async fn drive(&self, ws: WsStream, shutdown_rx: &mut watch::Receiver<bool>) -> bool {
        let (mut sink, mut stream) = ws.split();

        let subscribe = serde_json::json!({
            "type": "subscribe",
            "channels": ["task_updates"],
        })
        .to_string();
        if let Err(e) = sink.send(Message::Text(subscribe)).await {
            warn!(err = %e, "failed to send subscribe frame");
            return false;
        }

        loop {
            tokio::select! {
                msg = stream.next() => match msg {
                    Some(Ok(Message::Text(text))) => self.handle_message(&text).await,
                    Some(Ok(Message::Close(_))) | None => return false,
                    Some(Ok(_)) => {} // ping/pong/binary — nothing to do
                    Some(Err(e)) => {
                        warn!(err = %e, "realtime stream error");
                        return false;
                    }
                },
                res = shutdown_rx.changed() => {
                    if res.is_err() || *shutdown_rx.borrow() {
                        let _ = sink.send(Message::Close(None)).await;
                        return true;
                    }
                }
            }
        }
    }

    /// Malformed or unrecognized messages are logged and dropped — never
    /// fatal to the connection.
    async fn handle_message(&self, text: &str) {
        match parse_event(text) {
            Ok(Some(task)) => {
                if let Err(e) = self.orchestrator.reconcile_one(&task).await {
                    warn!(external_id = %task.id, err = %e, "realtime reconcile failed");
                } else {
                    debug!(external_id = %task.id, "realtime task update applied");
                }
            }
            Ok(None) => debug!("ignoring realtime message without task_update tag"),
            Err(e) => warn!(err = %e, "dropping malformed realtime message"),
        }
    }
}
