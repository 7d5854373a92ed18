//! Connection manager - owns the socket lifecycle
//!
//! One supervising task per `start`: connect, run the handshake, stream frames to the
//! decode worker, and on a retryable failure wait out the backoff before the next
//! attempt. Authentication failures end the loop for good; a fresh `start` is needed.
//!
//! State is published two ways: a `watch` for the current value and a `broadcast`
//! of transitions. Inbound event frames go out on an unbounded `mpsc` so a slow
//! consumer never stalls the socket reader.

use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use serde::Serialize;
use tokio::net::TcpStream;
use tokio::sync::{broadcast, mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, warn};

use super::backoff::BackoffPolicy;
use super::endpoint::Endpoint;
use super::error::SessionError;
use super::handshake::{Delivery, Handshake, HandshakeState};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsWrite = SplitSink<WsStream, Message>;
type WsRead = SplitStream<WsStream>;

/// Normal closure
const CLOSE_NORMAL: u16 = 1000;
/// How long `stop` waits for the supervising task before aborting it
const STOP_GRACE: Duration = Duration::from_secs(5);
const TRANSITION_BUFFER: usize = 32;

/// Externally observable connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Connecting,
    Connected,
    Disconnected,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Disconnected => "disconnected",
        }
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tunables for the supervising loop
#[derive(Debug, Clone)]
pub struct ManagerConfig {
    pub connect_timeout: Duration,
    pub handshake_timeout: Duration,
    pub backoff: BackoffPolicy,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            handshake_timeout: Duration::from_secs(20),
            backoff: BackoffPolicy::default(),
        }
    }
}

/// Single writer (the supervising loop), many readers.
struct StatePublisher {
    current: watch::Sender<ConnectionState>,
    transitions: broadcast::Sender<ConnectionState>,
}

impl StatePublisher {
    fn new() -> Self {
        let (current, _) = watch::channel(ConnectionState::Disconnected);
        let (transitions, _) = broadcast::channel(TRANSITION_BUFFER);
        Self { current, transitions }
    }

    fn set(&self, state: ConnectionState) {
        let changed = self.current.send_if_modified(|current| {
            if *current == state {
                false
            } else {
                *current = state;
                true
            }
        });
        if changed {
            info!(state = %state, "Connection state changed");
            let _ = self.transitions.send(state);
        }
    }
}

struct RunningSession {
    endpoint: Endpoint,
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

/// Owned handle over the one upstream connection.
///
/// `start`/`stop` serialize on an internal lock, so they never interleave
/// mid-transition.
pub struct ConnectionManager {
    config: ManagerConfig,
    publisher: Arc<StatePublisher>,
    frames: mpsc::UnboundedSender<String>,
    session: Mutex<Option<RunningSession>>,
}

impl ConnectionManager {
    /// Create the manager and the receiving end of its event frame stream.
    pub fn new(config: ManagerConfig) -> (Self, mpsc::UnboundedReceiver<String>) {
        let (frames, frames_rx) = mpsc::unbounded_channel();
        let manager = Self {
            config,
            publisher: Arc::new(StatePublisher::new()),
            frames,
            session: Mutex::new(None),
        };
        (manager, frames_rx)
    }

    /// Current state
    pub fn state(&self) -> ConnectionState {
        *self.publisher.current.borrow()
    }

    /// Follow the current state
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.publisher.current.subscribe()
    }

    /// Every transition, in order
    pub fn subscribe_transitions(&self) -> broadcast::Receiver<ConnectionState> {
        self.publisher.transitions.subscribe()
    }

    /// Whether a supervising loop is alive
    pub async fn is_running(&self) -> bool {
        self.session
            .lock()
            .await
            .as_ref()
            .map(|s| !s.task.is_finished())
            .unwrap_or(false)
    }

    /// Start streaming from `endpoint`.
    ///
    /// Returns `false` when a live session for the same endpoint already exists.
    /// A live session for a different endpoint is stopped first.
    pub async fn start(&self, endpoint: Endpoint) -> bool {
        let mut guard = self.session.lock().await;

        if let Some(running) = guard.as_ref() {
            if running.endpoint == endpoint && !running.task.is_finished() {
                debug!(url = %endpoint.url, "Session already running for endpoint");
                return false;
            }
        }

        if let Some(previous) = guard.take() {
            info!(from = %previous.endpoint.url, to = %endpoint.url, "Replacing connection session");
            self.shutdown_session(previous).await;
        }

        info!(url = %endpoint.url, "Starting connection session");
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(supervise(
            endpoint.clone(),
            self.config.clone(),
            Arc::clone(&self.publisher),
            self.frames.clone(),
            shutdown_rx,
        ));
        *guard = Some(RunningSession {
            endpoint,
            shutdown: shutdown_tx,
            task,
        });
        true
    }

    /// Stop the session, if any. Safe to call when nothing runs.
    pub async fn stop(&self) {
        let mut guard = self.session.lock().await;
        if let Some(running) = guard.take() {
            info!(url = %running.endpoint.url, "Stopping connection session");
            self.shutdown_session(running).await;
        }
        self.publisher.set(ConnectionState::Disconnected);
    }

    async fn shutdown_session(&self, running: RunningSession) {
        let RunningSession { shutdown, mut task, .. } = running;
        let _ = shutdown.send(true);
        if tokio::time::timeout(STOP_GRACE, &mut task).await.is_err() {
            warn!("Supervising task did not stop in time; aborting");
            task.abort();
        }
        self.publisher.set(ConnectionState::Disconnected);
    }
}

/// Resolves once a stop was requested (or the manager went away).
async fn shutdown_requested(rx: &mut watch::Receiver<bool>) {
    while !*rx.borrow_and_update() {
        if rx.changed().await.is_err() {
            return;
        }
    }
}

async fn supervise(
    endpoint: Endpoint,
    config: ManagerConfig,
    publisher: Arc<StatePublisher>,
    frames: mpsc::UnboundedSender<String>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut attempt: u32 = 0;

    loop {
        if *shutdown.borrow() {
            break;
        }

        publisher.set(ConnectionState::Connecting);
        debug!(url = %endpoint.url, attempt, "Connecting");

        let result = run_session(
            &endpoint,
            &config,
            &publisher,
            &frames,
            &mut shutdown,
            &mut attempt,
        )
        .await;

        match result {
            Ok(()) => {
                debug!("Session ended on request");
                break;
            }
            Err(e) if e.is_fatal() => {
                error!(url = %endpoint.url, error = %e, "Authentication failed; not retrying");
                break;
            }
            Err(e) => {
                publisher.set(ConnectionState::Disconnected);
                attempt = attempt.saturating_add(1);
                let delay = config.backoff.next_delay(attempt);
                warn!(
                    url = %endpoint.url,
                    error = %e,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "Connection lost; retrying"
                );
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = shutdown_requested(&mut shutdown) => break,
                }
            }
        }
    }

    publisher.set(ConnectionState::Disconnected);
}

async fn run_session(
    endpoint: &Endpoint,
    config: &ManagerConfig,
    publisher: &StatePublisher,
    frames: &mpsc::UnboundedSender<String>,
    shutdown: &mut watch::Receiver<bool>,
    attempt: &mut u32,
) -> Result<(), SessionError> {
    let connect = tokio::time::timeout(config.connect_timeout, connect_async(endpoint.url.as_str()));
    let stream = tokio::select! {
        result = connect => match result {
            Ok(Ok((stream, _response))) => stream,
            Ok(Err(e)) => return Err(SessionError::Connect(e)),
            Err(_) => return Err(SessionError::ConnectTimeout(config.connect_timeout)),
        },
        _ = shutdown_requested(shutdown) => return Ok(()),
    };
    let (mut sink, mut source): (WsWrite, WsRead) = stream.split();

    let mut handshake = Handshake::new(endpoint.auth_token.clone());
    let handshake_deadline = Instant::now() + config.handshake_timeout;

    loop {
        let streaming = handshake.is_streaming();
        let frame = tokio::select! {
            frame = source.next() => frame,
            _ = shutdown_requested(shutdown) => {
                close_socket(&mut sink, CLOSE_NORMAL, "bye").await;
                return Ok(());
            }
            _ = tokio::time::sleep_until(handshake_deadline), if !streaming => {
                close_socket(&mut sink, CLOSE_NORMAL, "handshake timeout").await;
                return Err(SessionError::HandshakeTimeout(config.handshake_timeout));
            }
        };

        let message = match frame {
            Some(Ok(message)) => message,
            Some(Err(e)) => return Err(SessionError::Transport(e)),
            None => {
                return Err(SessionError::Closed {
                    code: None,
                    reason: "stream ended".to_string(),
                })
            }
        };

        let text = match message {
            Message::Text(text) => text,
            Message::Close(frame) => {
                let (code, reason) = frame
                    .map(|f| (Some(u16::from(f.code)), f.reason.as_str().to_string()))
                    .unwrap_or((None, String::new()));
                return Err(SessionError::Closed { code, reason });
            }
            _ => continue,
        };

        let step = handshake.on_frame(text.as_str());

        if let Some(auth_error) = step.fatal {
            close_socket(&mut sink, auth_error.close_code(), &auth_error.to_string()).await;
            return Err(auth_error.into());
        }

        if let Some(outgoing) = step.outgoing {
            let payload = outgoing.to_json()?;
            sink.send(Message::text(payload))
                .await
                .map_err(SessionError::Transport)?;
            debug!(kind = outgoing.kind(), "Sent handshake frame");

            if handshake.state() == HandshakeState::Subscribing {
                handshake.mark_subscribed();
                *attempt = 0;
                publisher.set(ConnectionState::Connected);
            }
        }

        match step.delivery {
            Delivery::Drop => {}
            Delivery::Event | Delivery::Fallback => {
                if step.delivery == Delivery::Fallback {
                    debug!("Forwarding non-conforming frame through the event fallback");
                }
                if frames.send(text.as_str().to_string()).is_err() {
                    warn!("Event consumer is gone; closing session");
                    close_socket(&mut sink, CLOSE_NORMAL, "bye").await;
                    return Ok(());
                }
            }
        }
    }
}

async fn close_socket(sink: &mut WsWrite, code: u16, reason: &str) {
    let frame = CloseFrame {
        code: CloseCode::from(code),
        reason: reason.to_string().into(),
    };
    if let Err(e) = sink.send(Message::Close(Some(frame))).await {
        debug!(error = %e, "Close frame not delivered");
    }
}
