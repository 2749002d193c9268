//! Chat server connection lifecycle
//!
//! A single background task connects, authenticates, joins the channel and
//! reads lines until the peer goes away, then reconnects with exponential
//! backoff. Stopping cancels the task, which drops the socket and unblocks
//! any pending read or backoff sleep immediately.
//!
//! ```text
//! Disconnected -> Connecting -> Handshaking -> Listening -> Disconnected ...
//!                                     (stop) -> Stopped
//! ```

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use serde::Serialize;
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::codec::FramedRead;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::codec::LineCodec;
use crate::config::ChatConfig;
use crate::error::{BridgeError, Result};
use crate::intake::ChatIntake;
use crate::parser::{parse_line, ChatEvent};
use crate::stats::PipelineStats;

pub const DEFAULT_HOST: &str = "irc.chat.twitch.tv";
pub const DEFAULT_PORT: u16 = 6667;

/// Sent as PASS when no credential is configured (anonymous login)
pub const PLACEHOLDER_TOKEN: &str = "SCHMOOPIIE";
pub const PONG_REPLY: &str = "PONG :tmi.twitch.tv";

pub const INITIAL_BACKOFF: Duration = Duration::from_secs(5);
pub const MAX_BACKOFF: Duration = Duration::from_secs(60);
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
/// Upper bound on waiting for the worker after a stop request
pub const STOP_TIMEOUT: Duration = Duration::from_secs(2);

/// Remote chat server address
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl Default for Endpoint {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
        }
    }
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Handshaking,
    Listening,
    Stopped,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionState::Disconnected => write!(f, "disconnected"),
            ConnectionState::Connecting => write!(f, "connecting"),
            ConnectionState::Handshaking => write!(f, "handshaking"),
            ConnectionState::Listening => write!(f, "listening"),
            ConnectionState::Stopped => write!(f, "stopped"),
        }
    }
}

/// Exponential reconnect delay: doubles per consecutive failure up to a cap
#[derive(Debug, Clone)]
pub struct Backoff {
    initial: Duration,
    max: Duration,
    current: Duration,
}

impl Backoff {
    pub fn new(initial: Duration, max: Duration) -> Self {
        Self {
            initial,
            max: max.max(initial),
            current: initial,
        }
    }

    /// Delay to sleep now; advances the schedule for the next failure.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = (self.current * 2).min(self.max);
        delay
    }

    pub fn reset(&mut self) {
        self.current = self.initial;
    }

    pub fn current(&self) -> Duration {
        self.current
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(INITIAL_BACKOFF, MAX_BACKOFF)
    }
}

/// Registration lines sent right after connecting, without terminators.
pub fn handshake_lines(config: &ChatConfig) -> Vec<String> {
    let token = if config.oauth_token.is_empty() {
        PLACEHOLDER_TOKEN
    } else {
        config.oauth_token.as_str()
    };
    let token = if token.starts_with("oauth:") {
        token.to_string()
    } else {
        format!("oauth:{}", token)
    };

    vec![
        "CAP REQ :twitch.tv/membership".to_string(),
        format!("PASS {}", token),
        format!("NICK {}", config.nickname),
        format!("JOIN {}", config.channel),
    ]
}

struct Worker {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Owns the background connection task
pub struct ConnectionManager {
    endpoint: Endpoint,
    backoff: Backoff,
    state: Arc<watch::Sender<ConnectionState>>,
    stats: Arc<PipelineStats>,
    worker: Option<Worker>,
}

impl ConnectionManager {
    pub fn new(endpoint: Endpoint, stats: Arc<PipelineStats>) -> Self {
        let (state, _) = watch::channel(ConnectionState::Stopped);
        Self {
            endpoint,
            backoff: Backoff::default(),
            state: Arc::new(state),
            stats,
            worker: None,
        }
    }

    /// Replace the reconnect schedule used by subsequently started workers.
    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    /// True while a worker task exists and has not exited.
    pub fn is_alive(&self) -> bool {
        self.worker
            .as_ref()
            .map(|worker| !worker.handle.is_finished())
            .unwrap_or(false)
    }

    /// Spawn the connection worker. No-op when one is already running.
    pub fn start(&mut self, intake: ChatIntake) {
        if self.is_alive() {
            debug!("Chat worker already running");
            return;
        }

        let cancel = CancellationToken::new();
        self.state.send_replace(ConnectionState::Disconnected);

        let session = Session {
            endpoint: self.endpoint.clone(),
            intake,
            state: Arc::clone(&self.state),
            stats: Arc::clone(&self.stats),
        };
        let handle = tokio::spawn(run_worker(session, self.backoff.clone(), cancel.clone()));

        self.worker = Some(Worker { cancel, handle });
    }

    /// Signal the worker to exit and wait (bounded) for it.
    pub async fn stop(&mut self) {
        let Some(worker) = self.worker.take() else {
            return;
        };

        worker.cancel.cancel();
        let mut handle = worker.handle;
        match tokio::time::timeout(STOP_TIMEOUT, &mut handle).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => error!("Chat worker panicked: {}", e),
            Err(_) => {
                warn!("Chat worker did not stop within {:?}; aborting", STOP_TIMEOUT);
                handle.abort();
            }
        }

        self.state.send_replace(ConnectionState::Stopped);
    }
}

/// Everything one worker needs, moved into its task
struct Session {
    endpoint: Endpoint,
    intake: ChatIntake,
    state: Arc<watch::Sender<ConnectionState>>,
    stats: Arc<PipelineStats>,
}

async fn run_worker(session: Session, mut backoff: Backoff, cancel: CancellationToken) {
    while !cancel.is_cancelled() {
        session.state.send_replace(ConnectionState::Connecting);
        session.stats.connection_attempted();

        // Dropping the session future closes the socket
        let result = tokio::select! {
            _ = cancel.cancelled() => break,
            result = session.run(&mut backoff) => result,
        };

        session.state.send_replace(ConnectionState::Disconnected);
        if cancel.is_cancelled() {
            break;
        }

        let delay = backoff.next_delay();
        match result {
            Ok(()) => info!("Chat session ended; reconnecting in {}s", delay.as_secs_f64()),
            Err(e) => warn!(
                error = %e,
                delay_secs = delay.as_secs_f64(),
                "Chat connection error"
            ),
        }

        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(delay) => {}
        }
    }

    session.state.send_replace(ConnectionState::Stopped);
    debug!("Chat worker exited");
}

impl Session {
    async fn run(&self, backoff: &mut Backoff) -> Result<()> {
        let address = (self.endpoint.host.as_str(), self.endpoint.port);
        let stream = tokio::time::timeout(CONNECT_TIMEOUT, TcpStream::connect(address))
            .await
            .map_err(|_| {
                std::io::Error::new(std::io::ErrorKind::TimedOut, "connect timed out")
            })??;

        self.state.send_replace(ConnectionState::Handshaking);
        let (reader, mut writer) = stream.into_split();

        for line in handshake_lines(self.intake.config()) {
            send_line(&mut writer, &line)
                .await
                .map_err(|e| BridgeError::handshake(format!("failed to send handshake: {}", e)))?;
        }

        self.state.send_replace(ConnectionState::Listening);
        backoff.reset();
        self.stats.session_started();
        info!(
            channel = %self.intake.config().channel,
            "Connected to chat at {}",
            self.endpoint
        );

        let mut lines = FramedRead::new(reader, LineCodec::new());
        while let Some(line) = lines.next().await {
            let line = line?;
            self.stats.line_received();
            self.handle_line(&mut writer, &line).await;
        }

        Err(BridgeError::PeerClosed)
    }

    async fn handle_line(&self, writer: &mut OwnedWriteHalf, line: &str) {
        match parse_line(line) {
            Some(ChatEvent::Ping) => {
                if let Err(e) = send_line(writer, PONG_REPLY).await {
                    warn!("Failed to respond to PING: {}", e);
                }
            }
            Some(event) => {
                self.intake.handle(event);
            }
            None => {}
        }
    }
}

async fn send_line(writer: &mut OwnedWriteHalf, line: &str) -> std::io::Result<()> {
    writer.write_all(format!("{}\r\n", line).as_bytes()).await
}
