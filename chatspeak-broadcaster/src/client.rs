use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::net::UnixStream;
use tokio::sync::Mutex;

use crate::error::{BroadcasterError, Result};
use crate::events::DisplayEvent;

/// Last known value of every source, replayed to new clients
#[derive(Debug, Clone, Default)]
pub struct DisplaySnapshot {
    pub connection_state: String,
    pub texts: BTreeMap<String, String>,
    pub visibility: BTreeMap<String, bool>,
}

/// How long one event may take to reach a client before it is dropped
pub const CLIENT_WRITE_TIMEOUT: Duration = Duration::from_millis(500);

/// Client connection wrapper
pub struct Client {
    stream: UnixStream,
    write_timeout: Duration,
}

impl Client {
    pub fn new(stream: UnixStream) -> Self {
        Self::with_write_timeout(stream, CLIENT_WRITE_TIMEOUT)
    }

    pub fn with_write_timeout(stream: UnixStream, write_timeout: Duration) -> Self {
        Self {
            stream,
            write_timeout,
        }
    }

    /// Send event to client
    ///
    /// A client that stops reading fills its socket buffer; the write then
    /// fails with `WriteTimeout` instead of waiting forever.
    pub async fn send_event(&mut self, event: &DisplayEvent) -> Result<()> {
        let json_line = event.to_json_line()?;
        tokio::time::timeout(self.write_timeout, self.stream.write_all(json_line.as_bytes()))
            .await
            .map_err(|_| BroadcasterError::WriteTimeout(self.write_timeout))??;
        Ok(())
    }

    /// Send current state to new client (catch-up)
    pub async fn send_catch_up(&mut self, snapshot: &DisplaySnapshot, timestamp: f64) -> Result<()> {
        let state_event = DisplayEvent::ConnectionState {
            state: snapshot.connection_state.clone(),
            timestamp,
        };
        self.send_event(&state_event).await?;

        // Text before visibility so a source never flashes stale content
        for (source, text) in &snapshot.texts {
            let text_event = DisplayEvent::Text {
                source: source.clone(),
                text: text.clone(),
                timestamp: crate::broadcaster::current_time_string(),
            };
            self.send_event(&text_event).await?;
        }

        for (source, visible) in &snapshot.visibility {
            let visibility_event = DisplayEvent::Visibility {
                source: source.clone(),
                visible: *visible,
                timestamp,
            };
            self.send_event(&visibility_event).await?;
        }

        Ok(())
    }
}

/// Thread-safe client list manager
pub struct ClientManager {
    clients: Arc<Mutex<Vec<Client>>>,
}

impl ClientManager {
    pub fn new() -> Self {
        Self {
            clients: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Broadcast event to all clients, removing dead ones
    pub async fn broadcast(&self, event: &DisplayEvent) -> Result<()> {
        let mut clients = self.clients.lock().await;
        let mut dead_indices = Vec::new();

        for (idx, client) in clients.iter_mut().enumerate() {
            if let Err(e) = client.send_event(event).await {
                tracing::warn!("Failed to send to client {}: {}", idx, e);
                dead_indices.push(idx);
            }
        }

        // Remove dead clients in reverse order
        for idx in dead_indices.iter().rev() {
            clients.remove(*idx);
            tracing::info!("Removed dead client. Remaining: {}", clients.len());
        }

        Ok(())
    }

    /// Get current client count
    pub async fn client_count(&self) -> usize {
        self.clients.lock().await.len()
    }

    /// Get cloned Arc for sharing
    pub fn clone_arc(&self) -> Arc<Mutex<Vec<Client>>> {
        Arc::clone(&self.clients)
    }
}

impl Default for ClientManager {
    fn default() -> Self {
        Self::new()
    }
}
