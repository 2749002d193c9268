use std::path::{Path, PathBuf};
use std::sync::Arc;

use chatspeak_core::{ConnectionState, DisplayCommand};
use chrono::{Local, Utc};
use tokio::net::UnixListener;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;

use crate::client::{Client, ClientManager, DisplaySnapshot};
use crate::error::{BroadcasterError, Result};
use crate::events::DisplayEvent;

/// Overlay display event broadcaster
pub struct DisplayBroadcaster {
    socket_path: PathBuf,
    client_manager: ClientManager,
    snapshot: Arc<RwLock<DisplaySnapshot>>,
    accept_task: Arc<Mutex<Option<JoinHandle<()>>>>,
    running: Arc<RwLock<bool>>,
}

impl DisplayBroadcaster {
    /// Create new broadcaster
    pub async fn new(socket_path: impl AsRef<Path>) -> Result<Self> {
        let socket_path = socket_path.as_ref().to_path_buf();

        let snapshot = DisplaySnapshot {
            connection_state: ConnectionState::Stopped.to_string(),
            ..Default::default()
        };

        Ok(Self {
            socket_path,
            client_manager: ClientManager::new(),
            snapshot: Arc::new(RwLock::new(snapshot)),
            accept_task: Arc::new(Mutex::new(None)),
            running: Arc::new(RwLock::new(false)),
        })
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Start the broadcaster (listen for clients)
    pub async fn start(&self) -> Result<()> {
        let is_running = *self.running.read().await;
        if is_running {
            return Err(BroadcasterError::AlreadyRunning);
        }

        // Remove stale socket file
        if self.socket_path.exists() {
            std::fs::remove_file(&self.socket_path)?;
        }

        let listener = UnixListener::bind(&self.socket_path)?;

        // Set secure permissions (0600 = owner-only access)
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if self.socket_path.exists() {
                let permissions = std::fs::Permissions::from_mode(0o600);
                std::fs::set_permissions(&self.socket_path, permissions)?;
            }
        }

        tracing::info!("Display broadcaster started on {:?} (permissions: 0600)", self.socket_path);

        *self.running.write().await = true;

        let clients = self.client_manager.clone_arc();
        let snapshot = Arc::clone(&self.snapshot);
        let running = Arc::clone(&self.running);

        let task = tokio::spawn(async move {
            loop {
                if !*running.read().await {
                    break;
                }

                match listener.accept().await {
                    Ok((stream, _addr)) => {
                        tracing::debug!("New overlay client connection accepted");
                        let mut client = Client::new(stream);

                        // Hold the client list while catching up so no live
                        // event can slip between the snapshot and the push
                        let mut list = clients.lock().await;
                        let current = snapshot.read().await.clone();

                        if let Err(e) = client.send_catch_up(&current, current_timestamp()).await {
                            tracing::warn!("Failed to send catch-up data: {}", e);
                            continue;
                        }

                        list.push(client);
                        tracing::info!("Overlay client added. Total: {}", list.len());
                    }
                    Err(e) => {
                        tracing::error!("Failed to accept client: {}", e);
                    }
                }
            }
            tracing::info!("Client acceptance task stopped");
        });

        *self.accept_task.lock().await = Some(task);

        Ok(())
    }

    /// Stop the broadcaster
    pub async fn stop(&self) -> Result<()> {
        let is_running = *self.running.read().await;
        if !is_running {
            return Err(BroadcasterError::NotStarted);
        }

        *self.running.write().await = false;

        if let Some(task) = self.accept_task.lock().await.take() {
            task.abort();
        }

        if self.socket_path.exists() {
            std::fs::remove_file(&self.socket_path)?;
        }

        tracing::info!("Display broadcaster stopped");
        Ok(())
    }

    /// Forward one display operation from the pipeline
    pub async fn apply(&self, command: DisplayCommand) {
        match command {
            DisplayCommand::SetText { source, text } => self.set_text(source, text).await,
            DisplayCommand::SetVisibility { source, visible } => {
                self.set_visibility(source, visible).await
            }
        }
    }

    pub async fn set_text(&self, source: String, text: String) {
        self.snapshot
            .write()
            .await
            .texts
            .insert(source.clone(), text.clone());

        let event = DisplayEvent::Text {
            source,
            text,
            timestamp: current_time_string(),
        };

        if let Err(e) = self.client_manager.broadcast(&event).await {
            tracing::error!("Failed to broadcast text: {}", e);
        }
    }

    pub async fn set_visibility(&self, source: String, visible: bool) {
        self.snapshot
            .write()
            .await
            .visibility
            .insert(source.clone(), visible);

        let event = DisplayEvent::Visibility {
            source,
            visible,
            timestamp: current_timestamp(),
        };

        if let Err(e) = self.client_manager.broadcast(&event).await {
            tracing::error!("Failed to broadcast visibility: {}", e);
        }
    }

    /// Broadcast chat connection state change
    pub async fn broadcast_connection_state(&self, state: ConnectionState) {
        let state = state.to_string();
        self.snapshot.write().await.connection_state = state.clone();

        let event = DisplayEvent::ConnectionState {
            state,
            timestamp: current_timestamp(),
        };

        if let Err(e) = self.client_manager.broadcast(&event).await {
            tracing::error!("Failed to broadcast connection_state: {}", e);
        }
    }

    /// Get current client count
    pub async fn client_count(&self) -> usize {
        self.client_manager.client_count().await
    }

    /// Copy of the state replayed to new clients
    pub async fn snapshot(&self) -> DisplaySnapshot {
        self.snapshot.read().await.clone()
    }
}

impl Drop for DisplayBroadcaster {
    fn drop(&mut self) {
        // Clean up socket file
        if self.socket_path.exists() {
            let _ = std::fs::remove_file(&self.socket_path);
        }
    }
}

pub(crate) fn current_timestamp() -> f64 {
    Utc::now().timestamp_millis() as f64 / 1000.0
}

pub(crate) fn current_time_string() -> String {
    Local::now().format("%H:%M:%S").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[tokio::test]
    async fn test_broadcaster_create() {
        let temp = NamedTempFile::new().unwrap();
        let path = temp.path().to_path_buf();
        std::fs::remove_file(&path).ok();

        let broadcaster = DisplayBroadcaster::new(path).await.unwrap();
        assert_eq!(broadcaster.client_count().await, 0);

        let snapshot = broadcaster.snapshot().await;
        assert_eq!(snapshot.connection_state, "stopped");
        assert!(snapshot.texts.is_empty());
    }

    #[tokio::test]
    async fn test_snapshot_tracks_latest_values() {
        let temp = NamedTempFile::new().unwrap();
        let path = temp.path().to_path_buf();
        std::fs::remove_file(&path).ok();

        let broadcaster = DisplayBroadcaster::new(path).await.unwrap();
        broadcaster
            .apply(DisplayCommand::SetText {
                source: "ChatText".to_string(),
                text: "alice: one".to_string(),
            })
            .await;
        broadcaster
            .apply(DisplayCommand::SetText {
                source: "ChatText".to_string(),
                text: "bob: two".to_string(),
            })
            .await;
        broadcaster.set_visibility("Avatar".to_string(), true).await;
        broadcaster.set_visibility("Avatar".to_string(), false).await;
        broadcaster
            .broadcast_connection_state(ConnectionState::Listening)
            .await;

        let snapshot = broadcaster.snapshot().await;
        assert_eq!(snapshot.texts.get("ChatText").map(String::as_str), Some("bob: two"));
        assert_eq!(snapshot.visibility.get("Avatar"), Some(&false));
        assert_eq!(snapshot.connection_state, "listening");
    }

    #[tokio::test]
    async fn test_stop_before_start() {
        let temp = NamedTempFile::new().unwrap();
        let path = temp.path().to_path_buf();
        std::fs::remove_file(&path).ok();

        let broadcaster = DisplayBroadcaster::new(path).await.unwrap();
        assert!(matches!(
            broadcaster.stop().await,
            Err(BroadcasterError::NotStarted)
        ));
    }
}
