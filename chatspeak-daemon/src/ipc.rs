//! Unix socket IPC server for control commands
//!
//! One text command per connection, one text reply. Commands are handed to
//! the tick loop, which owns the bridge, and the reply comes back over a
//! oneshot channel.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info};

/// IPC command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IpcCommand {
    Enable,
    Disable,
    Toggle,
    Status,
    Drain,
    Quit,
}

impl IpcCommand {
    pub fn parse(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "enable" => Ok(Self::Enable),
            "disable" => Ok(Self::Disable),
            "toggle" => Ok(Self::Toggle),
            "status" => Ok(Self::Status),
            "drain" => Ok(Self::Drain),
            "quit" | "exit" | "shutdown" => Ok(Self::Quit),
            _ => anyhow::bail!("Unknown command: {}", s.trim()),
        }
    }
}

/// A command waiting for the tick loop
#[derive(Debug)]
pub struct IpcRequest {
    pub command: IpcCommand,
    pub reply: oneshot::Sender<String>,
}

/// Unix socket IPC server
pub struct IpcServer {
    listener: UnixListener,
    socket_path: PathBuf,
}

impl IpcServer {
    /// Bind the control socket, replacing a stale one.
    pub fn bind(socket_path: &Path) -> Result<Self> {
        let _ = std::fs::remove_file(socket_path);

        let listener = UnixListener::bind(socket_path)
            .with_context(|| format!("Failed to bind Unix socket {}", socket_path.display()))?;
        chatspeak_paths::secure_socket_permissions(socket_path)
            .context("Failed to secure IPC socket")?;

        info!("IPC server listening on {}", socket_path.display());

        Ok(Self {
            listener,
            socket_path: socket_path.to_path_buf(),
        })
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Accept connections until the request channel closes.
    pub async fn run(self, requests: mpsc::Sender<IpcRequest>) {
        loop {
            let stream = match self.listener.accept().await {
                Ok((stream, _)) => stream,
                Err(e) => {
                    error!("Failed to accept IPC connection: {}", e);
                    continue;
                }
            };

            if requests.is_closed() {
                break;
            }

            let requests = requests.clone();
            tokio::spawn(async move {
                if let Err(e) = handle_connection(stream, requests).await {
                    error!("IPC connection error: {:#}", e);
                }
            });
        }
    }
}

impl Drop for IpcServer {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.socket_path);
    }
}

/// Handle a single IPC connection
pub async fn handle_connection(
    mut stream: UnixStream,
    requests: mpsc::Sender<IpcRequest>,
) -> Result<()> {
    let mut buffer = [0u8; 1024];
    let n = stream.read(&mut buffer).await?;

    if n == 0 {
        return Ok(());
    }

    let request = String::from_utf8_lossy(&buffer[..n]);
    debug!("Received IPC command: {}", request.trim());

    let response = match IpcCommand::parse(&request) {
        Ok(command) => {
            let (reply, response) = oneshot::channel();
            requests
                .send(IpcRequest { command, reply })
                .await
                .context("Daemon is shutting down")?;
            response.await.context("Daemon dropped the request")?
        }
        Err(e) => format!("Error: {}", e),
    };

    stream.write_all(response.as_bytes()).await?;
    stream.flush().await?;

    Ok(())
}

/// Send one command to a running daemon and return its reply.
pub async fn send_command(socket_path: &Path, command: &str) -> Result<String> {
    let mut stream = UnixStream::connect(socket_path)
        .await
        .with_context(|| format!("Failed to connect to {}", socket_path.display()))?;

    stream.write_all(command.as_bytes()).await?;
    stream.shutdown().await?;

    let mut response = String::new();
    stream.read_to_string(&mut response).await?;
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_commands() {
        assert_eq!(IpcCommand::parse("enable").unwrap(), IpcCommand::Enable);
        assert_eq!(IpcCommand::parse(" Disable\n").unwrap(), IpcCommand::Disable);
        assert_eq!(IpcCommand::parse("TOGGLE").unwrap(), IpcCommand::Toggle);
        assert_eq!(IpcCommand::parse("status").unwrap(), IpcCommand::Status);
        assert_eq!(IpcCommand::parse("drain").unwrap(), IpcCommand::Drain);
        for quit in ["quit", "exit", "shutdown"] {
            assert_eq!(IpcCommand::parse(quit).unwrap(), IpcCommand::Quit);
        }
    }

    #[test]
    fn test_unknown_command() {
        let err = IpcCommand::parse("dance\n").unwrap_err();
        assert_eq!(err.to_string(), "Unknown command: dance");
    }
}
