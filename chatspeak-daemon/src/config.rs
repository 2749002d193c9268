//! Configuration management

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use chatspeak_core::connection::{Endpoint, DEFAULT_HOST, DEFAULT_PORT};
use chatspeak_core::debounce::DEFAULT_DEBOUNCE;
use chatspeak_core::queue::DEFAULT_QUEUE_CAPACITY;
use chatspeak_core::synth::DEFAULT_SYNTH_BINARY;
use chatspeak_core::{BridgeOptions, ChatSettings};
use serde::{Deserialize, Serialize};

/// Process-level settings (not hot reloaded)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonSettings {
    /// Chat server host
    pub server_host: String,

    /// Chat server port (plaintext)
    pub server_port: u16,

    /// Speech synthesis executable
    pub synth_binary: String,

    /// Host tick period (milliseconds)
    pub tick_ms: u64,

    /// Pending utterance limit
    pub queue_capacity: usize,

    /// Quiet period before an edited config is applied (milliseconds)
    pub debounce_ms: u64,

    /// IPC socket override (default: `<socket_dir>/chatspeak.sock`)
    pub socket_path: Option<PathBuf>,

    /// Overlay socket override (default: `<socket_dir>/chatspeak_display.sock`)
    pub display_socket_path: Option<PathBuf>,
}

impl Default for DaemonSettings {
    fn default() -> Self {
        Self {
            server_host: DEFAULT_HOST.to_string(),
            server_port: DEFAULT_PORT,
            synth_binary: DEFAULT_SYNTH_BINARY.to_string(),
            tick_ms: 50,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            debounce_ms: DEFAULT_DEBOUNCE.as_millis() as u64,
            socket_path: None,
            display_socket_path: None,
        }
    }
}

impl DaemonSettings {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_ms.max(1))
    }

    pub fn bridge_options(&self) -> BridgeOptions {
        BridgeOptions {
            endpoint: Endpoint {
                host: self.server_host.clone(),
                port: self.server_port,
            },
            queue_capacity: self.queue_capacity,
            debounce: Duration::from_millis(self.debounce_ms),
            ..Default::default()
        }
    }

    pub fn ipc_socket_path(&self) -> Result<PathBuf> {
        match &self.socket_path {
            Some(path) => Ok(path.clone()),
            None => chatspeak_paths::get_ipc_socket_path().context("Failed to resolve IPC socket path"),
        }
    }

    pub fn display_socket_path(&self) -> Result<PathBuf> {
        match &self.display_socket_path {
            Some(path) => Ok(path.clone()),
            None => chatspeak_paths::get_display_socket_path()
                .context("Failed to resolve display socket path"),
        }
    }
}

/// Daemon configuration file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    /// Path to configuration file
    #[serde(skip)]
    pub config_path: PathBuf,

    /// Chat reader settings (hot reloaded)
    pub chat: ChatSettings,

    /// Process settings
    pub daemon: DaemonSettings,
}

impl DaemonConfig {
    /// Load configuration from `path` (or the default location), creating a
    /// default file when none exists.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = match path {
            Some(path) => path.to_path_buf(),
            None => Self::default_config_path()?,
        };

        if config_path.exists() {
            Self::read(&config_path)
        } else {
            let config = Self {
                config_path,
                ..Default::default()
            };
            config.save().context("Failed to save default config")?;
            Ok(config)
        }
    }

    /// Read and parse an existing file
    pub fn read(config_path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file {}", config_path.display()))?;

        let mut config: DaemonConfig = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file {}", config_path.display()))?;

        config.config_path = config_path.to_path_buf();
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.config_path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;

        std::fs::write(&self.config_path, contents).context("Failed to write config file")?;

        Ok(())
    }

    fn default_config_path() -> Result<PathBuf> {
        chatspeak_paths::get_config_file_path().context("Failed to resolve config file path")
    }
}
