//! The tick-path owner of the bridge

use chatspeak_core::{Bridge, ChatSettings};
use tracing::info;

use crate::ipc::IpcCommand;

/// Reply to a control command, plus whether the daemon should exit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutcome {
    pub reply: String,
    pub quit: bool,
}

impl CommandOutcome {
    fn reply(reply: impl Into<String>) -> Self {
        Self {
            reply: reply.into(),
            quit: false,
        }
    }
}

/// Holds the bridge and the settings most recently requested for it.
///
/// `enable`/`disable`/`toggle` change only the in-memory settings; the next
/// reload of the config file replaces them with the file's values.
pub struct Daemon {
    bridge: Bridge,
    settings: ChatSettings,
}

impl Daemon {
    pub fn new(bridge: Bridge, settings: ChatSettings) -> Self {
        let mut daemon = Self { bridge, settings };
        daemon.submit();
        daemon
    }

    pub fn bridge(&self) -> &Bridge {
        &self.bridge
    }

    pub fn settings(&self) -> &ChatSettings {
        &self.settings
    }

    /// New `[chat]` settings from the config file
    pub fn reload(&mut self, settings: ChatSettings) {
        self.settings = settings;
        self.submit();
    }

    fn submit(&mut self) {
        self.bridge.submit_config(self.settings.normalize());
    }

    fn set_enabled(&mut self, enabled: bool) {
        self.settings.enabled = enabled;
        self.submit();
    }

    pub fn handle_command(&mut self, command: IpcCommand) -> CommandOutcome {
        match command {
            IpcCommand::Enable => {
                self.set_enabled(true);
                CommandOutcome::reply("Chat speech enabled")
            }
            IpcCommand::Disable => {
                self.set_enabled(false);
                CommandOutcome::reply("Chat speech disabled")
            }
            IpcCommand::Toggle => {
                let enabled = !self.settings.enabled;
                self.set_enabled(enabled);
                CommandOutcome::reply(if enabled {
                    "Chat speech enabled"
                } else {
                    "Chat speech disabled"
                })
            }
            IpcCommand::Status => match serde_json::to_string(&self.bridge.status()) {
                Ok(json) => CommandOutcome::reply(json),
                Err(e) => CommandOutcome::reply(format!("Error: {}", e)),
            },
            IpcCommand::Drain => {
                let drained = self.bridge.drain();
                CommandOutcome::reply(format!("Drained {} message(s)", drained))
            }
            IpcCommand::Quit => {
                info!("Received quit command");
                CommandOutcome {
                    reply: "Shutting down".to_string(),
                    quit: true,
                }
            }
        }
    }

    pub async fn tick(&mut self) {
        self.bridge.tick().await;
    }

    pub async fn shutdown(&mut self) {
        self.bridge.shutdown().await;
    }
}
