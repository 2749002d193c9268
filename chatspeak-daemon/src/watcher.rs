//! Config file hot reload

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chatspeak_core::ChatSettings;
use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::config::DaemonConfig;

/// Re-reads the config file on change and forwards its `[chat]` table.
///
/// The parent directory is watched (not just the file) so editors that
/// replace the file on save are still picked up. Dropping this stops
/// watching.
pub struct ConfigWatcher {
    _watcher: RecommendedWatcher,
    config_path: PathBuf,
}

impl ConfigWatcher {
    pub fn start(config_path: &Path, tx: mpsc::UnboundedSender<ChatSettings>) -> Result<Self> {
        let path = config_path.to_path_buf();
        let file_name = config_path.file_name().map(|name| name.to_os_string());

        let mut watcher =
            notify::recommended_watcher(move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    if !(event.kind.is_modify() || event.kind.is_create()) {
                        return;
                    }
                    let ours = event
                        .paths
                        .iter()
                        .any(|changed| changed.file_name().map(|n| n.to_os_string()) == file_name);
                    // truncated mid-save; the write that follows fires again
                    let empty = std::fs::metadata(&path).map(|m| m.len() == 0).unwrap_or(true);
                    if !ours || empty {
                        return;
                    }

                    match DaemonConfig::read(&path) {
                        Ok(config) => {
                            info!("Config file changed, reloading...");
                            let _ = tx.send(config.chat);
                        }
                        // keep the active settings on a half-written or invalid file
                        Err(e) => warn!("Ignoring config change: {:#}", e),
                    }
                }
                Err(e) => error!("File watch error: {}", e),
            })
            .context("Failed to create config watcher")?;

        let parent = config_path
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        watcher
            .watch(parent, RecursiveMode::NonRecursive)
            .with_context(|| format!("Failed to watch {}", parent.display()))?;

        info!("Watching {:?} for changes", config_path);
        Ok(Self {
            _watcher: watcher,
            config_path: config_path.to_path_buf(),
        })
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_reload_on_change() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let config = DaemonConfig::load(Some(&path)).unwrap();
        assert!(!config.chat.enabled);

        let (tx, mut rx) = mpsc::unbounded_channel();
        let watcher = ConfigWatcher::start(&path, tx).unwrap();
        assert_eq!(watcher.config_path(), path);

        // give the backend a moment to register the watch
        tokio::time::sleep(Duration::from_millis(100)).await;
        std::fs::write(&path, "[chat]\nenabled = true\nchannel = \"#reloaded\"\n").unwrap();

        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        loop {
            let settings = tokio::time::timeout_at(deadline, rx.recv())
                .await
                .expect("no reload event")
                .expect("watcher channel closed");
            // a write can surface as several events, the first may see a truncated file
            if settings.enabled {
                assert_eq!(settings.channel, "#reloaded");
                break;
            }
        }
    }
}
