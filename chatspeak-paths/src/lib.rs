//! Cross-platform path utilities for Chatspeak.
//!
//! The single source of truth for where the daemon keeps its configuration
//! file and its Unix sockets.
//!
//! # Platform Behavior
//!
//! | Platform | Config Directory | Socket Directory |
//! |----------|------------------|------------------|
//! | Linux    | `~/.config/chatspeak` | `$XDG_RUNTIME_DIR` or data dir |
//! | macOS    | `~/Library/Application Support/chatspeak` | Same as data dir |

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Errors specific to path operations.
#[derive(Error, Debug)]
pub enum PathError {
    #[error("Could not determine config directory")]
    NoConfigDirectory,

    #[error("Could not determine data directory")]
    NoDataDirectory,

    #[error("Could not create directory {path}: {source}")]
    DirectoryCreation { path: PathBuf, source: io::Error },

    #[error("Could not set permissions on {path}: {source}")]
    Permissions { path: PathBuf, source: io::Error },
}

pub type Result<T> = std::result::Result<T, PathError>;

/// Application identifier used in path construction.
const APP_NAME: &str = "chatspeak";

const CONFIG_FILE_NAME: &str = "config.toml";

/// Control socket (enable/disable/status/quit).
const IPC_SOCKET_NAME: &str = "chatspeak.sock";

/// Overlay clients subscribe to display events here.
const DISPLAY_SOCKET_NAME: &str = "chatspeak_display.sock";

/// Create `dir` (and parents) when missing, restricted to the owner on Unix.
pub fn ensure_private_dir(dir: &Path) -> Result<()> {
    if dir.exists() {
        return Ok(());
    }

    fs::create_dir_all(dir).map_err(|source| PathError::DirectoryCreation {
        path: dir.to_path_buf(),
        source,
    })?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(dir, fs::Permissions::from_mode(0o700)).map_err(|source| {
            PathError::Permissions {
                path: dir.to_path_buf(),
                source,
            }
        })?;
    }

    Ok(())
}

/// Get the application data directory, creating it if needed.
///
/// - **Linux**: `~/.local/share/chatspeak`
/// - **macOS**: `~/Library/Application Support/chatspeak`
pub fn get_data_dir() -> Result<PathBuf> {
    let data_dir = dirs::data_dir()
        .ok_or(PathError::NoDataDirectory)?
        .join(APP_NAME);
    ensure_private_dir(&data_dir)?;
    Ok(data_dir)
}

/// Get the configuration directory, creating it if needed.
///
/// - **Linux**: `~/.config/chatspeak`
/// - **macOS**: `~/Library/Application Support/chatspeak`
pub fn get_config_dir() -> Result<PathBuf> {
    let config_dir = dirs::config_dir()
        .ok_or(PathError::NoConfigDirectory)?
        .join(APP_NAME);
    ensure_private_dir(&config_dir)?;
    Ok(config_dir)
}

/// Default location of the TOML configuration file.
pub fn get_config_file_path() -> Result<PathBuf> {
    Ok(get_config_dir()?.join(CONFIG_FILE_NAME))
}

/// Get the directory that holds the daemon's sockets.
///
/// On Linux `$XDG_RUNTIME_DIR` is preferred when it exists; everywhere
/// else (and as the Linux fallback) the data directory is used.
pub fn get_socket_dir() -> Result<PathBuf> {
    #[cfg(target_os = "linux")]
    {
        if let Some(runtime_dir) = dirs::runtime_dir() {
            if runtime_dir.exists() {
                return Ok(runtime_dir);
            }
        }
    }

    get_data_dir()
}

pub fn get_ipc_socket_path() -> Result<PathBuf> {
    Ok(get_socket_dir()?.join(IPC_SOCKET_NAME))
}

pub fn get_display_socket_path() -> Result<PathBuf> {
    Ok(get_socket_dir()?.join(DISPLAY_SOCKET_NAME))
}

/// Restrict a bound socket to its owner (0o600). No-op when it is missing.
#[cfg(unix)]
pub fn secure_socket_permissions(socket_path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    if socket_path.exists() {
        fs::set_permissions(socket_path, fs::Permissions::from_mode(0o600)).map_err(
            |source| PathError::Permissions {
                path: socket_path.to_path_buf(),
                source,
            },
        )?;
    }

    Ok(())
}

#[cfg(not(unix))]
pub fn secure_socket_permissions(_socket_path: &Path) -> Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_socket_names() {
        let ipc = get_ipc_socket_path().expect("Should get socket path");
        assert!(ipc.ends_with("chatspeak.sock"));

        let display = get_display_socket_path().expect("Should get display socket path");
        assert!(display.ends_with("chatspeak_display.sock"));
        assert_eq!(ipc.parent(), display.parent());
    }

    #[test]
    fn test_config_file_path() {
        let path = get_config_file_path().expect("Should get config path");
        assert!(path.ends_with("chatspeak/config.toml"));
        assert!(path.parent().map(Path::exists).unwrap_or(false));
    }

    #[cfg(unix)]
    #[test]
    fn test_ensure_private_dir() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("nested").join("chatspeak");
        ensure_private_dir(&dir).unwrap();
        assert!(dir.is_dir());

        let mode = fs::metadata(&dir).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o700);

        // existing directory is left alone
        ensure_private_dir(&dir).unwrap();
    }

    #[cfg(unix)]
    #[test]
    fn test_secure_socket_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("test.sock");
        secure_socket_permissions(&path).unwrap();

        fs::write(&path, b"").unwrap();
        secure_socket_permissions(&path).unwrap();
        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
