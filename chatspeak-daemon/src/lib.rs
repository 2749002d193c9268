//! Chatspeak daemon library
//!
//! This module re-exports the daemon's modules for integration testing.

pub mod config;
pub mod daemon;
pub mod ipc;
pub mod watcher;

pub use config::{DaemonConfig, DaemonSettings};
pub use daemon::{CommandOutcome, Daemon};
pub use ipc::{IpcCommand, IpcRequest, IpcServer};
