//! Error types for the chat bridge

use thiserror::Error;

pub type Result<T> = std::result::Result<T, BridgeError>;

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Handshake error: {0}")]
    Handshake(String),

    #[error("Connection closed by peer")]
    PeerClosed,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Synthesis error: {0}")]
    Synthesis(#[from] SynthesisError),
}

impl BridgeError {
    pub fn handshake<S: Into<String>>(msg: S) -> Self {
        Self::Handshake(msg.into())
    }

    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }
}

/// Failures of the external speech synthesis process
#[derive(Error, Debug)]
pub enum SynthesisError {
    #[error("Synthesis binary not found: {0}")]
    BinaryMissing(String),

    #[error("Synthesis process exited with {0}")]
    ExitStatus(String),

    #[error("Synthesis IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Coarse failure category used to rate-limit synthesis error reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    BinaryMissing,
    ExitStatus,
    Io,
}

impl SynthesisError {
    pub fn kind(&self) -> FailureKind {
        match self {
            SynthesisError::BinaryMissing(_) => FailureKind::BinaryMissing,
            SynthesisError::ExitStatus(_) => FailureKind::ExitStatus,
            SynthesisError::Io(_) => FailureKind::Io,
        }
    }
}
