//! External speech synthesis process

use std::collections::HashSet;
use std::io::ErrorKind;
use std::process::Stdio;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::process::Command;
use tracing::{debug, error};

use crate::error::{FailureKind, SynthesisError};

pub const DEFAULT_SYNTH_BINARY: &str = "espeak-ng";

/// One utterance handed to the synthesizer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpeechRequest {
    pub text: String,
    /// Words per minute
    pub rate: u32,
    /// Engine pitch, 0..=99
    pub pitch: u8,
}

#[async_trait]
pub trait Synthesizer: Send + Sync + 'static {
    /// Speak `request`, resolving once the utterance has finished.
    async fn speak(&self, request: &SpeechRequest) -> Result<(), SynthesisError>;
}

/// Runs `espeak-ng -s <rate> -p <pitch> -- <text>`
#[derive(Debug, Clone)]
pub struct EspeakSynthesizer {
    binary: String,
}

impl EspeakSynthesizer {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    pub fn binary(&self) -> &str {
        &self.binary
    }

    fn command(&self, request: &SpeechRequest) -> Command {
        let mut command = Command::new(&self.binary);
        command
            .arg("-s")
            .arg(request.rate.to_string())
            .arg("-p")
            .arg(request.pitch.to_string())
            // chat text must never be parsed as an option
            .arg("--")
            .arg(&request.text)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true);
        command
    }
}

impl Default for EspeakSynthesizer {
    fn default() -> Self {
        Self::new(DEFAULT_SYNTH_BINARY)
    }
}

#[async_trait]
impl Synthesizer for EspeakSynthesizer {
    async fn speak(&self, request: &SpeechRequest) -> Result<(), SynthesisError> {
        let status = self.command(request).status().await.map_err(|e| {
            if e.kind() == ErrorKind::NotFound {
                SynthesisError::BinaryMissing(self.binary.clone())
            } else {
                SynthesisError::Io(e)
            }
        })?;

        if !status.success() {
            return Err(SynthesisError::ExitStatus(status.to_string()));
        }
        Ok(())
    }
}

/// Reports each failure category once until a success re-arms it
#[derive(Debug, Clone, Default)]
pub struct FailureReporter {
    reported: Arc<Mutex<HashSet<FailureKind>>>,
}

impl FailureReporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Log `err`; returns true when it was logged at error level.
    pub fn report(&self, err: &SynthesisError) -> bool {
        let first = self.reported.lock().insert(err.kind());
        if first {
            match err {
                SynthesisError::BinaryMissing(binary) => {
                    error!("{} not found; install it or adjust PATH", binary)
                }
                other => error!("Speech synthesis failed: {}", other),
            }
        } else {
            debug!("Speech synthesis failed again: {}", err);
        }
        first
    }

    pub fn success(&self) {
        self.reported.lock().clear();
    }
}
