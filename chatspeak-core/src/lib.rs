//! Chat-to-speech pipeline for Chatspeak
//!
//! Listens to a live chat channel over the IRC-style line protocol, turns
//! qualifying messages and join notifications into spoken utterances, and
//! paces them through an external speech synthesizer one at a time while an
//! overlay shows the text being spoken.
//!
//! # Pipeline
//!
//! ```text
//! TCP bytes -> LineCodec -> parse_line -> ChatIntake -> MessageQueue
//!                                                          |
//!            host tick -> Bridge::tick -> Dispatcher -> Synthesizer
//!                                              \-> DisplaySink
//! ```
//!
//! - The connection worker (one background task) owns the socket and only
//!   parses and enqueues.
//! - The host tick owns everything else: debounced configuration, dispatch
//!   pacing, display visibility.
//!
//! # Example Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use chatspeak_core::{Bridge, BridgeOptions, ChatSettings, EspeakSynthesizer, LogDisplay};
//!
//! #[tokio::main]
//! async fn main() {
//!     let mut bridge = Bridge::new(
//!         BridgeOptions::default(),
//!         Arc::new(EspeakSynthesizer::default()),
//!         Arc::new(LogDisplay),
//!     );
//!
//!     let settings = ChatSettings {
//!         enabled: true,
//!         channel: "somestreamer".to_string(),
//!         ..Default::default()
//!     };
//!     bridge.submit_config(settings.normalize());
//!
//!     let mut ticker = tokio::time::interval(Duration::from_millis(50));
//!     loop {
//!         ticker.tick().await;
//!         bridge.tick().await;
//!     }
//! }
//! ```

pub mod bridge;
pub mod codec;
pub mod config;
pub mod connection;
pub mod debounce;
pub mod dispatcher;
pub mod display;
pub mod error;
pub mod intake;
pub mod parser;
pub mod pitch;
pub mod queue;
pub mod rate_limit;
pub mod sanitize;
pub mod stats;
pub mod synth;

// Re-exports
pub use bridge::{Bridge, BridgeOptions, BridgeStatus};
pub use config::{ChatConfig, ChatSettings};
pub use connection::{Backoff, ConnectionManager, ConnectionState, Endpoint};
pub use debounce::ConfigDebouncer;
pub use dispatcher::{DispatchOutcome, Dispatcher};
pub use display::{ChannelDisplay, Display, DisplayCommand, DisplaySink, LogDisplay};
pub use error::{BridgeError, FailureKind, Result, SynthesisError};
pub use parser::{parse_line, ChatEvent};
pub use pitch::{pitch, to_synthesis_pitch, PitchRange};
pub use queue::{message_queue, MessageQueue, QueueProducer, QueuedMessage};
pub use stats::{PipelineStats, StatsSnapshot};
pub use synth::{EspeakSynthesizer, SpeechRequest, Synthesizer};
