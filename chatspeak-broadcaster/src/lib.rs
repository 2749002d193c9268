//! Overlay display broadcaster for Chatspeak
//!
//! A Unix socket server that streams display operations (text and
//! visibility per named source) to overlay clients, such as a browser
//! source or a scene plugin that renders the text being spoken.
//!
//! # Features
//!
//! - Unix domain socket server (`$XDG_RUNTIME_DIR/chatspeak_display.sock`)
//! - Newline-delimited JSON protocol
//! - Multiple concurrent client connections
//! - Clients that stop reading are dropped after a bounded write wait
//! - New client catch-up (connection state, last text and visibility of
//!   every source)
//!
//! # Event Types
//!
//! - `text` - New text for a source
//! - `visibility` - Show or hide a source
//! - `connection_state` - Chat connection state change
//!
//! # Example Usage
//!
//! ```no_run
//! use chatspeak_broadcaster::DisplayBroadcaster;
//! use chatspeak_core::{ConnectionState, DisplayCommand};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let broadcaster = DisplayBroadcaster::new("/tmp/chatspeak_display.sock").await?;
//!     broadcaster.start().await?;
//!
//!     broadcaster.broadcast_connection_state(ConnectionState::Listening).await;
//!     broadcaster
//!         .apply(DisplayCommand::SetText {
//!             source: "ChatText".to_string(),
//!             text: "alice: hello".to_string(),
//!         })
//!         .await;
//!     broadcaster.set_visibility("ChatText".to_string(), true).await;
//!
//!     broadcaster.stop().await?;
//!     Ok(())
//! }
//! ```

pub mod broadcaster;
pub mod client;
pub mod error;
pub mod events;

// Re-exports
pub use broadcaster::DisplayBroadcaster;
pub use client::{DisplaySnapshot, CLIENT_WRITE_TIMEOUT};
pub use error::{BroadcasterError, Result};
pub use events::DisplayEvent;
