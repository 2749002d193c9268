//! Overlay display collaborator
//!
//! The host scene (text and image elements addressed by name) lives outside
//! this crate. The bridge only issues two idempotent operations per named
//! source: set its text, and set its visibility everywhere it appears.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info};

/// Receiver of display operations. Implementations must not block.
pub trait DisplaySink: Send + Sync {
    fn set_text(&self, source: &str, text: &str);
    fn set_visibility(&self, source: &str, visible: bool);
}

/// A display operation in transit
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisplayCommand {
    SetText { source: String, text: String },
    SetVisibility { source: String, visible: bool },
}

/// Forwards operations over a channel to an async consumer
#[derive(Debug, Clone)]
pub struct ChannelDisplay {
    tx: mpsc::UnboundedSender<DisplayCommand>,
}

impl ChannelDisplay {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<DisplayCommand>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl DisplaySink for ChannelDisplay {
    fn set_text(&self, source: &str, text: &str) {
        let _ = self.tx.send(DisplayCommand::SetText {
            source: source.to_string(),
            text: text.to_string(),
        });
    }

    fn set_visibility(&self, source: &str, visible: bool) {
        let _ = self.tx.send(DisplayCommand::SetVisibility {
            source: source.to_string(),
            visible,
        });
    }
}

/// Logs operations only
#[derive(Debug, Clone, Copy, Default)]
pub struct LogDisplay;

impl DisplaySink for LogDisplay {
    fn set_text(&self, source: &str, text: &str) {
        info!("[{}] {}", source, text);
    }

    fn set_visibility(&self, source: &str, visible: bool) {
        debug!("[{}] visible={}", source, visible);
    }
}

/// Configured text/image sources plus the current visibility
pub struct Display {
    sink: Arc<dyn DisplaySink>,
    text_source: String,
    image_source: String,
    visible: bool,
}

impl Display {
    pub fn new(sink: Arc<dyn DisplaySink>) -> Self {
        Self {
            sink,
            text_source: String::new(),
            image_source: String::new(),
            visible: false,
        }
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    fn has_sources(&self) -> bool {
        !self.text_source.is_empty() || !self.image_source.is_empty()
    }

    /// Point at new source names. Sources that changed are hidden first.
    pub fn retarget(&mut self, text_source: &str, image_source: &str) {
        let mut changed = false;

        if self.text_source != text_source {
            if !self.text_source.is_empty() {
                self.sink.set_visibility(&self.text_source, false);
            }
            self.text_source = text_source.to_string();
            changed = true;
        }
        if self.image_source != image_source {
            if !self.image_source.is_empty() {
                self.sink.set_visibility(&self.image_source, false);
            }
            self.image_source = image_source.to_string();
            changed = true;
        }

        if changed {
            self.visible = false;
        }
    }

    /// Put `text` on the text source and reveal both sources.
    pub fn show(&mut self, text: &str) {
        if !self.text_source.is_empty() {
            self.sink.set_text(&self.text_source, text);
        }
        if self.has_sources() {
            self.set_visibility(true);
        }
    }

    pub fn hide(&mut self) {
        self.set_visibility(false);
    }

    fn set_visibility(&mut self, visible: bool) {
        if !self.text_source.is_empty() {
            self.sink.set_visibility(&self.text_source, visible);
        }
        if !self.image_source.is_empty() {
            self.sink.set_visibility(&self.image_source, visible);
        }
        self.visible = visible && self.has_sources();
    }
}
