//! Turns parsed chat events into queued utterances
//!
//! Applies trigger-word gating, greeting rules, per-user cooldowns,
//! sanitization, truncation and pitch assignment, then enqueues.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::config::{ChatConfig, NAME_PLACEHOLDER};
use crate::parser::ChatEvent;
use crate::pitch::pitch;
use crate::queue::{QueueProducer, QueuedMessage};
use crate::rate_limit::Cooldowns;
use crate::sanitize::{sanitize, truncate};
use crate::stats::PipelineStats;

/// Producer stage owned by one connection worker
#[derive(Clone)]
pub struct ChatIntake {
    config: Arc<ChatConfig>,
    cooldowns: Arc<Mutex<Cooldowns>>,
    queue: QueueProducer,
    stats: Arc<PipelineStats>,
}

impl ChatIntake {
    pub fn new(
        config: Arc<ChatConfig>,
        cooldowns: Arc<Mutex<Cooldowns>>,
        queue: QueueProducer,
        stats: Arc<PipelineStats>,
    ) -> Self {
        Self {
            config,
            cooldowns,
            queue,
            stats,
        }
    }

    pub fn config(&self) -> &ChatConfig {
        &self.config
    }

    /// Handle a join or chat event. Returns true when something was queued.
    pub fn handle(&self, event: ChatEvent) -> bool {
        match event {
            ChatEvent::Ping => false,
            ChatEvent::Join { username } => self.handle_join(&username),
            ChatEvent::Chat { username, text } => self.handle_chat(&username, &text),
        }
    }

    fn handle_chat(&self, username: &str, text: &str) -> bool {
        let text = text.trim();
        if text.is_empty() {
            return false;
        }

        let text = match strip_trigger(text, &self.config.trigger_word) {
            Some(text) => text,
            None => return false,
        };

        let message = sanitize(text);
        if message.is_empty() {
            return false;
        }

        let user = sanitize(username);
        let user_key = username.to_lowercase();

        if !user_key.is_empty() && self.cooldowns.lock().trigger.is_on_cooldown(&user_key) {
            debug!("{} is on cooldown, skipping message", user_key);
            return false;
        }

        let speak_text = if self.config.include_username && !user.is_empty() {
            format!("{} says: {}", user, message)
        } else {
            message.clone()
        };

        let display_text = if user.is_empty() {
            message
        } else {
            format!("{}: {}", user, message)
        };

        let queued = QueuedMessage {
            speak_text: truncate(&speak_text, self.config.max_tts_length),
            pitch: pitch(username, self.config.pitch),
            display_text: truncate(&display_text, self.config.max_tts_length),
        };

        if !self.enqueue(queued) {
            return false;
        }

        if !user_key.is_empty() {
            self.cooldowns.lock().trigger.record(&user_key);
        }
        true
    }

    fn handle_join(&self, username: &str) -> bool {
        if !self.config.greet_users {
            return false;
        }

        let user_key = username.trim().to_lowercase();
        if user_key.is_empty() {
            return false;
        }

        if user_key == self.config.nickname.to_lowercase() {
            return false;
        }

        if self.cooldowns.lock().greet.is_on_cooldown(&user_key) {
            debug!("{} was greeted recently", user_key);
            return false;
        }

        let user = sanitize(username);
        if user.is_empty() {
            return false;
        }

        let greeting = sanitize(&self.config.greet_message.replace(NAME_PLACEHOLDER, &user));
        if greeting.is_empty() {
            return false;
        }

        let text = truncate(&greeting, self.config.max_tts_length);
        let queued = QueuedMessage {
            speak_text: text.clone(),
            pitch: pitch(username, self.config.pitch),
            display_text: text,
        };

        if !self.enqueue(queued) {
            return false;
        }

        self.cooldowns.lock().greet.record(&user_key);
        true
    }

    fn enqueue(&self, message: QueuedMessage) -> bool {
        if self.queue.try_enqueue(message) {
            self.stats.message_queued();
            true
        } else {
            self.stats.message_dropped();
            false
        }
    }
}

/// With a trigger configured, the message must start with it (case
/// insensitive) followed by whitespace. Returns the remainder, or None when
/// the message does not qualify.
fn strip_trigger<'a>(text: &'a str, trigger: &str) -> Option<&'a str> {
    if trigger.is_empty() {
        return Some(text);
    }

    let trigger_chars = trigger.chars().count();
    let split = text
        .char_indices()
        .nth(trigger_chars)
        .map(|(idx, _)| idx)
        .unwrap_or(text.len());
    let (head, rest) = text.split_at(split);

    if head.to_lowercase() != trigger.to_lowercase() {
        return None;
    }
    if !rest.starts_with(char::is_whitespace) {
        return None;
    }

    let rest = rest.trim_start();
    if rest.is_empty() {
        None
    } else {
        Some(rest)
    }
}
