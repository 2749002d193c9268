//! User-facing chat settings and their normalized snapshot

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::pitch::PitchRange;

pub const DEFAULT_NICKNAME: &str = "justinfan12345";
pub const DEFAULT_CHANNEL: &str = "#your_channel";
pub const DEFAULT_GREET_MESSAGE: &str = "Welcome {name}";
pub const DEFAULT_SPEECH_RATE: u32 = 150;
pub const DEFAULT_SPEAK_INTERVAL_S: f64 = 2.0;
pub const MIN_SPEAK_INTERVAL_S: f64 = 0.5;
pub const DEFAULT_MAX_TTS_LENGTH: usize = 280;
pub const DEFAULT_PITCH_MIN: i64 = 25;
pub const DEFAULT_PITCH_MAX: i64 = 99;

/// Placeholder in the greet template replaced by the joining user's name
pub const NAME_PLACEHOLDER: &str = "{name}";

/// Flat configuration surface as the user edits it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatSettings {
    /// Master switch for the reader
    pub enabled: bool,

    /// Channel to join ("#name"; the "#" is added when missing)
    pub channel: String,

    /// Login nickname (anonymous "justinfan" logins need no credential)
    pub nickname: String,

    /// Optional prefix a message must start with to be spoken
    pub trigger_word: String,

    /// Optional OAuth token
    pub oauth_token: String,

    /// Synthesis speaking rate (words per minute)
    pub speech_rate: u32,

    /// Minimum seconds between utterance starts
    pub speak_interval: f64,

    /// Seconds before the same user may trigger speech again
    pub per_user_timeout: f64,

    /// Speak a greeting when a user joins
    pub greet_users: bool,

    /// Greeting template, "{name}" is replaced by the user name
    pub greet_message: String,

    /// Minutes before the same user is greeted again
    pub greet_timeout_minutes: f64,

    /// Prefix spoken chat with "<user> says:"
    pub include_username: bool,

    /// Maximum characters for both spoken and displayed text
    pub max_tts_length: usize,

    pub pitch_min: i64,
    pub pitch_max: i64,

    /// Overlay text element updated with each message
    pub text_source_name: String,

    /// Overlay image element shown while speaking
    pub image_source_name: String,
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            channel: DEFAULT_CHANNEL.to_string(),
            nickname: DEFAULT_NICKNAME.to_string(),
            trigger_word: String::new(),
            oauth_token: String::new(),
            speech_rate: DEFAULT_SPEECH_RATE,
            speak_interval: DEFAULT_SPEAK_INTERVAL_S,
            per_user_timeout: 0.5,
            greet_users: false,
            greet_message: DEFAULT_GREET_MESSAGE.to_string(),
            greet_timeout_minutes: 10.0,
            include_username: false,
            max_tts_length: DEFAULT_MAX_TTS_LENGTH,
            pitch_min: DEFAULT_PITCH_MIN,
            pitch_max: DEFAULT_PITCH_MAX,
            text_source_name: String::new(),
            image_source_name: String::new(),
        }
    }
}

impl ChatSettings {
    /// Validate and normalize into an immutable snapshot.
    pub fn normalize(&self) -> ChatConfig {
        let nickname = match self.nickname.trim() {
            "" => DEFAULT_NICKNAME.to_string(),
            nick => nick.to_string(),
        };

        let mut channel = self.channel.trim().to_string();
        if !channel.is_empty() && !channel.starts_with('#') {
            channel.insert(0, '#');
        }

        let greet_message = match self.greet_message.trim() {
            "" => DEFAULT_GREET_MESSAGE.to_string(),
            message => message.to_string(),
        };

        let speak_interval = if self.speak_interval > 0.0 {
            seconds(self.speak_interval).max(Duration::from_secs_f64(MIN_SPEAK_INTERVAL_S))
        } else {
            seconds(DEFAULT_SPEAK_INTERVAL_S)
        };

        ChatConfig {
            enabled: self.enabled,
            channel,
            nickname,
            trigger_word: self.trigger_word.trim().to_string(),
            oauth_token: self.oauth_token.trim().to_string(),
            speech_rate: if self.speech_rate == 0 {
                DEFAULT_SPEECH_RATE
            } else {
                self.speech_rate
            },
            speak_interval,
            per_user_timeout: seconds(self.per_user_timeout),
            greet_users: self.greet_users,
            greet_message,
            greet_timeout: seconds(self.greet_timeout_minutes * 60.0),
            include_username: self.include_username,
            max_tts_length: if self.max_tts_length == 0 {
                DEFAULT_MAX_TTS_LENGTH
            } else {
                self.max_tts_length
            },
            pitch: PitchRange::new(self.pitch_min, self.pitch_max),
            text_source_name: self.text_source_name.trim().to_string(),
            image_source_name: self.image_source_name.trim().to_string(),
        }
    }
}

/// Negative and NaN values collapse to zero; infinity and overflow saturate.
fn seconds(value: f64) -> Duration {
    if value.is_nan() || value <= 0.0 {
        Duration::ZERO
    } else {
        Duration::try_from_secs_f64(value).unwrap_or(Duration::MAX)
    }
}

/// Immutable, normalized configuration snapshot
///
/// Two snapshots are compared structurally to decide whether the
/// connection must be restarted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatConfig {
    pub enabled: bool,
    pub channel: String,
    pub nickname: String,
    pub trigger_word: String,
    pub oauth_token: String,
    pub speech_rate: u32,
    pub speak_interval: Duration,
    pub per_user_timeout: Duration,
    pub greet_users: bool,
    pub greet_message: String,
    pub greet_timeout: Duration,
    pub include_username: bool,
    pub max_tts_length: usize,
    pub pitch: PitchRange,
    pub text_source_name: String,
    pub image_source_name: String,
}

impl Default for ChatConfig {
    fn default() -> Self {
        ChatSettings::default().normalize()
    }
}

impl ChatConfig {
    /// The channel is the one field the connection cannot do without.
    pub fn has_channel(&self) -> bool {
        !self.channel.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ChatConfig::default();
        assert!(!config.enabled);
        assert_eq!(config.nickname, "justinfan12345");
        assert_eq!(config.speak_interval, Duration::from_secs(2));
        assert_eq!(config.per_user_timeout, Duration::from_millis(500));
        assert_eq!(config.greet_timeout, Duration::from_secs(600));
        assert_eq!(config.pitch, PitchRange::new(25, 99));
    }

    #[test]
    fn test_channel_gets_sigil() {
        let settings = ChatSettings {
            channel: "  somestreamer ".to_string(),
            ..Default::default()
        };
        assert_eq!(settings.normalize().channel, "#somestreamer");

        let settings = ChatSettings {
            channel: "#already".to_string(),
            ..Default::default()
        };
        assert_eq!(settings.normalize().channel, "#already");

        let settings = ChatSettings {
            channel: "   ".to_string(),
            ..Default::default()
        };
        assert!(!settings.normalize().has_channel());
    }

    #[test]
    fn test_numeric_normalization() {
        let settings = ChatSettings {
            nickname: " ".to_string(),
            speech_rate: 0,
            speak_interval: 0.1,
            per_user_timeout: -3.0,
            greet_timeout_minutes: f64::NAN,
            max_tts_length: 0,
            pitch_min: -20,
            pitch_max: -40,
            greet_message: "".to_string(),
            ..Default::default()
        };
        let config = settings.normalize();
        assert_eq!(config.nickname, DEFAULT_NICKNAME);
        assert_eq!(config.speech_rate, 150);
        assert_eq!(config.speak_interval, Duration::from_millis(500));
        assert_eq!(config.per_user_timeout, Duration::ZERO);
        assert_eq!(config.greet_timeout, Duration::ZERO);
        assert_eq!(config.max_tts_length, 280);
        assert_eq!(config.pitch, PitchRange::new(0, 0));
        assert_eq!(config.greet_message, DEFAULT_GREET_MESSAGE);
    }

    #[test]
    fn test_huge_durations_saturate() {
        let settings = ChatSettings {
            speak_interval: f64::INFINITY,
            per_user_timeout: f64::INFINITY,
            greet_timeout_minutes: 1e308,
            ..Default::default()
        };
        let config = settings.normalize();
        assert_eq!(config.speak_interval, Duration::MAX);
        assert_eq!(config.per_user_timeout, Duration::MAX);
        assert_eq!(config.greet_timeout, Duration::MAX);

        let settings = ChatSettings {
            speak_interval: f64::NAN,
            ..Default::default()
        };
        assert_eq!(settings.normalize().speak_interval, Duration::from_secs(2));
    }

    #[test]
    fn test_zero_interval_uses_default() {
        let settings = ChatSettings {
            speak_interval: 0.0,
            ..Default::default()
        };
        assert_eq!(settings.normalize().speak_interval, Duration::from_secs(2));
    }

    #[test]
    fn test_structural_equality() {
        let a = ChatSettings::default().normalize();
        let b = ChatSettings::default().normalize();
        assert_eq!(a, b);

        let c = ChatSettings {
            trigger_word: "!say".to_string(),
            ..Default::default()
        }
        .normalize();
        assert_ne!(a, c);
    }
}
