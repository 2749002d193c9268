use serde::{Deserialize, Serialize};

/// Event types broadcast to overlay clients
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type")]
pub enum DisplayEvent {
    /// New text for a named text source
    #[serde(rename = "text")]
    Text {
        source: String,
        text: String,
        timestamp: String, // HH:MM:SS format
    },

    /// Show or hide a named source wherever it appears
    #[serde(rename = "visibility")]
    Visibility {
        source: String,
        visible: bool,
        timestamp: f64,
    },

    /// Chat connection state changed
    #[serde(rename = "connection_state")]
    ConnectionState {
        state: String,
        timestamp: f64,
    },
}

impl DisplayEvent {
    /// Convert event to JSON string with newline
    pub fn to_json_line(&self) -> Result<String, serde_json::Error> {
        let json = serde_json::to_string(self)?;
        Ok(format!("{}\n", json))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_serialization() {
        let event = DisplayEvent::Text {
            source: "ChatText".to_string(),
            text: "alice: hello".to_string(),
            timestamp: "14:23:15".to_string(),
        };
        let json = event.to_json_line().unwrap();
        assert!(json.contains("\"type\":\"text\""));
        assert!(json.contains("\"source\":\"ChatText\""));
        assert!(json.contains("\"text\":\"alice: hello\""));
        assert!(json.ends_with('\n'));
    }

    #[test]
    fn test_visibility_serialization() {
        let event = DisplayEvent::Visibility {
            source: "Avatar".to_string(),
            visible: true,
            timestamp: 1699000000.0,
        };
        let json = event.to_json_line().unwrap();
        assert!(json.contains("\"type\":\"visibility\""));
        assert!(json.contains("\"visible\":true"));
    }

    #[test]
    fn test_parses_back() {
        let line = r#"{"type":"connection_state","state":"listening","timestamp":1.5}"#;
        let event: DisplayEvent = serde_json::from_str(line).unwrap();
        assert_eq!(
            event,
            DisplayEvent::ConnectionState {
                state: "listening".to_string(),
                timestamp: 1.5
            }
        );
    }
}
