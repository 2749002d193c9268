//! Chat protocol line parser
//!
//! Recognizes the three line shapes the bridge cares about: keep-alive
//! pings, channel join notifications and channel messages. Everything else
//! is ignored.

/// One parsed protocol line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatEvent {
    /// Keep-alive ping, must be answered on the same connection
    Ping,
    /// A user joined the channel
    Join { username: String },
    /// A user sent a channel message
    Chat { username: String, text: String },
}

const PING_MARKER: &str = "PING";
const PRIVMSG_SEPARATOR: &str = " PRIVMSG ";

/// Parse a single line (without its CRLF terminator).
pub fn parse_line(line: &str) -> Option<ChatEvent> {
    if line.is_empty() {
        return None;
    }

    if line.starts_with(PING_MARKER) {
        return Some(ChatEvent::Ping);
    }

    if command_of(line) == Some("JOIN") {
        let (prefix, _) = line.split_once(' ')?;
        let username = username_from_prefix(prefix);
        if username.trim().is_empty() {
            return None;
        }
        return Some(ChatEvent::Join {
            username: username.to_string(),
        });
    }

    let (prefix, trailing) = line.split_once(PRIVMSG_SEPARATOR)?;
    if trailing.is_empty() {
        return None;
    }

    // "#channel :text" -> "text"; a missing colon keeps the whole remainder
    let text = trailing
        .split_once(':')
        .map(|(_, text)| text)
        .unwrap_or(trailing);

    Some(ChatEvent::Chat {
        username: username_from_prefix(prefix).to_string(),
        text: text.to_string(),
    })
}

/// Command token of a prefixed line (":nick!user@host COMMAND ...")
fn command_of(line: &str) -> Option<&str> {
    if !line.starts_with(':') {
        return line.split(' ').next();
    }
    line.split(' ').nth(1)
}

/// "nick" from ":nick!user@host"
fn username_from_prefix(prefix: &str) -> &str {
    let nick = prefix.split('!').next().unwrap_or_default();
    nick.strip_prefix(':').unwrap_or(nick)
}
