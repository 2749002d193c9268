//! Text sanitization for speech and display

const ELLIPSIS: &str = "...";

/// Replace non-printable-ASCII characters with spaces, collapse whitespace
/// runs and trim.
pub fn sanitize(text: &str) -> String {
    let filtered: String = text
        .chars()
        .map(|ch| if (' '..='~').contains(&ch) { ch } else { ' ' })
        .collect();

    filtered.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Cut `text` to `max_len` characters, replacing the tail with "..." when
/// anything was removed.
pub fn truncate(text: &str, max_len: usize) -> String {
    if text.chars().count() <= max_len {
        return text.to_string();
    }

    let keep = max_len.saturating_sub(ELLIPSIS.len());
    let mut out: String = text.chars().take(keep).collect();
    out.push_str(ELLIPSIS);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_strips_control_and_unicode() {
        assert_eq!(sanitize("hi\tthere\x07friend"), "hi there friend");
        assert_eq!(sanitize("caf\u{e9} \u{1F600} ok"), "caf ok");
    }

    #[test]
    fn test_sanitize_collapses_whitespace() {
        assert_eq!(sanitize("   lots    of\r\n space  "), "lots of space");
        assert_eq!(sanitize("\u{200b}\u{200b}"), "");
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("exactly10!", 10), "exactly10!");
        assert_eq!(truncate("this is too long", 10), "this is...");
        assert_eq!(truncate("this is too long", 10).len(), 10);
    }

    #[test]
    fn test_truncate_tiny_budget() {
        assert_eq!(truncate("abcdef", 2), "...");
    }
}
