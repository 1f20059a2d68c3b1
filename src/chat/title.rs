//! Conversation title generation

/// Produces a conversation title from its first user message
///
/// Called on a background thread; implementations may block (a model-backed
/// generator would).
pub trait TitleGenerator: Send + Sync {
    /// Returns an empty string when no title can be derived
    fn generate(&self, first_message: &str) -> String;
}

/// Title from the first line of the message, truncated to `max_chars`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeuristicTitles {
    pub max_chars: usize,
}

impl HeuristicTitles {
    pub fn new(max_chars: usize) -> Self {
        Self {
            max_chars: max_chars.max(1),
        }
    }
}

impl Default for HeuristicTitles {
    fn default() -> Self {
        Self::new(crate::config::defaults::DEFAULT_TITLE_MAX_CHARS)
    }
}

impl TitleGenerator for HeuristicTitles {
    fn generate(&self, first_message: &str) -> String {
        let trimmed = first_message.trim();
        let Some(first_line) = trimmed.lines().map(str::trim).find(|l| !l.is_empty()) else {
            return String::new();
        };

        let truncated: String = first_line.chars().take(self.max_chars).collect();
        if truncated.len() < first_line.len() {
            format!("{}...", truncated.trim_end())
        } else {
            truncated
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_message_is_title() {
        assert_eq!(HeuristicTitles::default().generate("  Hello  "), "Hello");
    }

    #[test]
    fn test_uses_first_line() {
        assert_eq!(
            HeuristicTitles::default().generate("Fix my build\n\nHere is the log..."),
            "Fix my build"
        );
    }

    #[test]
    fn test_long_line_is_truncated() {
        let titles = HeuristicTitles::new(10);
        assert_eq!(titles.generate("abcdefghij klmnop"), "abcdefghij...");
        assert_eq!(titles.generate("abcd fghi jklm"), "abcd fghi...");
    }

    #[test]
    fn test_blank_message_has_no_title() {
        assert_eq!(HeuristicTitles::default().generate(" \n\t "), "");
    }

    #[test]
    fn test_truncation_respects_char_boundaries() {
        let title = HeuristicTitles::new(3).generate("héllo wörld");
        assert_eq!(title, "hél...");
    }
}
