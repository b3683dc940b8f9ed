//! Text helpers for the selected text.

use crate::error::SpeakError;

const ELLIPSIS: &str = "...";

/// Trim the selection and reject it if nothing is left.
pub fn validate_selection(text: &str) -> Result<&str, SpeakError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(SpeakError::EmptyText);
    }
    Ok(trimmed)
}

/// Number of whitespace-separated words.
pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Truncate `text` to at most `max_chars` characters, adding `"..."` if cut.
///
/// Counts characters, not bytes, so multi-byte text is never split inside a
/// code point. Interior whitespace runs are collapsed to single spaces. The
/// result never exceeds `max_chars`; when that leaves no room for the
/// ellipsis the text is cut without one.
///
/// ```
/// use readaloud_core::preview;
///
/// assert_eq!(preview("Hello world", 50), "Hello world");
/// assert_eq!(preview("Hello world", 8), "Hello...");
/// ```
pub fn preview(text: &str, max_chars: usize) -> String {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.chars().count() <= max_chars {
        return collapsed;
    }
    if max_chars <= ELLIPSIS.len() {
        return collapsed.chars().take(max_chars).collect();
    }
    let mut out: String = collapsed.chars().take(max_chars - ELLIPSIS.len()).collect();
    out.push_str(ELLIPSIS);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_selection_trims() {
        assert_eq!(validate_selection("  Hello world \n").unwrap(), "Hello world");
    }

    #[test]
    fn test_validate_selection_rejects_blank() {
        assert!(matches!(validate_selection(""), Err(SpeakError::EmptyText)));
        assert!(matches!(validate_selection(" \t\n "), Err(SpeakError::EmptyText)));
    }

    #[test]
    fn test_word_count() {
        assert_eq!(word_count("Hello world"), 2);
        assert_eq!(word_count("  one   two\nthree "), 3);
        assert_eq!(word_count(""), 0);
    }

    #[test]
    fn test_preview_short_text_unchanged() {
        assert_eq!(preview("Hello world", 50), "Hello world");
    }

    #[test]
    fn test_preview_truncates_long_text() {
        let text = "a".repeat(80);
        let p = preview(&text, 50);
        assert_eq!(p.chars().count(), 50);
        assert!(p.ends_with("..."));
    }

    #[test]
    fn test_preview_is_char_boundary_safe() {
        let text = "héllo wörld ünïcödé".repeat(5);
        let p = preview(&text, 10);
        assert_eq!(p.chars().count(), 10);
    }

    #[test]
    fn test_preview_never_exceeds_tiny_limits() {
        assert_eq!(preview("Hello world", 0), "");
        assert_eq!(preview("Hello world", 2), "He");
        assert_eq!(preview("Hello world", 3), "Hel");
        assert_eq!(preview("Hello world", 4), "H...");
        assert_eq!(preview("Hi", 2), "Hi");
    }

    #[test]
    fn test_preview_collapses_whitespace() {
        assert_eq!(preview("Hello\n\n   world", 50), "Hello world");
    }
}
