//! Trigger detection
//!
//! Pure decision logic: given a surface's text, the caret offset and the
//! replacement table, decide whether the character just typed completes a
//! `<keyword><trigger>` sequence. Offsets are in characters, not bytes.

use tracing::debug;

use crate::table::ReplacementTable;

/// Characters whose appearance after a keyword fires a replacement.
///
/// U+00A0 is included because rich editors commonly insert a no-break
/// space for a typed trailing space.
pub const TRIGGER_CHARS: &[char] = &[' ', '\u{a0}', '.', ',', ';', '!', '?'];

pub fn is_trigger_char(c: char) -> bool {
    TRIGGER_CHARS.contains(&c)
}

/// Whether a keydown `key` value names a trigger key
pub fn is_trigger_key(key: &str) -> bool {
    let mut chars = key.chars();
    matches!((chars.next(), chars.next()), (Some(c), None) if is_trigger_char(c))
}

/// A detected, not yet applied, replacement
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerMatch {
    pub keyword: String,
    pub replacement: String,
    pub trigger: char,
    /// Char offset where the keyword starts
    pub keyword_start: usize,
    /// Char offset of the caret, just after the trigger
    pub cursor: usize,
}

impl TriggerMatch {
    /// The span being replaced: keyword followed by the trigger
    pub fn needle(&self) -> String {
        let mut s = String::with_capacity(self.keyword.len() + self.trigger.len_utf8());
        s.push_str(&self.keyword);
        s.push(self.trigger);
        s
    }

    /// What the span becomes: replacement followed by the same trigger
    pub fn insertion(&self) -> String {
        let mut s = String::with_capacity(self.replacement.len() + self.trigger.len_utf8());
        s.push_str(&self.replacement);
        s.push(self.trigger);
        s
    }
}

/// Decide whether a replacement should fire.
///
/// `cursor` is the caret as a char offset; `None` means it couldn't be
/// determined and the end of the text is used.
pub fn detect(text: &str, cursor: Option<usize>, table: &ReplacementTable) -> Option<TriggerMatch> {
    if text.is_empty() || table.is_empty() {
        return None;
    }

    let len = text.chars().count();
    let cursor = cursor.unwrap_or(len).min(len);
    if cursor == 0 {
        return None;
    }

    let before_cursor: String = text.chars().take(cursor).collect();
    let trigger = before_cursor.chars().next_back()?;
    if !is_trigger_char(trigger) {
        return None;
    }
    let before_trigger = &before_cursor[..before_cursor.len() - trigger.len_utf8()];

    let (keyword, replacement) = table.longest_suffix_match(before_trigger)?;

    // Already replaced: don't loop on a replacement that ends like a keyword
    if before_trigger.ends_with(replacement) {
        debug!(keyword = %keyword, "Text already ends with replacement, skipping");
        return None;
    }

    Some(TriggerMatch {
        keyword: keyword.to_string(),
        replacement: replacement.to_string(),
        trigger,
        keyword_start: cursor - 1 - keyword.chars().count(),
        cursor,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> ReplacementTable {
        ReplacementTable::from_map([
            ("br", "bridge"),
            ("bridge", "construction"),
            ("sig", "Best regards, sig"),
            ("addr", "123 Main St"),
        ])
    }

    #[test]
    fn test_every_trigger_char_fires() {
        for trigger in [' ', '.', ',', ';', '!', '?', '\u{a0}'] {
            let text = format!("my addr{trigger}");
            let m = detect(&text, None, &table()).unwrap();
            assert_eq!(m.keyword, "addr");
            assert_eq!(m.trigger, trigger);
            assert_eq!(m.keyword_start, 3);
            assert_eq!(m.cursor, 8);
        }
    }

    #[test]
    fn test_non_trigger_char_does_not_fire() {
        assert_eq!(detect("addr", None, &table()), None);
        assert_eq!(detect("addr:", None, &table()), None);
        assert_eq!(detect("addr\n", None, &table()), None);
    }

    #[test]
    fn test_longest_match_wins() {
        let m = detect("bridge ", None, &table()).unwrap();
        assert_eq!(m.keyword, "bridge");
        assert_eq!(m.replacement, "construction");
        assert_eq!(m.keyword_start, 0);
    }

    #[test]
    fn test_no_keyword_no_match() {
        assert_eq!(detect("hello world ", None, &table()), None);
    }

    #[test]
    fn test_idempotence_guard_skips_existing_replacement() {
        // The replacement itself ends with the keyword "sig"
        assert_eq!(detect("Best regards, sig ", None, &table()), None);
        assert!(detect("sig ", None, &table()).is_some());
    }

    #[test]
    fn test_uses_cursor_not_end_of_text() {
        // Caret sits right after "addr " in the middle of the text
        let m = detect("addr rest of line", Some(5), &table()).unwrap();
        assert_eq!(m.keyword, "addr");
        assert_eq!(m.cursor, 5);

        assert_eq!(detect("addr rest of line", Some(3), &table()), None);
    }

    #[test]
    fn test_cursor_beyond_text_is_clamped() {
        let m = detect("addr.", Some(99), &table()).unwrap();
        assert_eq!(m.cursor, 5);
    }

    #[test]
    fn test_multibyte_offsets_are_in_chars() {
        let table = ReplacementTable::from_map([("ñu", "gnu")]);
        let m = detect("café ñu ", None, &table).unwrap();
        assert_eq!(m.keyword_start, 5);
        assert_eq!(m.cursor, 8);
        assert_eq!(m.needle(), "ñu ");
        assert_eq!(m.insertion(), "gnu ");
    }

    #[test]
    fn test_empty_inputs() {
        assert_eq!(detect("", None, &table()), None);
        assert_eq!(detect("addr ", Some(0), &table()), None);
        assert_eq!(detect("addr ", None, &ReplacementTable::new()), None);
    }

    #[test]
    fn test_is_trigger_key() {
        assert!(is_trigger_key(" "));
        assert!(is_trigger_key("?"));
        assert!(!is_trigger_key("Enter"));
        assert!(!is_trigger_key("a"));
        assert!(!is_trigger_key(""));
    }
}
