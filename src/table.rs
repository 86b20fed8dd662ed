//! Replacement table - immutable keyword → replacement mapping
//!
//! A table is never mutated once built. Every change (add, edit, delete,
//! import) produces a new table, and holders swap their `Arc` wholesale so a
//! keystroke being processed never observes a half-applied update.
//!
//! Keywords are kept pre-sorted longest-first, which makes the longest
//! suffix match a single ordered scan.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::error::{ReplacerError, Result};

/// Maximum keyword length, in characters
pub const MAX_KEYWORD_LENGTH: usize = 100;

/// Maximum replacement length, in characters
pub const MAX_REPLACEMENT_LENGTH: usize = 10_000;

/// Characters a keyword may not contain
pub const INVALID_KEYWORD_CHARS: &[char] = &['<', '>', '"', '?', '*'];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Keyword cannot be empty")]
    EmptyKeyword,
    #[error("Keyword cannot be longer than 100 characters")]
    KeywordTooLong,
    #[error("Keyword contains invalid characters")]
    KeywordInvalidChars,
    #[error("Keyword cannot contain spaces")]
    KeywordWhitespace,
    #[error("Replacement cannot be empty")]
    EmptyReplacement,
    #[error("Replacement cannot be longer than 10000 characters")]
    ReplacementTooLong,
    #[error("Replacement must be a string")]
    ReplacementNotText,
    #[error("A replacement with keyword '{0}' already exists")]
    DuplicateKeyword(String),
}

pub fn validate_keyword(keyword: &str) -> std::result::Result<(), ValidationError> {
    if keyword.trim().is_empty() {
        return Err(ValidationError::EmptyKeyword);
    }
    if keyword.chars().count() > MAX_KEYWORD_LENGTH {
        return Err(ValidationError::KeywordTooLong);
    }
    if keyword.contains(INVALID_KEYWORD_CHARS) {
        return Err(ValidationError::KeywordInvalidChars);
    }
    if keyword.chars().any(char::is_whitespace) {
        return Err(ValidationError::KeywordWhitespace);
    }
    Ok(())
}

pub fn validate_replacement(replacement: &str) -> std::result::Result<(), ValidationError> {
    if replacement.trim().is_empty() {
        return Err(ValidationError::EmptyReplacement);
    }
    if replacement.chars().count() > MAX_REPLACEMENT_LENGTH {
        return Err(ValidationError::ReplacementTooLong);
    }
    Ok(())
}

/// Immutable keyword → replacement mapping
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplacementTable {
    entries: HashMap<String, String>,
    /// Keywords, longest first; ties ordered lexically for determinism
    by_length: Vec<String>,
}

impl ReplacementTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a table from a plain map, dropping entries that fail validation.
    pub fn from_map<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut valid = HashMap::new();
        for (keyword, replacement) in entries {
            let keyword = keyword.into();
            let replacement = replacement.into();
            let checked = validate_keyword(&keyword).and_then(|_| validate_replacement(&replacement));
            match checked {
                Ok(()) => {
                    valid.insert(keyword, replacement);
                }
                Err(e) => {
                    warn!(keyword = %keyword, error = %e, "Dropping invalid replacement entry");
                }
            }
        }
        Self::from_valid(valid)
    }

    fn from_valid(entries: HashMap<String, String>) -> Self {
        let mut by_length: Vec<String> = entries.keys().cloned().collect();
        by_length.sort_by(|a, b| {
            b.chars()
                .count()
                .cmp(&a.chars().count())
                .then_with(|| a.cmp(b))
        });
        Self { entries, by_length }
    }

    pub fn get(&self, keyword: &str) -> Option<&str> {
        self.entries.get(keyword).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries, longest keyword first
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.by_length
            .iter()
            .filter_map(|k| self.entries.get(k).map(|v| (k.as_str(), v.as_str())))
    }

    /// Plain, ordered copy of the mapping, used for persistence and the bridge
    pub fn to_plain(&self) -> BTreeMap<String, String> {
        self.entries
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// The longest keyword that `text` ends with, and its replacement
    pub fn longest_suffix_match(&self, text: &str) -> Option<(&str, &str)> {
        self.iter().find(|(keyword, _)| text.ends_with(keyword))
    }

    /// New table with `keyword` added or overwritten (last write wins)
    pub fn with_entry(&self, keyword: &str, replacement: &str) -> Result<Self> {
        validate_keyword(keyword)?;
        validate_replacement(replacement)?;
        let mut entries = self.entries.clone();
        entries.insert(keyword.to_string(), replacement.to_string());
        Ok(Self::from_valid(entries))
    }

    /// New table with `old` renamed to `new` and its replacement updated.
    ///
    /// Fails if `new` already names a different entry.
    pub fn with_renamed(&self, old: &str, new: &str, replacement: &str) -> Result<Self> {
        validate_keyword(new)?;
        validate_replacement(replacement)?;
        if old != new && self.entries.contains_key(new) {
            return Err(ValidationError::DuplicateKeyword(new.to_string()).into());
        }
        let mut entries = self.entries.clone();
        entries.remove(old);
        entries.insert(new.to_string(), replacement.to_string());
        Ok(Self::from_valid(entries))
    }

    /// New table without `keyword`
    pub fn without(&self, keyword: &str) -> Self {
        let mut entries = self.entries.clone();
        entries.remove(keyword);
        Self::from_valid(entries)
    }
}

// ============================================================================
// Import / export
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
struct TableDocument {
    replacements: BTreeMap<String, serde_json::Value>,
}

/// Outcome of an import: how many entries were merged and which were skipped
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportReport {
    pub imported: usize,
    pub skipped: Vec<(String, ValidationError)>,
}

/// Merge a `{"replacements": {...}}` JSON document over `existing`.
///
/// Invalid entries (including non-string replacements) are skipped and
/// reported; a document without a `replacements` object is rejected.
pub fn import_json(existing: &ReplacementTable, json: &str) -> Result<(ReplacementTable, ImportReport)> {
    let value: serde_json::Value = serde_json::from_str(json)?;
    if !value.get("replacements").is_some_and(|r| r.is_object()) {
        return Err(ReplacerError::Import(
            "expected a \"replacements\" object".to_string(),
        ));
    }
    let document: TableDocument = serde_json::from_value(value)?;

    let mut entries = existing.entries.clone();
    let mut report = ImportReport::default();

    for (keyword, replacement) in document.replacements {
        let Some(replacement) = replacement.as_str() else {
            report
                .skipped
                .push((keyword, ValidationError::ReplacementNotText));
            continue;
        };
        let checked = validate_keyword(&keyword).and_then(|_| validate_replacement(replacement));
        match checked {
            Ok(()) => {
                entries.insert(keyword, replacement.to_string());
                report.imported += 1;
            }
            Err(e) => report.skipped.push((keyword, e)),
        }
    }

    debug!(
        imported = report.imported,
        skipped = report.skipped.len(),
        "Imported replacement table"
    );
    Ok((ReplacementTable::from_valid(entries), report))
}

/// Pretty-printed `{"replacements": {...}}` with sorted keys
pub fn export_json(table: &ReplacementTable) -> Result<String> {
    let document = TableDocument {
        replacements: table
            .to_plain()
            .into_iter()
            .map(|(k, v)| (k, serde_json::Value::String(v)))
            .collect(),
    };
    Ok(serde_json::to_string_pretty(&document)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_keyword_rules() {
        assert_eq!(validate_keyword(""), Err(ValidationError::EmptyKeyword));
        assert_eq!(validate_keyword("   "), Err(ValidationError::EmptyKeyword));
        assert_eq!(
            validate_keyword(&"k".repeat(101)),
            Err(ValidationError::KeywordTooLong)
        );
        assert!(validate_keyword(&"k".repeat(100)).is_ok());
        for bad in ["a<b", "a>b", "a\"b", "a?b", "a*b"] {
            assert_eq!(
                validate_keyword(bad),
                Err(ValidationError::KeywordInvalidChars),
                "{bad}"
            );
        }
        assert_eq!(validate_keyword("a b"), Err(ValidationError::KeywordWhitespace));
        assert_eq!(validate_keyword("a\tb"), Err(ValidationError::KeywordWhitespace));
        assert!(validate_keyword(":sig").is_ok());
        assert!(validate_keyword("a|b\\c").is_ok());
    }

    #[test]
    fn test_validate_replacement_rules() {
        assert_eq!(validate_replacement(""), Err(ValidationError::EmptyReplacement));
        assert_eq!(validate_replacement(" \n"), Err(ValidationError::EmptyReplacement));
        assert!(validate_replacement(&"x".repeat(10_000)).is_ok());
        assert_eq!(
            validate_replacement(&"x".repeat(10_001)),
            Err(ValidationError::ReplacementTooLong)
        );
    }

    #[test]
    fn test_from_map_drops_invalid_entries() {
        let table = ReplacementTable::from_map([("ok", "fine"), ("bad key", "x"), ("empty", "")]);
        assert_eq!(table.len(), 1);
        assert_eq!(table.get("ok"), Some("fine"));
    }

    #[test]
    fn test_longest_suffix_match_prefers_longest() {
        let table = ReplacementTable::from_map([("br", "bridge"), ("bridge", "construction")]);
        assert_eq!(
            table.longest_suffix_match("a bridge"),
            Some(("bridge", "construction"))
        );
        assert_eq!(table.longest_suffix_match("abr"), Some(("br", "bridge")));
        assert_eq!(table.longest_suffix_match("hello"), None);
    }

    #[test]
    fn test_with_entry_is_last_write_wins_and_leaves_original() {
        let table = ReplacementTable::from_map([("sig", "Regards")]);
        let updated = table.with_entry("sig", "Cheers").unwrap();
        assert_eq!(table.get("sig"), Some("Regards"));
        assert_eq!(updated.get("sig"), Some("Cheers"));
        assert!(table.with_entry("no good", "x").is_err());
    }

    #[test]
    fn test_with_renamed_rejects_collision() {
        let table = ReplacementTable::from_map([("a", "1"), ("b", "2")]);
        assert!(matches!(
            table.with_renamed("a", "b", "3"),
            Err(ReplacerError::Validation(ValidationError::DuplicateKeyword(_)))
        ));
        let renamed = table.with_renamed("a", "c", "3").unwrap();
        assert_eq!(renamed.get("a"), None);
        assert_eq!(renamed.get("c"), Some("3"));
        assert_eq!(renamed.len(), 2);
    }

    #[test]
    fn test_without_removes_keyword() {
        let table = ReplacementTable::from_map([("a", "1"), ("b", "2")]);
        let trimmed = table.without("a");
        assert_eq!(trimmed.len(), 1);
        assert_eq!(trimmed.longest_suffix_match("xa"), None);
    }

    #[test]
    fn test_import_merges_and_reports_skipped() {
        let existing = ReplacementTable::from_map([("a", "1"), ("b", "2")]);
        let json = r#"{"replacements": {"b": "two", "c": "3", "bad key": "x", "d": 4}}"#;
        let (table, report) = import_json(&existing, json).unwrap();

        assert_eq!(report.imported, 2);
        assert_eq!(report.skipped.len(), 2);
        assert_eq!(table.get("a"), Some("1"));
        assert_eq!(table.get("b"), Some("two"));
        assert_eq!(table.get("c"), Some("3"));
        assert_eq!(table.len(), 3);
    }

    #[test]
    fn test_import_rejects_document_without_replacements() {
        let existing = ReplacementTable::new();
        assert!(matches!(
            import_json(&existing, r#"{"entries": {}}"#),
            Err(ReplacerError::Import(_))
        ));
        assert!(matches!(
            import_json(&existing, r#"{"replacements": "nope"}"#),
            Err(ReplacerError::Import(_))
        ));
        assert!(matches!(
            import_json(&existing, "not json"),
            Err(ReplacerError::Parse(_))
        ));
    }

    #[test]
    fn test_export_is_sorted_and_reimportable() {
        let table = ReplacementTable::from_map([("zz", "last"), ("aa", "first")]);
        let json = export_json(&table).unwrap();
        assert!(json.find("\"aa\"").unwrap() < json.find("\"zz\"").unwrap());

        let (reimported, report) = import_json(&ReplacementTable::new(), &json).unwrap();
        assert_eq!(report.imported, 2);
        assert_eq!(reimported, table);
    }
}
