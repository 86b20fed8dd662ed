//! Persistent settings
//!
//! `settings.json` in the per-user config dir holds the replacement table
//! and both enable toggles:
//!
//! ```json
//! {
//!   "replacements": { "brb": "be right back" },
//!   "textReplacementEnabled": true,
//!   "enabled": true
//! }
//! ```
//!
//! Writes are atomic (temp file + rename). [`SettingsWatcher`] reports
//! external edits so a running engine can reload.

mod watcher;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::config::{DEFAULT_EXTENSION_ENABLED, DEFAULT_FEATURE_ENABLED};
use crate::table::{export_json, import_json, ImportReport, ReplacementTable};

pub use watcher::{SettingsReloadEvent, SettingsWatcher};

const SETTINGS_FILE_NAME: &str = "settings.json";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    #[serde(default)]
    pub replacements: BTreeMap<String, String>,
    /// Feature switch; unset means off
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_replacement_enabled: Option<bool>,
    /// Global extension switch; unset means on
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
}

impl Settings {
    pub fn feature_enabled(&self) -> bool {
        self.text_replacement_enabled
            .unwrap_or(DEFAULT_FEATURE_ENABLED)
    }

    pub fn extension_enabled(&self) -> bool {
        self.enabled.unwrap_or(DEFAULT_EXTENSION_ENABLED)
    }

    /// Both switches on
    pub fn engine_enabled(&self) -> bool {
        self.feature_enabled() && self.extension_enabled()
    }

    /// Validated table; invalid stored entries are dropped
    pub fn table(&self) -> ReplacementTable {
        ReplacementTable::from_map(self.replacements.clone())
    }
}

pub struct SettingsStore {
    path: PathBuf,
}

impl SettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `<config dir>/text-replacer/settings.json`
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join("text-replacer")
            .join(SETTINGS_FILE_NAME)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read settings; a missing file yields defaults
    #[instrument(name = "settings_load", skip(self), fields(path = %self.path.display()))]
    pub fn load(&self) -> Result<Settings> {
        if !self.path.exists() {
            info!("Settings file not found, using defaults");
            return Ok(Settings::default());
        }
        let content = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read settings file: {}", self.path.display()))?;
        let settings: Settings =
            serde_json::from_str(&content).context("Failed to parse settings JSON")?;
        info!(
            replacement_count = settings.replacements.len(),
            enabled = settings.engine_enabled(),
            "Loaded settings"
        );
        Ok(settings)
    }

    /// Write settings atomically
    #[instrument(name = "settings_save", skip(self, settings), fields(path = %self.path.display()))]
    pub fn save(&self, settings: &Settings) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(settings).context("Failed to serialize settings")?;

        let temp_path = self.path.with_extension("json.tmp");
        std::fs::write(&temp_path, &json)
            .with_context(|| format!("Failed to write temp settings file: {}", temp_path.display()))?;
        std::fs::rename(&temp_path, &self.path)
            .with_context(|| format!("Failed to rename temp file to {}", self.path.display()))?;

        info!(bytes = json.len(), "Saved settings (atomic)");
        Ok(())
    }

    /// Load, modify, save; returns the saved settings
    pub fn update(&self, f: impl FnOnce(&mut Settings)) -> Result<Settings> {
        let mut settings = self.load()?;
        f(&mut settings);
        self.save(&settings)?;
        Ok(settings)
    }

    pub fn set_replacements(&self, table: &ReplacementTable) -> Result<Settings> {
        let plain = table.to_plain();
        self.update(|s| s.replacements = plain)
    }

    pub fn set_feature_enabled(&self, enabled: bool) -> Result<Settings> {
        self.update(|s| s.text_replacement_enabled = Some(enabled))
    }

    pub fn set_extension_enabled(&self, enabled: bool) -> Result<Settings> {
        self.update(|s| s.enabled = Some(enabled))
    }

    /// Merge an exported replacements file into the stored table
    #[instrument(name = "settings_import", skip(self))]
    pub fn import_file(&self, source: &Path) -> Result<ImportReport> {
        let json = std::fs::read_to_string(source)
            .with_context(|| format!("Failed to read import file: {}", source.display()))?;
        let current = self.load()?.table();
        let (merged, report) = import_json(&current, &json)?;
        self.set_replacements(&merged)?;
        info!(
            imported = report.imported,
            skipped = report.skipped.len(),
            "Imported replacements"
        );
        Ok(report)
    }

    #[instrument(name = "settings_export", skip(self))]
    pub fn export_file(&self, destination: &Path) -> Result<usize> {
        let table = self.load()?.table();
        let json = export_json(&table)?;
        std::fs::write(destination, json)
            .with_context(|| format!("Failed to write export file: {}", destination.display()))?;
        Ok(table.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store() -> (TempDir, SettingsStore) {
        let dir = TempDir::new().unwrap();
        let store = SettingsStore::new(dir.path().join("nested").join(SETTINGS_FILE_NAME));
        (dir, store)
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let (_dir, store) = store();
        let settings = store.load().unwrap();
        assert_eq!(settings, Settings::default());
        assert!(!settings.feature_enabled());
        assert!(settings.extension_enabled());
        assert!(!settings.engine_enabled());
    }

    #[test]
    fn test_save_then_load_uses_camel_case_keys() {
        let (_dir, store) = store();
        let table = ReplacementTable::from_map([("brb", "be right back")]);
        store.set_replacements(&table).unwrap();
        store.set_feature_enabled(true).unwrap();

        let raw = std::fs::read_to_string(store.path()).unwrap();
        assert!(raw.contains("\"textReplacementEnabled\": true"));
        assert!(!raw.contains("\"enabled\""));
        assert!(!store.path().with_extension("json.tmp").exists());

        let settings = store.load().unwrap();
        assert!(settings.engine_enabled());
        assert_eq!(settings.table().get("brb"), Some("be right back"));
    }

    #[test]
    fn test_invalid_stored_entries_are_dropped_from_table() {
        let settings: Settings = serde_json::from_str(
            r#"{"replacements": {"ok": "fine", "bad key": "x", "empty": "  "}, "enabled": false}"#,
        )
        .unwrap();
        assert_eq!(settings.table().len(), 1);
        assert!(!settings.extension_enabled());
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let (_dir, store) = store();
        std::fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        std::fs::write(store.path(), "{oops").unwrap();
        assert!(store.load().is_err());
    }

    #[test]
    fn test_import_then_export() {
        let (dir, store) = store();
        store
            .set_replacements(&ReplacementTable::from_map([("a1", "old")]))
            .unwrap();

        let import = dir.path().join("import.json");
        std::fs::write(
            &import,
            r#"{"replacements": {"a1": "new", "sig": "Regards", "<x>": "bad"}}"#,
        )
        .unwrap();
        let report = store.import_file(&import).unwrap();
        assert_eq!(report.imported, 2);
        assert_eq!(report.skipped.len(), 1);

        let export = dir.path().join("export.json");
        assert_eq!(store.export_file(&export).unwrap(), 2);
        let exported = std::fs::read_to_string(export).unwrap();
        assert!(exported.contains("\"a1\": \"new\""));
        assert!(exported.contains("\"sig\": \"Regards\""));
    }
}
