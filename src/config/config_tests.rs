use super::*;
use std::io::Write;

#[test]
fn test_default_config() {
    let config = EngineConfig::default();
    assert_eq!(config.timing.debounce_ms, DEFAULT_DEBOUNCE_MS);
    assert_eq!(config.timing.keydown_probe_ms, 10);
    assert_eq!(config.timing.iframe_inject_delay_ms, 1000);
    assert_eq!(config.timing.iframe_sweep_interval_ms, 5000);
    assert_eq!(config.timing.bridge_retry_ms, 100);
    assert_eq!(config.timing.bridge_max_retries, 50);
    assert_eq!(config.surface_cache_size, DEFAULT_SURFACE_CACHE_SIZE);
}

#[test]
fn test_partial_json_uses_defaults_for_missing_fields() {
    let json = r#"{"timing": {"debounceMs": 25}}"#;
    let config: EngineConfig = serde_json::from_str(json).unwrap();
    assert_eq!(config.timing.debounce_ms, 25);
    assert_eq!(config.timing.keydown_probe_ms, DEFAULT_KEYDOWN_PROBE_MS);
    assert_eq!(config.surface_cache_size, DEFAULT_SURFACE_CACHE_SIZE);
}

#[test]
fn test_empty_json_is_default() {
    let config: EngineConfig = serde_json::from_str("{}").unwrap();
    assert_eq!(config, EngineConfig::default());
}

#[test]
fn test_config_serialization_uses_camel_case() {
    let json = serde_json::to_string(&EngineConfig::default()).unwrap();
    assert!(json.contains("\"iframeSweepIntervalMs\":5000"));
    assert!(json.contains("\"surfaceCacheSize\":64"));
}

#[test]
fn test_load_config_missing_file_returns_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let config = load_config(&dir.path().join("nope.json"));
    assert_eq!(config, EngineConfig::default());
}

#[test]
fn test_load_config_reads_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("engine.json");
    let mut file = std::fs::File::create(&path).unwrap();
    write!(file, r#"{{"surfaceCacheSize": 8, "timing": {{"bridgeMaxRetries": 3}}}}"#).unwrap();

    let config = load_config(&path);
    assert_eq!(config.surface_cache_size, 8);
    assert_eq!(config.timing.bridge_max_retries, 3);
    assert_eq!(config.timing.debounce_ms, DEFAULT_DEBOUNCE_MS);
}

#[test]
fn test_load_config_invalid_json_returns_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("engine.json");
    std::fs::write(&path, "{ not json").unwrap();
    assert_eq!(load_config(&path), EngineConfig::default());
}

#[test]
fn test_default_config_path_file_name() {
    assert!(default_config_path().ends_with("text-replacer/engine.json"));
}
