//! Configuration type definitions

use serde::{Deserialize, Serialize};

use super::defaults::*;

// ============================================
// TIMING
// ============================================

/// Timer delays used by the engine, all in milliseconds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimingConfig {
    /// Debounce before processing an input event (default: 10)
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    /// Delay before the keydown-driven input probe (default: 10)
    #[serde(default = "default_keydown_probe_ms")]
    pub keydown_probe_ms: u64,
    /// Delay before injecting into a discovered iframe (default: 1000)
    #[serde(default = "default_iframe_inject_delay_ms")]
    pub iframe_inject_delay_ms: u64,
    /// Fallback sweep interval for unprocessed iframes (default: 5000)
    #[serde(default = "default_iframe_sweep_interval_ms")]
    pub iframe_sweep_interval_ms: u64,
    /// Interval between `request-data` retries (default: 100)
    #[serde(default = "default_bridge_retry_ms")]
    pub bridge_retry_ms: u64,
    /// Maximum number of `request-data` retries (default: 50)
    #[serde(default = "default_bridge_max_retries")]
    pub bridge_max_retries: u32,
}

fn default_debounce_ms() -> u64 {
    DEFAULT_DEBOUNCE_MS
}
fn default_keydown_probe_ms() -> u64 {
    DEFAULT_KEYDOWN_PROBE_MS
}
fn default_iframe_inject_delay_ms() -> u64 {
    DEFAULT_IFRAME_INJECT_DELAY_MS
}
fn default_iframe_sweep_interval_ms() -> u64 {
    DEFAULT_IFRAME_SWEEP_INTERVAL_MS
}
fn default_bridge_retry_ms() -> u64 {
    DEFAULT_BRIDGE_RETRY_MS
}
fn default_bridge_max_retries() -> u32 {
    DEFAULT_BRIDGE_MAX_RETRIES
}

impl Default for TimingConfig {
    fn default() -> Self {
        TimingConfig {
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            keydown_probe_ms: DEFAULT_KEYDOWN_PROBE_MS,
            iframe_inject_delay_ms: DEFAULT_IFRAME_INJECT_DELAY_MS,
            iframe_sweep_interval_ms: DEFAULT_IFRAME_SWEEP_INTERVAL_MS,
            bridge_retry_ms: DEFAULT_BRIDGE_RETRY_MS,
            bridge_max_retries: DEFAULT_BRIDGE_MAX_RETRIES,
        }
    }
}

// ============================================
// ENGINE CONFIG
// ============================================

/// Engine configuration. Every field is optional in the JSON file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineConfig {
    #[serde(default)]
    pub timing: TimingConfig,
    /// Capacity of the per-element classification cache (default: 64)
    #[serde(default = "default_surface_cache_size")]
    pub surface_cache_size: usize,
}

fn default_surface_cache_size() -> usize {
    DEFAULT_SURFACE_CACHE_SIZE
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            timing: TimingConfig::default(),
            surface_cache_size: DEFAULT_SURFACE_CACHE_SIZE,
        }
    }
}
