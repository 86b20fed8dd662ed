//! Default configuration values
//!
//! The timing values were tuned against one vendor dashboard's rendering
//! latencies. They are defaults, not guarantees: other host pages may need
//! different values.

/// Debounce between an input event and trigger detection
pub const DEFAULT_DEBOUNCE_MS: u64 = 10;

/// Delay after a trigger keydown before the synthetic input probe
pub const DEFAULT_KEYDOWN_PROBE_MS: u64 = 10;

/// Delay before reaching into a newly discovered iframe
pub const DEFAULT_IFRAME_INJECT_DELAY_MS: u64 = 1000;

/// Interval of the fallback sweep for unprocessed iframes
pub const DEFAULT_IFRAME_SWEEP_INTERVAL_MS: u64 = 5000;

/// Interval between `request-data` retries from an iframe engine
pub const DEFAULT_BRIDGE_RETRY_MS: u64 = 100;

/// Maximum `request-data` retries before an iframe engine gives up
pub const DEFAULT_BRIDGE_MAX_RETRIES: u32 = 50;

/// Number of per-element classifications kept
pub const DEFAULT_SURFACE_CACHE_SIZE: usize = 64;

/// Feature switch default when the settings store has no value
pub const DEFAULT_FEATURE_ENABLED: bool = false;

/// Global extension switch default when the settings store has no value
pub const DEFAULT_EXTENSION_ENABLED: bool = true;
