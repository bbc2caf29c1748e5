//! Settings loading with deep merge and environment variable overrides.
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::debug;

use crate::errors::Result;
use crate::types::RelaySettings;

/// Resolve the path to the settings file (`~/.fenrelay/settings.json`).
pub fn settings_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".fenrelay").join("settings.json")
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<RelaySettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// A missing file yields defaults; invalid JSON or out-of-range values are
/// errors.
pub fn load_settings_from_path(path: &Path) -> Result<RelaySettings> {
    load_settings_with(path, |name| std::env::var(name).ok())
}

/// Load settings from `path`, taking overrides from `lookup` instead of
/// the process environment.
pub fn load_settings_with<F>(path: &Path, lookup: F) -> Result<RelaySettings>
where
    F: Fn(&str) -> Option<String>,
{
    let mut settings = read_merged(path)?;
    apply_overrides_from(&mut settings, lookup);
    settings.validate()?;
    Ok(settings)
}

fn read_merged(path: &Path) -> Result<RelaySettings> {
    let defaults = serde_json::to_value(RelaySettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path)?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    Ok(serde_json::from_value(merged)?)
}

/// Recursive deep merge of two JSON values.
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = if let Some(target_val) = target_map.remove(&key) {
                    deep_merge(target_val, source_val)
                } else {
                    source_val
                };
                let _ = target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

/// Apply `FENRELAY_*` environment overrides.
///
/// Invalid values are ignored (the file/default value stays).
pub fn apply_env_overrides(settings: &mut RelaySettings) {
    apply_overrides_from(settings, |name| std::env::var(name).ok());
}

/// Apply overrides from an arbitrary variable lookup.
pub fn apply_overrides_from<F>(settings: &mut RelaySettings, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let read = |name: &str| lookup(name).filter(|v| !v.is_empty());

    // ── Engine ──────────────────────────────────────────────────────
    if let Some(v) = read("FENRELAY_ENGINE_URL") {
        settings.engine.url = v;
    }
    if let Some(v) = read("FENRELAY_SEARCH_DEPTH").and_then(|v| parse_u32_range(&v, 1, 30)) {
        settings.engine.search_depth = v;
    }
    if let Some(v) =
        read("FENRELAY_RECONNECT_DELAY_MS").and_then(|v| parse_u64_range(&v, 1, 600_000))
    {
        settings.engine.reconnect_delay_ms = v;
    }

    // ── Stability ───────────────────────────────────────────────────
    if let Some(v) = read("FENRELAY_SETTLE_DELAY_MS").and_then(|v| parse_u64_range(&v, 0, 60_000)) {
        settings.stability.settle_delay_ms = v;
    }
    if let Some(v) = read("FENRELAY_CONFIRM_DELAY_MS").and_then(|v| parse_u64_range(&v, 0, 60_000))
    {
        settings.stability.confirm_delay_ms = v;
    }
    if let Some(v) = read("FENRELAY_MAX_WAIT_MS").and_then(|v| parse_u64_range(&v, 1, 600_000)) {
        settings.stability.max_wait_ms = v;
    }
    if let Some(v) = read("FENRELAY_PRIME_ON_START").and_then(|v| parse_bool(&v)) {
        settings.stability.prime_on_start = v;
    }

    // ── Logging ─────────────────────────────────────────────────────
    if let Some(v) = read("FENRELAY_LOG_LEVEL") {
        settings.logging.level = v;
    }
    if let Some(v) = read("FENRELAY_LOG_JSON").and_then(|v| parse_bool(&v)) {
        settings.logging.json = v;
    }
}

/// Parse a string as a boolean.
///
/// Accepts (case-insensitive): `true`/`1`/`yes`/`on` or `false`/`0`/`no`/`off`.
pub fn parse_bool(val: &str) -> Option<bool> {
    match val.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Parse a string as a `u32` within a range.
pub fn parse_u32_range(val: &str, min: u32, max: u32) -> Option<u32> {
    let n: u32 = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

/// Parse a string as a `u64` within a range.
pub fn parse_u64_range(val: &str, min: u64, max: u64) -> Option<u64> {
    let n: u64 = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}
