//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`ParlorSettings::default()`]
//! 2. If the settings file exists, deep-merge its values over the defaults
//! 3. Apply environment variable overrides (highest priority)
//! 4. Validate
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, warn};

use crate::errors::Result;
use crate::types::ParlorSettings;

/// Resolve the default settings file path (`~/.parlor/settings.json`).
pub fn settings_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".parlor").join("settings.json")
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<ParlorSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// A missing file yields defaults; a file with invalid JSON, or a merged
/// result that fails validation, is an error.
pub fn load_settings_from_path(path: &Path) -> Result<ParlorSettings> {
    load_with(path, |key| std::env::var(key).ok())
}

fn load_with(path: &Path, lookup: impl Fn(&str) -> Option<String>) -> Result<ParlorSettings> {
    let defaults = serde_json::to_value(ParlorSettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path)?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    let mut settings: ParlorSettings = serde_json::from_value(merged)?;
    apply_overrides(&mut settings, lookup);
    settings.validate()?;
    Ok(settings)
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

/// Apply overrides from the process environment.
pub fn apply_env_overrides(settings: &mut ParlorSettings) {
    apply_overrides(settings, |key| std::env::var(key).ok());
}

/// Apply overrides from an arbitrary key lookup.
///
/// Invalid values are ignored with a warning and the file/default value
/// stays in effect. `PARLOR_PORT` wins over the conventional `PORT`.
pub fn apply_overrides(settings: &mut ParlorSettings, lookup: impl Fn(&str) -> Option<String>) {
    let env = EnvReader { lookup };

    // ── Server ──────────────────────────────────────────────────────
    if let Some(v) = env.u16_range("PORT", 1, 65535) {
        settings.server.port = v;
    }
    if let Some(v) = env.u16_range("PARLOR_PORT", 1, 65535) {
        settings.server.port = v;
    }
    if let Some(v) = env.string("PARLOR_HOST") {
        settings.server.host = v;
    }
    if let Some(v) = env.string("PARLOR_PUBLIC_URL") {
        settings.server.public_url = Some(v);
    }
    if let Some(v) = env.u64_range("PARLOR_HEARTBEAT_INTERVAL_SECS", 1, 3600) {
        settings.server.heartbeat_interval_secs = v;
    }
    if let Some(v) = env.u64_range("PARLOR_HEARTBEAT_TIMEOUT_SECS", 2, 7200) {
        settings.server.heartbeat_timeout_secs = v;
    }

    // ── Rooms ───────────────────────────────────────────────────────
    if let Some(v) = env.u64_range("PARLOR_HOST_GRACE_SECS", 1, 86_400) {
        settings.rooms.host_grace_secs = v;
    }
    if let Some(v) = env.u64_range("PARLOR_TEARDOWN_GRACE_SECS", 1, 86_400) {
        settings.rooms.teardown_grace_secs = v;
    }
    if let Some(v) = env.u64_range("PARLOR_GUEST_RETENTION_SECS", 1, 86_400) {
        settings.rooms.guest_retention_secs = v;
    }

    // ── Logging ─────────────────────────────────────────────────────
    if let Some(v) = env.string("PARLOR_LOG_LEVEL") {
        settings.logging.level = v;
    }
    if let Some(v) = env.bool("PARLOR_LOG_JSON") {
        settings.logging.json = v;
    }
}

// ── Pure parsing functions ──────────────────────────────────────────────────

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

/// Parse a string as a `u16` within a range.
pub fn parse_u16_range(val: &str, min: u16, max: u16) -> Option<u16> {
    let n: u16 = val.trim().parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

/// Parse a string as a `u64` within a range.
pub fn parse_u64_range(val: &str, min: u64, max: u64) -> Option<u64> {
    let n: u64 = val.trim().parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

// ── Env readers ─────────────────────────────────────────────────────────────

struct EnvReader<F> {
    lookup: F,
}

impl<F: Fn(&str) -> Option<String>> EnvReader<F> {
    fn string(&self, name: &str) -> Option<String> {
        (self.lookup)(name).filter(|v| !v.trim().is_empty())
    }

    fn bool(&self, name: &str) -> Option<bool> {
        let val = self.string(name)?;
        let result = parse_bool(&val);
        if result.is_none() {
            warn!(key = name, value = %val, "invalid boolean env var, ignoring");
        }
        result
    }

    fn u16_range(&self, name: &str, min: u16, max: u16) -> Option<u16> {
        let val = self.string(name)?;
        let result = parse_u16_range(&val, min, max);
        if result.is_none() {
            warn!(key = name, value = %val, "invalid u16 env var, ignoring");
        }
        result
    }

    fn u64_range(&self, name: &str, min: u64, max: u64) -> Option<u64> {
        let val = self.string(name)?;
        let result = parse_u64_range(&val, min, max);
        if result.is_none() {
            warn!(key = name, value = %val, "invalid u64 env var, ignoring");
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::SettingsError;
    use std::collections::HashMap;
    use std::io::Write;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    fn no_env() -> impl Fn(&str) -> Option<String> {
        |_| None
    }

    // ── deep_merge ──────────────────────────────────────────────────

    #[test]
    fn merge_nested_override() {
        let target = serde_json::json!({"server": {"port": 3005, "host": "0.0.0.0"}});
        let source = serde_json::json!({"server": {"port": 9090}});
        let merged = deep_merge(target, source);
        assert_eq!(merged["server"]["port"], 9090);
        assert_eq!(merged["server"]["host"], "0.0.0.0");
    }

    #[test]
    fn merge_null_preserves_target() {
        let target = serde_json::json!({"a": 1, "b": 2});
        let source = serde_json::json!({"a": null});
        let merged = deep_merge(target, source);
        assert_eq!(merged["a"], 1);
        assert_eq!(merged["b"], 2);
    }

    #[test]
    fn merge_array_replace() {
        let target = serde_json::json!({"items": [1, 2, 3]});
        let source = serde_json::json!({"items": [4]});
        assert_eq!(deep_merge(target, source)["items"], serde_json::json!([4]));
    }

    // ── file loading ────────────────────────────────────────────────

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = load_with(&dir.path().join("nope.json"), no_env()).unwrap();
        assert_eq!(settings.server.port, 3005);
    }

    #[test]
    fn file_values_merge_over_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"rooms": {{"hostGraceSecs": 5}}, "logging": {{"json": true}}}}"#)
            .unwrap();
        let settings = load_with(file.path(), no_env()).unwrap();
        assert_eq!(settings.rooms.host_grace_secs, 5);
        assert_eq!(settings.rooms.teardown_grace_secs, 300);
        assert!(settings.logging.json);
    }

    #[test]
    fn invalid_json_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{ not json").unwrap();
        let err = load_with(file.path(), no_env()).unwrap_err();
        assert!(matches!(err, SettingsError::Json(_)));
    }

    #[test]
    fn invalid_combination_fails_validation() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"server": {{"heartbeatIntervalSecs": 40, "heartbeatTimeoutSecs": 60}}}}"#
        )
        .unwrap();
        let err = load_with(file.path(), no_env()).unwrap_err();
        assert!(matches!(err, SettingsError::InvalidValue(_)));
    }

    // ── env overrides ───────────────────────────────────────────────

    #[test]
    fn env_overrides_beat_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"server": {{"port": 4000}}}}"#).unwrap();
        let settings = load_with(file.path(), lookup(&[("PORT", "5000")])).unwrap();
        assert_eq!(settings.server.port, 5000);
    }

    #[test]
    fn parlor_port_beats_port() {
        let mut settings = ParlorSettings::default();
        apply_overrides(
            &mut settings,
            lookup(&[("PORT", "5000"), ("PARLOR_PORT", "6000")]),
        );
        assert_eq!(settings.server.port, 6000);
    }

    #[test]
    fn invalid_env_values_are_ignored() {
        let mut settings = ParlorSettings::default();
        apply_overrides(
            &mut settings,
            lookup(&[
                ("PORT", "not-a-port"),
                ("PARLOR_HOST_GRACE_SECS", "0"),
                ("PARLOR_LOG_JSON", "maybe"),
            ]),
        );
        assert_eq!(settings.server.port, 3005);
        assert_eq!(settings.rooms.host_grace_secs, 30);
        assert!(!settings.logging.json);
    }

    #[test]
    fn env_overrides_all_fields() {
        let mut settings = ParlorSettings::default();
        apply_overrides(
            &mut settings,
            lookup(&[
                ("PARLOR_HOST", "127.0.0.1"),
                ("PARLOR_PUBLIC_URL", "https://chat.example.com"),
                ("PARLOR_HEARTBEAT_INTERVAL_SECS", "10"),
                ("PARLOR_HEARTBEAT_TIMEOUT_SECS", "30"),
                ("PARLOR_HOST_GRACE_SECS", "15"),
                ("PARLOR_TEARDOWN_GRACE_SECS", "60"),
                ("PARLOR_GUEST_RETENTION_SECS", "120"),
                ("PARLOR_LOG_LEVEL", "debug"),
                ("PARLOR_LOG_JSON", "yes"),
            ]),
        );
        assert_eq!(settings.server.host, "127.0.0.1");
        assert_eq!(
            settings.server.public_url.as_deref(),
            Some("https://chat.example.com")
        );
        assert_eq!(settings.server.heartbeat_interval_secs, 10);
        assert_eq!(settings.server.heartbeat_timeout_secs, 30);
        assert_eq!(settings.rooms.host_grace_secs, 15);
        assert_eq!(settings.rooms.teardown_grace_secs, 60);
        assert_eq!(settings.rooms.guest_retention_secs, 120);
        assert_eq!(settings.logging.level, "debug");
        assert!(settings.logging.json);
        settings.validate().unwrap();
    }

    #[test]
    fn blank_env_values_are_ignored() {
        let mut settings = ParlorSettings::default();
        apply_overrides(&mut settings, lookup(&[("PARLOR_HOST", "  ")]));
        assert_eq!(settings.server.host, "0.0.0.0");
    }

    // ── pure parsers ────────────────────────────────────────────────

    #[test]
    fn parse_bool_variants() {
        assert_eq!(parse_bool("ON"), Some(true));
        assert_eq!(parse_bool("0"), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }

    #[test]
    fn parse_ranges() {
        assert_eq!(parse_u16_range("8080", 1, 65535), Some(8080));
        assert_eq!(parse_u16_range("0", 1, 65535), None);
        assert_eq!(parse_u64_range(" 30 ", 1, 60), Some(30));
        assert_eq!(parse_u64_range("61", 1, 60), None);
    }
}
