//! Line-oriented `key value` configuration.
//!
//! ```text
//! # window
//! MainWindow.Width   1280
//! MainWindow.Height  720
//! Game.FixedUpdateFrequency 60
//! ```
//!
//! Blank lines and lines starting with `#` are skipped. Only the first token
//! after the key is kept; a key with no value is ignored. Later lines win.

use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;

/// Errors from configuration lookups and loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("configuration key not found: {0}")]
    KeyNotFound(String),
    #[error("configuration key {key} has value {value:?}, expected {expected}")]
    InvalidValue {
        key: String,
        value: String,
        expected: &'static str,
    },
}

/// Key to string mapping with typed accessors.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Config {
    values: HashMap<String, String>,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a configuration file from disk.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let config = Self::parse(&text);
        tracing::debug!(path = %path.display(), keys = config.len(), "configuration loaded");
        Ok(config)
    }

    /// Parse configuration text. Parsing itself never fails; malformed lines are skipped.
    pub fn parse(text: &str) -> Self {
        let mut values = HashMap::new();
        for line in text.lines() {
            let mut tokens = line.split_whitespace();
            let Some(key) = tokens.next() else {
                continue;
            };
            if key.starts_with('#') {
                continue;
            }
            let Some(value) = tokens.next() else {
                continue;
            };
            values.insert(key.to_string(), value.to_string());
        }
        Self { values }
    }

    /// Overlay every entry of `other` on top of this configuration.
    pub fn merge(&mut self, other: Config) {
        self.values.extend(other.values);
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl ToString) {
        self.values.insert(key.into(), value.to_string());
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get_string(&self, key: &str) -> Result<String, ConfigError> {
        self.values
            .get(key)
            .cloned()
            .ok_or_else(|| ConfigError::KeyNotFound(key.to_string()))
    }

    pub fn get_int(&self, key: &str) -> Result<i64, ConfigError> {
        self.get_parsed(key, "an integer")
    }

    pub fn get_float(&self, key: &str) -> Result<f64, ConfigError> {
        self.get_parsed(key, "a number")
    }

    pub fn get_bool(&self, key: &str) -> Result<bool, ConfigError> {
        let value = self.get_string(key)?;
        parse_bool(&value).ok_or(ConfigError::InvalidValue {
            key: key.to_string(),
            value,
            expected: "a boolean",
        })
    }

    pub fn get_string_or_default(&self, key: &str, default: &str) -> String {
        self.values
            .get(key)
            .cloned()
            .unwrap_or_else(|| default.to_string())
    }

    /// Like [`Config::get_int`], but an absent key yields `default`.
    /// A present key with an unparsable value is still an error.
    pub fn get_int_or_default(&self, key: &str, default: i64) -> Result<i64, ConfigError> {
        self.or_default(self.get_int(key), default)
    }

    pub fn get_float_or_default(&self, key: &str, default: f64) -> Result<f64, ConfigError> {
        self.or_default(self.get_float(key), default)
    }

    pub fn get_bool_or_default(&self, key: &str, default: bool) -> Result<bool, ConfigError> {
        self.or_default(self.get_bool(key), default)
    }

    fn get_parsed<T: FromStr>(&self, key: &str, expected: &'static str) -> Result<T, ConfigError> {
        let value = self.get_string(key)?;
        value.parse().map_err(|_| ConfigError::InvalidValue {
            key: key.to_string(),
            value,
            expected,
        })
    }

    fn or_default<T>(&self, result: Result<T, ConfigError>, default: T) -> Result<T, ConfigError> {
        match result {
            Err(ConfigError::KeyNotFound(_)) => Ok(default),
            other => other,
        }
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = "\
# window settings
MainWindow.Width 1280
MainWindow.Height   720

Game.FixedUpdateFrequency 60 trailing tokens are ignored
Renderer.AllowTearing on
World.Scale 0.5
Dangling.Key
   # indented comment
World.File worlds/castle.bin
";

    #[test]
    fn parses_keys_and_skips_comments() {
        let cfg = Config::parse(SAMPLE);
        assert_eq!(cfg.get_int("MainWindow.Width").unwrap(), 1280);
        assert_eq!(cfg.get_int("MainWindow.Height").unwrap(), 720);
        assert_eq!(cfg.get_int("Game.FixedUpdateFrequency").unwrap(), 60);
        assert!(cfg.get_bool("Renderer.AllowTearing").unwrap());
        assert_eq!(cfg.get_float("World.Scale").unwrap(), 0.5);
        assert_eq!(cfg.get_string("World.File").unwrap(), "worlds/castle.bin");
        assert!(!cfg.contains("Dangling.Key"));
        assert!(!cfg.contains("#"));
        assert_eq!(cfg.len(), 6);
    }

    #[test]
    fn missing_key_defaults_without_error() {
        let cfg = Config::new();
        assert_eq!(cfg.get_int_or_default("missing.key", 42).unwrap(), 42);
        assert_eq!(cfg.get_float_or_default("missing.key", 1.5).unwrap(), 1.5);
        assert!(cfg.get_bool_or_default("missing.key", true).unwrap());
        assert_eq!(cfg.get_string_or_default("missing.key", "x"), "x");
    }

    #[test]
    fn missing_key_is_key_not_found() {
        let cfg = Config::new();
        let err = cfg.get_int("missing.key").unwrap_err();
        assert!(matches!(err, ConfigError::KeyNotFound(ref k) if k == "missing.key"));
        assert!(matches!(
            cfg.get_string("missing.key"),
            Err(ConfigError::KeyNotFound(_))
        ));
    }

    #[test]
    fn unparsable_value_is_not_defaulted() {
        let cfg = Config::parse("Game.MaxTicksPerFrame lots");
        let err = cfg.get_int_or_default("Game.MaxTicksPerFrame", 5).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
        assert!(cfg.get_bool("Game.MaxTicksPerFrame").is_err());
    }

    #[test]
    fn later_lines_override_and_merge_overlays() {
        let mut cfg = Config::parse("A 1\nA 2\nB 3");
        assert_eq!(cfg.get_int("A").unwrap(), 2);
        cfg.merge(Config::parse("B 9\nC 4"));
        assert_eq!(cfg.get_int("B").unwrap(), 9);
        assert_eq!(cfg.get_int("C").unwrap(), 4);
        cfg.set("A", 7);
        assert_eq!(cfg.get_int("A").unwrap(), 7);
    }

    #[test]
    fn load_from_file() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        write!(tmp, "{SAMPLE}").unwrap();
        let cfg = Config::load(tmp.path()).unwrap();
        assert_eq!(cfg.get_int("MainWindow.Width").unwrap(), 1280);
    }

    #[test]
    fn load_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = Config::load(dir.path().join("nope.cfg")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
