//! Configuration loading and management
//!
//! Settings come from an optional `config.json` in the user's config
//! directory, then environment variables override individual fields.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use serde::Deserialize;

/// Environment variable overriding [`Config::step`]
pub const ENV_STEP: &str = "VOLUME_FIX_STEP";
/// Environment variable overriding [`Config::passthrough`]
pub const ENV_PASSTHROUGH: &str = "VOLUME_FIX_PASSTHROUGH";
/// Environment variable overriding [`Config::queue_capacity`]
pub const ENV_QUEUE_CAPACITY: &str = "VOLUME_FIX_QUEUE_CAPACITY";

/// Daemon configuration
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Volume change applied per key press, as a fraction of full scale
    pub step: f64,

    /// Let intercepted volume keys reach the OS as well
    pub passthrough: bool,

    /// Bound of the queue between the keyboard hook and the state machine
    pub queue_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            step: 0.01,
            passthrough: false,
            queue_capacity: 3,
        }
    }
}

impl Config {
    /// Load configuration from the config file, environment and defaults
    pub fn load() -> Result<Self> {
        let file = match config_dir() {
            Some(dir) => {
                let path = dir.join("volume-fix").join("config.json");
                if path.exists() {
                    let text = std::fs::read_to_string(&path)
                        .with_context(|| format!("failed to read {}", path.display()))?;
                    Some(text)
                } else {
                    None
                }
            }
            None => None,
        };

        Self::from_sources(file.as_deref(), |name| std::env::var(name).ok())
    }

    /// Build a configuration from file contents and an environment lookup
    pub fn from_sources<F>(file: Option<&str>, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match file {
            Some(text) => serde_json::from_str(text).context("invalid config file")?,
            None => Self::default(),
        };

        if let Some(raw) = env(ENV_STEP) {
            config.step = raw
                .trim()
                .parse()
                .with_context(|| format!("{ENV_STEP} must be a number, got {raw:?}"))?;
        }
        if let Some(raw) = env(ENV_PASSTHROUGH) {
            config.passthrough = parse_flag(&raw)
                .with_context(|| format!("{ENV_PASSTHROUGH} must be a boolean, got {raw:?}"))?;
        }
        if let Some(raw) = env(ENV_QUEUE_CAPACITY) {
            config.queue_capacity = raw
                .trim()
                .parse()
                .with_context(|| format!("{ENV_QUEUE_CAPACITY} must be an integer, got {raw:?}"))?;
        }

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if !(self.step > 0.0 && self.step <= 1.0) {
            bail!("step must be in (0, 1], got {}", self.step);
        }
        if self.queue_capacity == 0 {
            bail!("queue_capacity must be at least 1");
        }
        Ok(())
    }
}

fn parse_flag(raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => bail!("unrecognised flag value {other:?}"),
    }
}

fn config_dir() -> Option<PathBuf> {
    if cfg!(windows) {
        return std::env::var_os("APPDATA").map(PathBuf::from);
    }
    std::env::var_os("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .or_else(|| std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".config")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_sources(None, no_env).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.step, 0.01);
        assert!(!config.passthrough);
        assert_eq!(config.queue_capacity, 3);
    }

    #[test]
    fn test_file_fields_are_optional() {
        let config = Config::from_sources(Some(r#"{"passthrough": true}"#), no_env).unwrap();
        assert!(config.passthrough);
        assert_eq!(config.step, 0.01);
    }

    #[test]
    fn test_env_overrides_file() {
        let env = |name: &str| match name {
            ENV_STEP => Some("0.02".to_string()),
            ENV_QUEUE_CAPACITY => Some(" 16 ".to_string()),
            _ => None,
        };
        let config = Config::from_sources(Some(r#"{"step": 0.05}"#), env).unwrap();
        assert_eq!(config.step, 0.02);
        assert_eq!(config.queue_capacity, 16);
    }

    #[test]
    fn test_passthrough_flag_spellings() {
        for (raw, expected) in [("1", true), ("TRUE", true), ("off", false), ("no", false)] {
            let env = |name: &str| (name == ENV_PASSTHROUGH).then(|| raw.to_string());
            let config = Config::from_sources(None, env).unwrap();
            assert_eq!(config.passthrough, expected, "value {raw:?}");
        }
    }

    #[test]
    fn test_rejects_invalid_values() {
        assert!(Config::from_sources(Some(r#"{"step": 0.0}"#), no_env).is_err());
        assert!(Config::from_sources(Some(r#"{"step": 1.5}"#), no_env).is_err());
        assert!(Config::from_sources(Some(r#"{"queue_capacity": 0}"#), no_env).is_err());
        assert!(Config::from_sources(Some(r#"{"volume": 1}"#), no_env).is_err());

        let env = |name: &str| (name == ENV_STEP).then(|| "loud".to_string());
        assert!(Config::from_sources(None, env).is_err());
    }
}
