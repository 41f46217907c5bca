//! Runtime settings for the engine and its checkpointer

use std::time::Duration;

use thiserror::Error;

/// Environment variable overriding [`Config::checkpoint_interval_ms`]
pub const CHECKPOINT_INTERVAL_ENV: &str = "UNDO_LEDGER_CHECKPOINT_INTERVAL_MS";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value `{value}` for {key}")]
    InvalidValue { key: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Pause between two checkpoint cycles (milliseconds)
    pub checkpoint_interval_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            checkpoint_interval_ms: 500,
        }
    }
}

impl Config {
    pub fn checkpoint_interval(&self) -> Duration {
        Duration::from_millis(self.checkpoint_interval_ms)
    }

    /// Defaults, overridden by whatever is set in the environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Config::default();

        if let Some(value) = lookup(CHECKPOINT_INTERVAL_ENV) {
            let parsed = value.trim().parse::<u64>();
            config.checkpoint_interval_ms = match parsed {
                Ok(ms) if ms > 0 => ms,
                _ => {
                    return Err(ConfigError::InvalidValue {
                        key: CHECKPOINT_INTERVAL_ENV,
                        value,
                    });
                }
            };
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.checkpoint_interval(), Duration::from_millis(500));
        assert_eq!(Config::from_lookup(|_| None).unwrap(), config);
    }

    #[test]
    fn test_interval_override() {
        let config = Config::from_lookup(|key| {
            (key == CHECKPOINT_INTERVAL_ENV).then(|| " 25 ".to_string())
        })
        .unwrap();
        assert_eq!(config.checkpoint_interval(), Duration::from_millis(25));
    }

    #[test]
    fn test_invalid_interval() {
        for bad in ["0", "-1", "soon"] {
            let err = Config::from_lookup(|_| Some(bad.to_string())).unwrap_err();
            assert_eq!(
                err,
                ConfigError::InvalidValue {
                    key: CHECKPOINT_INTERVAL_ENV,
                    value: bad.to_string()
                }
            );
        }
    }
}
