use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};

pub const DEFAULT_TIMEOUT_MS: u64 = 1000;

fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Default)]
pub struct LoggingConfig {
    /// Console level, e.g. "info" or "frog=debug". `RUST_LOG` directives are merged on top.
    pub level: Option<String>,
}

/// Settings of the loopback runtime, read from a toml file.
///
/// ```toml
/// default_timeout_ms = 1000
/// simulated_latency_ms = 20
///
/// [logging]
/// level = "debug"
/// ```
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct RuntimeConfig {
    /// Applied to calls whose context carries no deadline.
    #[serde(default = "default_timeout_ms")]
    pub default_timeout_ms: u64,
    /// Delay the loopback channel waits before dispatching.
    #[serde(default)]
    pub simulated_latency_ms: Option<u64>,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            default_timeout_ms: DEFAULT_TIMEOUT_MS,
            simulated_latency_ms: None,
            logging: LoggingConfig::default(),
        }
    }
}

impl RuntimeConfig {
    pub fn new_from_str(config_str: &str) -> Result<Self, anyhow::Error> {
        let config = toml::de::from_str::<RuntimeConfig>(config_str)
            .with_context(|| format!("failed to parse config file: {}", config_str))?;
        if config.default_timeout_ms == 0 {
            anyhow::bail!("default_timeout_ms must be greater than zero");
        }
        Ok(config)
    }

    pub fn from_file(config_path: &Path) -> Result<Self, anyhow::Error> {
        let config_str = std::fs::read_to_string(config_path)
            .with_context(|| format!("failed to read config file: {:?}", config_path))?;
        Self::new_from_str(&config_str)
    }

    pub fn default_timeout(&self) -> Duration {
        Duration::from_millis(self.default_timeout_ms)
    }

    pub fn simulated_latency(&self) -> Option<Duration> {
        self.simulated_latency_ms
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis)
    }

    pub fn dump(&self) -> String {
        toml::to_string_pretty(self).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn empty_config_uses_defaults() {
        let config = RuntimeConfig::new_from_str("").unwrap();
        assert_eq!(config, RuntimeConfig::default());
        assert_eq!(config.default_timeout(), Duration::from_secs(1));
        assert!(config.simulated_latency().is_none());
        assert!(config.logging.level.is_none());
    }

    #[test]
    fn full_config() {
        let config = RuntimeConfig::new_from_str(
            r#"
default_timeout_ms = 250
simulated_latency_ms = 40

[logging]
level = "debug"
"#,
        )
        .unwrap();
        assert_eq!(config.default_timeout(), Duration::from_millis(250));
        assert_eq!(config.simulated_latency(), Some(Duration::from_millis(40)));
        assert_eq!(config.logging.level.as_deref(), Some("debug"));

        let again = RuntimeConfig::new_from_str(&config.dump()).unwrap();
        assert_eq!(again, config);
    }

    #[test]
    fn bad_config_is_rejected() {
        assert!(RuntimeConfig::new_from_str("default_timeout_ms = 0").is_err());
        assert!(RuntimeConfig::new_from_str("default_timeout_ms = \"fast\"").is_err());
        assert!(RuntimeConfig::new_from_str("unknown_key = 1").is_err());
    }

    #[test]
    fn from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "simulated_latency_ms = 0").unwrap();
        let config = RuntimeConfig::from_file(file.path()).unwrap();
        assert!(config.simulated_latency().is_none());

        let err = RuntimeConfig::from_file(Path::new("/nonexistent/frog.toml")).unwrap_err();
        assert!(err.to_string().contains("failed to read config file"));
    }
}
