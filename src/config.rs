//! YAML configuration file support.
//!
//! One file configures every component. Sections are optional and fall back
//! to the component defaults; durations are written in milliseconds.
//!
//! ## Example YAML Configuration
//!
//! ```yaml
//! version: "1.0"
//! name: "search-box"
//!
//! debounce:
//!   wait: 250
//!   leading: false
//!   trailing: true
//!   max_wait: 1000
//!
//! throttle:
//!   wait: 100
//!   leading: true
//!   trailing: true
//!
//! limiter:
//!   max_concurrency: 8
//!   default_permits: 4
//!   semaphores:
//!     api.example.com: 2
//!
//! retry:
//!   max_retries: 3
//!   base_delay: 100
//!   max_delay: 10000
//!   jitter: true
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::num::NonZeroUsize;
use std::path::Path;

use limiter::{RetryConfig, SemaphoreManager};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use timing::{DebounceConfig, ThrottleConfig};

/// Errors that can occur when loading YAML configuration files
#[derive(Debug, Error)]
pub enum ConfigLoadError {
    #[error("failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    #[error("failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("unsupported config version: {0}")]
    UnsupportedVersion(String),
}

/// Top-level YAML configuration for every runctl component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ControlConfig {
    /// Configuration format version
    pub version: String,

    /// Optional configuration name/description
    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub debounce: DebounceConfig,

    #[serde(default)]
    pub throttle: ThrottleConfig,

    #[serde(default)]
    pub limiter: LimiterYamlConfig,

    #[serde(default)]
    pub retry: RetryConfig,
}

impl ControlConfig {
    /// Load a YAML configuration file from the given path
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigLoadError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        tracing::debug!(path = %path.display(), "loading control config");
        Self::from_yaml_str(&content)
    }

    /// Parse YAML configuration from a string
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigLoadError> {
        let config: ControlConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize back to YAML.
    pub fn to_yaml_string(&self) -> Result<String, ConfigLoadError> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigLoadError> {
        match self.version.as_str() {
            "1.0" | "1" => Ok(()),
            v => Err(ConfigLoadError::UnsupportedVersion(v.to_string())),
        }?;

        self.debounce
            .validate()
            .map_err(|e| ConfigLoadError::Validation(format!("debounce: {e}")))?;
        self.throttle
            .validate()
            .map_err(|e| ConfigLoadError::Validation(format!("throttle: {e}")))?;
        self.retry
            .validate()
            .map_err(|e| ConfigLoadError::Validation(format!("retry: {e}")))?;
        self.limiter.validate()?;

        Ok(())
    }
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            name: None,
            debounce: DebounceConfig::default(),
            throttle: ThrottleConfig::default(),
            limiter: LimiterYamlConfig::default(),
            retry: RetryConfig::default(),
        }
    }
}

/// Bounded runner and keyed semaphore settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LimiterYamlConfig {
    /// Limit passed to `run_limited`.
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    /// Permits for keyed semaphores not listed in `semaphores`.
    #[serde(default = "default_permits")]
    pub default_permits: usize,

    /// Pre-sized keyed semaphores.
    #[serde(default)]
    pub semaphores: BTreeMap<String, usize>,
}

impl LimiterYamlConfig {
    fn validate(&self) -> Result<(), ConfigLoadError> {
        if self.max_concurrency == 0 {
            return Err(ConfigLoadError::Validation(
                "limiter.max_concurrency must be >= 1".to_string(),
            ));
        }
        if self.default_permits == 0 {
            return Err(ConfigLoadError::Validation(
                "limiter.default_permits must be >= 1".to_string(),
            ));
        }
        if let Some((key, _)) = self.semaphores.iter().find(|(_, permits)| **permits == 0) {
            return Err(ConfigLoadError::Validation(format!(
                "limiter.semaphores.{key} must be >= 1"
            )));
        }
        Ok(())
    }

    /// `max_concurrency` as a runner limit.
    pub fn limit(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.max_concurrency).unwrap_or(NonZeroUsize::MIN)
    }

    /// Build a registry with every configured semaphore already created.
    pub fn semaphore_manager(&self) -> SemaphoreManager {
        let manager = SemaphoreManager::new(self.default_permits);
        for (key, permits) in &self.semaphores {
            manager.get_or_create_with_permits(key, *permits);
        }
        manager
    }
}

impl Default for LimiterYamlConfig {
    fn default() -> Self {
        Self {
            max_concurrency: default_max_concurrency(),
            default_permits: default_permits(),
            semaphores: BTreeMap::new(),
        }
    }
}

// Helper functions for serde defaults
fn default_max_concurrency() -> usize {
    4
}
fn default_permits() -> usize {
    4
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::time::Duration;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_valid_yaml() {
        let yaml = r#"
version: "1.0"
name: "test config"
debounce:
  wait: 250
  max_wait: 1000
limiter:
  max_concurrency: 2
"#;

        let config = ControlConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(config.name, Some("test config".to_string()));
        assert_eq!(config.debounce.wait, Duration::from_millis(250));
        assert_eq!(config.debounce.max_wait, Some(Duration::from_millis(1000)));
        assert!(config.debounce.trailing);
        assert_eq!(config.limiter.limit().get(), 2);
        assert_eq!(config.throttle, ThrottleConfig::default());
    }

    #[test]
    fn test_load_from_file() {
        let yaml = r#"
version: "1"
throttle:
  wait: 40
  trailing: false
"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(yaml.as_bytes()).unwrap();

        let config = ControlConfig::from_file(temp_file.path()).unwrap();
        assert_eq!(config.throttle.wait, Duration::from_millis(40));
        assert!(config.throttle.leading);
        assert!(!config.throttle.trailing);
    }

    #[test]
    fn test_missing_file() {
        let err = ControlConfig::from_file("/definitely/not/here.yaml").unwrap_err();
        assert!(matches!(err, ConfigLoadError::FileRead(_)));
    }

    #[test]
    fn test_default_config() {
        let config = ControlConfig::default();
        assert_eq!(config.version, "1.0");
        assert!(config.name.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_unsupported_version() {
        let err = ControlConfig::from_yaml_str("version: \"2.0\"").unwrap_err();
        assert!(matches!(err, ConfigLoadError::UnsupportedVersion(v) if v == "2.0"));
    }

    #[test]
    fn test_malformed_yaml() {
        let err = ControlConfig::from_yaml_str("version: [unclosed").unwrap_err();
        assert!(matches!(err, ConfigLoadError::YamlParse(_)));
    }

    #[test]
    fn test_debounce_validation() {
        let yaml = r#"
version: "1.0"
debounce:
  leading: false
  trailing: false
"#;

        let err = ControlConfig::from_yaml_str(yaml).unwrap_err();
        assert!(matches!(err, ConfigLoadError::Validation(_)));
        assert!(err.to_string().contains("debounce"));
    }

    #[test]
    fn test_limiter_validation() {
        let yaml = r#"
version: "1.0"
limiter:
  semaphores:
    upstream: 0
"#;

        let err = ControlConfig::from_yaml_str(yaml).unwrap_err();
        assert!(err.to_string().contains("limiter.semaphores.upstream"));

        let err = ControlConfig::from_yaml_str("version: \"1.0\"\nlimiter:\n  max_concurrency: 0\n")
            .unwrap_err();
        assert!(err.to_string().contains("max_concurrency"));
    }

    #[test]
    fn test_semaphore_manager_is_presized() {
        let yaml = r#"
version: "1.0"
limiter:
  default_permits: 3
  semaphores:
    a: 1
    b: 5
"#;

        let config = ControlConfig::from_yaml_str(yaml).unwrap();
        let manager = config.limiter.semaphore_manager();
        let stats = manager.stats();
        assert_eq!(stats.len(), 2);
        assert_eq!((stats[0].key.as_str(), stats[0].capacity), ("a", 1));
        assert_eq!((stats[1].key.as_str(), stats[1].capacity), ("b", 5));
        assert_eq!(manager.get_or_create("c").capacity(), 3);
    }

    #[test]
    fn test_yaml_roundtrip() {
        let mut config = ControlConfig::default();
        config.name = Some("roundtrip".into());
        config.debounce = config.debounce.with_max_wait(Duration::from_millis(500));
        config.limiter.semaphores.insert("db".into(), 2);

        let yaml = config.to_yaml_string().unwrap();
        let parsed = ControlConfig::from_yaml_str(&yaml).unwrap();
        assert_eq!(parsed, config);
    }
}
