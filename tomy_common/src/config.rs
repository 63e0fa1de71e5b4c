//! Configuration loading traits and types.
//!
//! This module provides a standardized way to load TOML configuration files
//! across all tomy processes.
//!
//! # Usage
//!
//! ```rust,no_run
//! use tomy_common::config::{ConfigError, FrameConfig};
//! use std::path::Path;
//!
//! fn main() -> Result<(), ConfigError> {
//!     let config = FrameConfig::load_validated(Path::new("param.conf"))?;
//!     println!("Service: {}", config.shared.service_name);
//!     Ok(())
//! }
//! ```

use crate::consts::{
    DEFAULT_RB_MUTEX_KEY, DEFAULT_RB_SEMAPHORE_NAME, DEFAULT_RINGBUFFER_KEY, PARAM_MAX,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Error type for configuration loading operations.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    /// Configuration file not found at specified path.
    #[error("Configuration file not found")]
    FileNotFound,

    /// TOML parsing failed.
    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    /// Semantic validation failed.
    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

/// Log level for application logging.
///
/// Uses lowercase serde values for TOML compatibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Most verbose, detailed tracing information.
    Trace,
    /// Debug information useful during development.
    Debug,
    /// General information about application operation.
    #[default]
    Info,
    /// Warning messages for potentially problematic situations.
    Warn,
    /// Error messages for serious problems.
    Error,
}

impl LogLevel {
    /// Directive string understood by `tracing_subscriber::EnvFilter`.
    pub const fn as_directive(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

/// Common configuration fields shared across all tomy processes.
///
/// # TOML Example
///
/// ```toml
/// [shared]
/// log_level = "debug"
/// service_name = "gateway-01"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SharedConfig {
    /// Logging verbosity level.
    #[serde(default)]
    pub log_level: LogLevel,

    /// Application instance identifier.
    pub service_name: String,
}

impl SharedConfig {
    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationError` if `service_name` is empty.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.service_name.is_empty() {
            return Err(ConfigError::ValidationError(
                "service_name cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Resolved names of the three named resources behind the log ring buffer.
///
/// The two keys are paths to existing files; the shared segments are derived
/// from them. The signal name is a POSIX semaphore name (`/name`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RingBufferConfig {
    /// Key file for the ring buffer segment.
    pub segment_key: PathBuf,
    /// Key file for the lock guarding the segment.
    pub lock_key: PathBuf,
    /// Semaphore posted once per record written.
    pub signal_name: String,
}

impl Default for RingBufferConfig {
    fn default() -> Self {
        Self {
            segment_key: PathBuf::from(DEFAULT_RINGBUFFER_KEY),
            lock_key: PathBuf::from(DEFAULT_RB_MUTEX_KEY),
            signal_name: DEFAULT_RB_SEMAPHORE_NAME.to_string(),
        }
    }
}

impl RingBufferConfig {
    /// Validate the semaphore name and key paths.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let name = self.signal_name.as_str();
        if name.len() < 2 || !name.starts_with('/') || name[1..].contains('/') {
            return Err(ConfigError::ValidationError(format!(
                "signal_name must look like \"/name\", got {name:?}"
            )));
        }
        if self.segment_key.as_os_str().is_empty() || self.lock_key.as_os_str().is_empty() {
            return Err(ConfigError::ValidationError(
                "ring buffer keys cannot be empty".to_string(),
            ));
        }
        if self.segment_key == self.lock_key {
            return Err(ConfigError::ValidationError(
                "segment_key and lock_key must differ".to_string(),
            ));
        }
        Ok(())
    }
}

/// Complete configuration of one framework process.
///
/// # TOML Example
///
/// ```toml
/// [shared]
/// service_name = "gateway"
///
/// [ring_buffer]
/// segment_key = "/usr/local/etc/tomygateway/config/ringbuffer.key"
/// lock_key = "/usr/local/etc/tomygateway/config/rbmutex.key"
/// signal_name = "/rbsemaphor"
///
/// [params]
/// BrokerName = "localhost"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrameConfig {
    /// Common fields.
    pub shared: SharedConfig,

    /// Ring buffer resource names.
    #[serde(default)]
    pub ring_buffer: RingBufferConfig,

    /// Free-form parameters served by `getParam`-style lookups.
    #[serde(default)]
    pub params: BTreeMap<String, String>,
}

impl FrameConfig {
    /// Configuration with defaults and the given service name.
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            shared: SharedConfig {
                log_level: LogLevel::default(),
                service_name: service_name.into(),
            },
            ring_buffer: RingBufferConfig::default(),
            params: BTreeMap::new(),
        }
    }

    /// Validate all sections.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.shared.validate()?;
        self.ring_buffer.validate()?;
        if self.params.len() > PARAM_MAX {
            return Err(ConfigError::ValidationError(format!(
                "too many params: {} (max {PARAM_MAX})",
                self.params.len()
            )));
        }
        Ok(())
    }

    /// Load from a TOML file and validate.
    pub fn load_validated(path: &Path) -> Result<Self, ConfigError> {
        let config = Self::load(path)?;
        config.validate()?;
        tracing::debug!(
            path = %path.display(),
            service = %config.shared.service_name,
            params = config.params.len(),
            "Frame configuration loaded"
        );
        Ok(config)
    }

    /// Look up one `[params]` entry.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }
}

/// Trait for loading configuration from TOML files.
///
/// # Contract
///
/// - Returns `ConfigError::FileNotFound` if the file does not exist
/// - Returns `ConfigError::ParseError` if TOML syntax is invalid
pub trait ConfigLoader: Sized + serde::de::DeserializeOwned {
    /// Load configuration from a TOML file.
    fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::FileNotFound
            } else {
                ConfigError::ParseError(e.to_string())
            }
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }
}

// Blanket implementation: any serde-deserializable struct can use ConfigLoader.
impl<T: serde::de::DeserializeOwned> ConfigLoader for T {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_log_level_default() {
        assert_eq!(LogLevel::default(), LogLevel::Info);
        assert_eq!(LogLevel::Warn.as_directive(), "warn");
    }

    #[test]
    fn test_log_level_deserialization() {
        #[derive(Debug, Deserialize, PartialEq)]
        struct TestWrapper {
            level: LogLevel,
        }

        assert_eq!(
            toml::from_str::<TestWrapper>("level = \"trace\"").unwrap().level,
            LogLevel::Trace
        );
        assert_eq!(
            toml::from_str::<TestWrapper>("level = \"error\"").unwrap().level,
            LogLevel::Error
        );
    }

    #[test]
    fn test_shared_config_validation_empty_service_name() {
        let config = SharedConfig {
            log_level: LogLevel::Info,
            service_name: "".to_string(),
        };
        assert!(matches!(config.validate(), Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn test_ring_buffer_defaults() {
        let rb = RingBufferConfig::default();
        assert_eq!(rb.signal_name, "/rbsemaphor");
        assert!(rb.segment_key.ends_with("ringbuffer.key"));
        assert!(rb.validate().is_ok());
    }

    #[test]
    fn test_ring_buffer_rejects_bad_signal_name() {
        let mut rb = RingBufferConfig::default();
        rb.signal_name = "rbsemaphor".to_string();
        assert!(rb.validate().is_err());
        rb.signal_name = "/a/b".to_string();
        assert!(rb.validate().is_err());
    }

    #[test]
    fn test_ring_buffer_rejects_shared_key() {
        let mut rb = RingBufferConfig::default();
        rb.lock_key = rb.segment_key.clone();
        assert!(rb.validate().is_err());
    }

    #[test]
    fn test_too_many_params() {
        let mut config = FrameConfig::new("svc");
        for i in 0..=PARAM_MAX {
            config.params.insert(format!("key{i}"), "v".to_string());
        }
        assert!(matches!(config.validate(), Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn test_config_loader_file_not_found() {
        let result = FrameConfig::load(Path::new("/nonexistent/path/param.conf"));
        assert!(matches!(result, Err(ConfigError::FileNotFound)));
    }

    #[test]
    fn test_config_loader_parse_error() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "invalid toml {{{{").unwrap();

        let result = FrameConfig::load(file.path());
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_frame_config_load() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[shared]
log_level = "debug"
service_name = "gateway"

[ring_buffer]
segment_key = "/tmp/rb.key"
lock_key = "/tmp/rbmutex.key"
signal_name = "/rbtest"

[params]
BrokerName = "localhost"
BrokerPortNo = "1883"
"#
        )
        .unwrap();
        file.flush().unwrap();

        let config = FrameConfig::load_validated(file.path()).unwrap();
        assert_eq!(config.shared.log_level, LogLevel::Debug);
        assert_eq!(config.ring_buffer.signal_name, "/rbtest");
        assert_eq!(config.param("BrokerPortNo"), Some("1883"));
        assert_eq!(config.param("Missing"), None);
    }

    #[test]
    fn test_frame_config_defaults_sections() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "[shared]\nservice_name = \"monitor\"\n").unwrap();
        file.flush().unwrap();

        let config = FrameConfig::load_validated(file.path()).unwrap();
        assert_eq!(config.ring_buffer, RingBufferConfig::default());
        assert!(config.params.is_empty());
    }
}
