// crates/metastore-harness-config/src/file.rs
// ============================================================================
// Module: Harness Config File
// Description: TOML property loading for the metastore harness.
// Purpose: Feed file-based properties through the validating builder.
// Dependencies: serde, toml
// ============================================================================

//! ## Overview
//! Test suites usually keep their metastore parameters in a property file.
//! [`HarnessConfigFile`] reads that file with hard size and path limits and
//! converts it into a [`ServiceConfigurationBuilder`]. Every field is optional
//! at the file level so that missing parameters are reported by the builder
//! with the same [`ConfigError::Missing`] error as programmatic use.
//!
//! ```toml
//! [metastore]
//! hostname = "localhost"
//! port = 9933
//! store_dir = "/tmp/ms-db"
//! scratch_dir = "/tmp/scratch"
//! warehouse_dir = "/tmp/warehouse"
//!
//! [metastore.settings]
//! "hive.compactor.worker.threads" = 5
//!
//! [readiness]
//! mode = "poll_endpoint"
//! timeout_ms = 10000
//! interval_ms = 100
//! ```

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::config::ConfigError;
use crate::config::ReadinessGate;
use crate::config::ServiceConfiguration;
use crate::config::ServiceConfigurationBuilder;
use crate::settings::MetastoreSettings;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default configuration filename when no path is specified.
const DEFAULT_CONFIG_NAME: &str = "metastore-harness.toml";
/// Environment variable used to override the config path.
pub const CONFIG_ENV_VAR: &str = "METASTORE_HARNESS_CONFIG";
/// Maximum configuration file size in bytes.
const MAX_CONFIG_FILE_SIZE: usize = 256 * 1024;
/// Maximum length of a single path component.
const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
const MAX_TOTAL_PATH_LENGTH: usize = 4096;

// ============================================================================
// SECTION: File Model
// ============================================================================

/// Parsed harness config file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HarnessConfigFile {
    /// Metastore parameters.
    #[serde(default)]
    pub metastore: MetastoreSection,
    /// Optional readiness gate override.
    #[serde(default)]
    pub readiness: Option<ReadinessSection>,
}

/// `[metastore]` table.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MetastoreSection {
    /// Metastore hostname.
    pub hostname: Option<String>,
    /// Metastore port.
    pub port: Option<u16>,
    /// Persistent store directory.
    pub store_dir: Option<PathBuf>,
    /// Scratch directory.
    pub scratch_dir: Option<PathBuf>,
    /// Warehouse directory.
    pub warehouse_dir: Option<PathBuf>,
    /// Engine log artifact override.
    pub engine_log: Option<PathBuf>,
    /// Cancel grace override in milliseconds.
    pub cancel_grace_ms: Option<u64>,
    /// Service settings; scalar values are converted to text.
    pub settings: Option<BTreeMap<String, toml::Value>>,
}

/// `[readiness]` table.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case", deny_unknown_fields)]
pub enum ReadinessSection {
    /// Fixed sleep.
    FixedDelay {
        /// Sleep duration in milliseconds.
        delay_ms: u64,
    },
    /// Endpoint polling.
    PollEndpoint {
        /// Total budget in milliseconds.
        timeout_ms: u64,
        /// Delay between attempts in milliseconds.
        interval_ms: u64,
    },
}

impl From<ReadinessSection> for ReadinessGate {
    fn from(section: ReadinessSection) -> Self {
        match section {
            ReadinessSection::FixedDelay {
                delay_ms,
            } => Self::fixed_delay(Duration::from_millis(delay_ms)),
            ReadinessSection::PollEndpoint {
                timeout_ms,
                interval_ms,
            } => Self::poll_endpoint(
                Duration::from_millis(timeout_ms),
                Duration::from_millis(interval_ms),
            ),
        }
    }
}

impl HarnessConfigFile {
    /// Loads the config file using the default resolution rules.
    ///
    /// Resolution order: explicit `path`, then [`CONFIG_ENV_VAR`], then
    /// `metastore-harness.toml` in the working directory.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the file cannot be read or parsed.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let resolved = resolve_path(path)?;
        validate_path(&resolved)?;
        let bytes = fs::read(&resolved).map_err(|err| ConfigError::Io(err.to_string()))?;
        if bytes.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::File("config file exceeds size limit".to_string()));
        }
        let content = std::str::from_utf8(&bytes)
            .map_err(|_| ConfigError::File("config file must be utf-8".to_string()))?;
        Self::from_toml_str(content)
    }

    /// Parses config file content.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when the TOML is malformed or has unknown
    /// keys.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Converts the file into a builder.
    ///
    /// Only parameters present in the file are applied, so callers may add the
    /// rest programmatically before `build`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::File`] when a settings value is not a scalar.
    pub fn into_builder(self) -> Result<ServiceConfigurationBuilder, ConfigError> {
        let section = self.metastore;
        let mut builder = ServiceConfiguration::builder();
        if let Some(hostname) = section.hostname {
            builder = builder.hostname(hostname);
        }
        if let Some(port) = section.port {
            builder = builder.port(port);
        }
        if let Some(dir) = section.store_dir {
            builder = builder.store_dir(dir);
        }
        if let Some(dir) = section.scratch_dir {
            builder = builder.scratch_dir(dir);
        }
        if let Some(dir) = section.warehouse_dir {
            builder = builder.warehouse_dir(dir);
        }
        if let Some(path) = section.engine_log {
            builder = builder.engine_log(path);
        }
        if let Some(grace_ms) = section.cancel_grace_ms {
            builder = builder.cancel_grace(Duration::from_millis(grace_ms));
        }
        if let Some(values) = section.settings {
            builder = builder.settings(settings_from_toml(values)?);
        }
        if let Some(readiness) = self.readiness {
            builder = builder.readiness(readiness.into());
        }
        Ok(builder)
    }

    /// Converts the file into a validated configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the file is incomplete or invalid.
    pub fn build(self) -> Result<ServiceConfiguration, ConfigError> {
        self.into_builder()?.build()
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Converts a TOML settings table into text settings.
fn settings_from_toml(
    values: BTreeMap<String, toml::Value>,
) -> Result<MetastoreSettings, ConfigError> {
    let mut settings = MetastoreSettings::new();
    for (key, value) in values {
        let text = match value {
            toml::Value::String(text) => text,
            toml::Value::Integer(number) => number.to_string(),
            toml::Value::Float(number) => number.to_string(),
            toml::Value::Boolean(flag) => flag.to_string(),
            toml::Value::Datetime(stamp) => stamp.to_string(),
            toml::Value::Array(_) | toml::Value::Table(_) => {
                return Err(ConfigError::File(format!(
                    "metastore.settings.{key} must be a scalar value"
                )));
            }
        };
        settings.set(key, text);
    }
    Ok(settings)
}

/// Resolves the config path from the argument or environment defaults.
fn resolve_path(path: Option<&Path>) -> Result<PathBuf, ConfigError> {
    if let Some(path) = path {
        return Ok(path.to_path_buf());
    }
    if let Ok(env_path) = env::var(CONFIG_ENV_VAR) {
        if env_path.len() > MAX_TOTAL_PATH_LENGTH {
            return Err(ConfigError::File("config path exceeds max length".to_string()));
        }
        return Ok(PathBuf::from(env_path));
    }
    Ok(PathBuf::from(DEFAULT_CONFIG_NAME))
}

/// Validates the resolved path against length limits.
fn validate_path(path: &Path) -> Result<(), ConfigError> {
    let text = path.to_string_lossy();
    if text.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::File("config path exceeds max length".to_string()));
    }
    for component in path.components() {
        if component.as_os_str().len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::File("config path component too long".to_string()));
        }
    }
    Ok(())
}
