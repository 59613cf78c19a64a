// crates/metastore-harness-config/src/config.rs
// ============================================================================
// Module: Service Configuration
// Description: Immutable configuration for one embedded metastore instance.
// Purpose: Front-load every configuration error to build time.
// Dependencies: thiserror
// ============================================================================

//! ## Overview
//! [`ServiceConfiguration`] is produced only by
//! [`ServiceConfigurationBuilder::build`], which rejects any missing, empty,
//! duplicated, or out-of-range field. Required fields never receive silent
//! defaults; the optional knobs (readiness gate, cancel grace, engine log
//! artifact) carry explicit documented defaults.
//!
//! Derived settings (endpoint URI, connection URL, absolute directories) are
//! computed from the configuration on demand and never stored back into it.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::connection::derby_connection_url;
use crate::settings::MetastoreSettings;
use crate::settings::keys;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default fixed readiness delay, long enough for the endpoint to bind.
pub const DEFAULT_READINESS_DELAY: Duration = Duration::from_millis(5_000);
/// Default grace period granted to the launch thread after cancellation.
pub const DEFAULT_CANCEL_GRACE: Duration = Duration::from_millis(5_000);
/// Default engine log artifact, relative to the working directory.
pub const DEFAULT_ENGINE_LOG: &str = "derby.log";
/// Upper bound for any readiness wait.
const MAX_READINESS_WAIT: Duration = Duration::from_secs(600);
/// Upper bound for the cancel grace period.
const MAX_CANCEL_GRACE: Duration = Duration::from_secs(600);
/// Endpoint URI scheme.
const ENDPOINT_SCHEME: &str = "thrift";

// ============================================================================
// SECTION: Fields
// ============================================================================

/// Configuration fields reported by validation errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfigField {
    /// Metastore hostname.
    Hostname,
    /// Metastore port.
    Port,
    /// Persistent store directory.
    StoreDir,
    /// Scratch directory.
    ScratchDir,
    /// Warehouse directory.
    WarehouseDir,
    /// Service settings object.
    Settings,
    /// Readiness gate.
    Readiness,
    /// Launch cancel grace period.
    CancelGrace,
    /// Engine log artifact path.
    EngineLog,
}

impl ConfigField {
    /// Required fields in validation order.
    pub const REQUIRED: [Self; 6] = [
        Self::Hostname,
        Self::Port,
        Self::StoreDir,
        Self::ScratchDir,
        Self::WarehouseDir,
        Self::Settings,
    ];

    /// Returns a stable label for the field.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Hostname => "metastore hostname",
            Self::Port => "metastore port",
            Self::StoreDir => "metastore store dir",
            Self::ScratchDir => "scratch dir",
            Self::WarehouseDir => "warehouse dir",
            Self::Settings => "metastore settings",
            Self::Readiness => "readiness gate",
            Self::CancelGrace => "cancel grace",
            Self::EngineLog => "engine log",
        }
    }
}

impl fmt::Display for ConfigField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration errors.
///
/// # Invariants
/// - These are the only errors the harness surfaces to callers loudly.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A required field was never supplied or was empty.
    #[error("missing required config: {field}")]
    Missing {
        /// Missing field.
        field: ConfigField,
    },
    /// A field was supplied more than once.
    #[error("config supplied more than once: {field}")]
    Duplicate {
        /// Duplicated field.
        field: ConfigField,
    },
    /// A field value is out of range or malformed.
    #[error("invalid config {field}: {reason}")]
    Invalid {
        /// Offending field.
        field: ConfigField,
        /// Human-readable reason.
        reason: String,
    },
    /// I/O failure while reading a config file.
    #[error("config io error: {0}")]
    Io(String),
    /// TOML parsing error.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Config file violates size, path, or value limits.
    #[error("invalid config file: {0}")]
    File(String),
}

// ============================================================================
// SECTION: Readiness
// ============================================================================

/// Strategy used to decide when a launched service may be used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadinessGate {
    /// Blind fixed sleep; readiness is assumed once it elapses.
    FixedDelay {
        /// Sleep duration.
        delay: Duration,
    },
    /// Poll a TCP connect against the endpoint until it succeeds.
    PollEndpoint {
        /// Total time budget.
        timeout: Duration,
        /// Delay between attempts.
        interval: Duration,
    },
}

impl ReadinessGate {
    /// Returns a fixed-delay gate.
    #[must_use]
    pub const fn fixed_delay(delay: Duration) -> Self {
        Self::FixedDelay {
            delay,
        }
    }

    /// Returns an endpoint-polling gate.
    #[must_use]
    pub const fn poll_endpoint(timeout: Duration, interval: Duration) -> Self {
        Self::PollEndpoint {
            timeout,
            interval,
        }
    }

    /// Returns the longest time the gate may block.
    #[must_use]
    pub const fn budget(&self) -> Duration {
        match self {
            Self::FixedDelay {
                delay,
            } => *delay,
            Self::PollEndpoint {
                timeout, ..
            } => *timeout,
        }
    }

    /// Validates gate bounds.
    fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |reason: &str| ConfigError::Invalid {
            field: ConfigField::Readiness,
            reason: reason.to_string(),
        };
        if self.budget() > MAX_READINESS_WAIT {
            return Err(invalid("wait exceeds 600s"));
        }
        if let Self::PollEndpoint {
            timeout,
            interval,
        } = self
        {
            if timeout.is_zero() || interval.is_zero() {
                return Err(invalid("poll timeout and interval must be greater than zero"));
            }
            if interval > timeout {
                return Err(invalid("poll interval must not exceed timeout"));
            }
        }
        Ok(())
    }
}

impl Default for ReadinessGate {
    fn default() -> Self {
        Self::fixed_delay(DEFAULT_READINESS_DELAY)
    }
}

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Immutable, fully specified configuration for one service instance.
///
/// # Invariants
/// - Hostname and every directory are non-empty UTF-8 text.
/// - Port is non-zero.
/// - Accessors return exactly the values supplied to the builder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfiguration {
    /// Metastore hostname.
    hostname: String,
    /// Metastore port.
    port: u16,
    /// Persistent store directory.
    store_dir: PathBuf,
    /// Scratch directory.
    scratch_dir: PathBuf,
    /// Warehouse directory.
    warehouse_dir: PathBuf,
    /// Caller-supplied service settings.
    settings: MetastoreSettings,
    /// Readiness gate.
    readiness: ReadinessGate,
    /// Grace period for launch cancellation.
    cancel_grace: Duration,
    /// Engine log artifact path.
    engine_log: PathBuf,
}

impl ServiceConfiguration {
    /// Returns a new builder.
    #[must_use]
    pub fn builder() -> ServiceConfigurationBuilder {
        ServiceConfigurationBuilder::default()
    }

    /// Returns the metastore hostname.
    #[must_use]
    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    /// Returns the metastore port.
    #[must_use]
    pub const fn port(&self) -> u16 {
        self.port
    }

    /// Returns the persistent store directory.
    #[must_use]
    pub fn store_dir(&self) -> &Path {
        &self.store_dir
    }

    /// Returns the scratch directory.
    #[must_use]
    pub fn scratch_dir(&self) -> &Path {
        &self.scratch_dir
    }

    /// Returns the warehouse directory.
    #[must_use]
    pub fn warehouse_dir(&self) -> &Path {
        &self.warehouse_dir
    }

    /// Returns the caller-supplied settings (without derived keys).
    #[must_use]
    pub const fn settings(&self) -> &MetastoreSettings {
        &self.settings
    }

    /// Returns the readiness gate.
    #[must_use]
    pub const fn readiness(&self) -> ReadinessGate {
        self.readiness
    }

    /// Returns the launch cancel grace period.
    #[must_use]
    pub const fn cancel_grace(&self) -> Duration {
        self.cancel_grace
    }

    /// Returns the engine log artifact path as configured.
    #[must_use]
    pub fn engine_log(&self) -> &Path {
        &self.engine_log
    }

    /// Returns the endpoint URI, `thrift://<host>:<port>`.
    #[must_use]
    pub fn endpoint_uri(&self) -> String {
        format!("{ENDPOINT_SCHEME}://{}:{}", self.hostname, self.port)
    }

    /// Returns the persistent store connection URL.
    #[must_use]
    pub fn connection_url(&self) -> String {
        derby_connection_url(&self.store_dir.to_string_lossy())
    }

    /// Returns the caller settings overlaid with every derived key.
    ///
    /// Scratch, warehouse, and engine log paths are made absolute against the
    /// current working directory without touching the file system.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when a path cannot be made absolute.
    pub fn derived_settings(&self) -> Result<MetastoreSettings, ConfigError> {
        let mut settings = self.settings.clone();
        settings.set(keys::METASTORE_URIS, self.endpoint_uri());
        settings
            .set(keys::SCRATCH_DIR, absolute_text(&self.scratch_dir, ConfigField::ScratchDir)?);
        settings.set(keys::CONNECTION_URL, self.connection_url());
        settings.set(
            keys::WAREHOUSE_DIR,
            absolute_text(&self.warehouse_dir, ConfigField::WarehouseDir)?,
        );
        settings.set_bool(keys::IN_TEST, true);
        settings
            .set(keys::ENGINE_LOG_FILE, absolute_text(&self.engine_log, ConfigField::EngineLog)?);
        Ok(settings)
    }

    /// Returns the engine log artifact resolved against the working directory.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when the path cannot be made absolute.
    pub fn engine_log_absolute(&self) -> Result<PathBuf, ConfigError> {
        std::path::absolute(&self.engine_log).map_err(|err| ConfigError::Invalid {
            field: ConfigField::EngineLog,
            reason: err.to_string(),
        })
    }
}

// ============================================================================
// SECTION: Builder
// ============================================================================

/// Accumulates configuration parameters and validates them on build.
///
/// # Invariants
/// - Each parameter is accepted once; repeats are reported by `build`.
#[derive(Debug, Clone, Default)]
pub struct ServiceConfigurationBuilder {
    /// Metastore hostname.
    hostname: Option<String>,
    /// Metastore port.
    port: Option<u16>,
    /// Persistent store directory.
    store_dir: Option<PathBuf>,
    /// Scratch directory.
    scratch_dir: Option<PathBuf>,
    /// Warehouse directory.
    warehouse_dir: Option<PathBuf>,
    /// Service settings.
    settings: Option<MetastoreSettings>,
    /// Readiness gate override.
    readiness: Option<ReadinessGate>,
    /// Cancel grace override.
    cancel_grace: Option<Duration>,
    /// Engine log artifact override.
    engine_log: Option<PathBuf>,
    /// Fields supplied more than once.
    duplicates: Vec<ConfigField>,
}

impl ServiceConfigurationBuilder {
    /// Sets the metastore hostname.
    #[must_use]
    pub fn hostname(mut self, hostname: impl Into<String>) -> Self {
        assign(&mut self.hostname, hostname.into(), ConfigField::Hostname, &mut self.duplicates);
        self
    }

    /// Sets the metastore port.
    #[must_use]
    pub fn port(mut self, port: u16) -> Self {
        assign(&mut self.port, port, ConfigField::Port, &mut self.duplicates);
        self
    }

    /// Sets the persistent store directory.
    #[must_use]
    pub fn store_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        assign(&mut self.store_dir, dir.into(), ConfigField::StoreDir, &mut self.duplicates);
        self
    }

    /// Sets the scratch directory.
    #[must_use]
    pub fn scratch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        assign(&mut self.scratch_dir, dir.into(), ConfigField::ScratchDir, &mut self.duplicates);
        self
    }

    /// Sets the warehouse directory.
    #[must_use]
    pub fn warehouse_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        assign(
            &mut self.warehouse_dir,
            dir.into(),
            ConfigField::WarehouseDir,
            &mut self.duplicates,
        );
        self
    }

    /// Sets the service settings object.
    #[must_use]
    pub fn settings(mut self, settings: MetastoreSettings) -> Self {
        assign(&mut self.settings, settings, ConfigField::Settings, &mut self.duplicates);
        self
    }

    /// Overrides the readiness gate.
    #[must_use]
    pub fn readiness(mut self, gate: ReadinessGate) -> Self {
        assign(&mut self.readiness, gate, ConfigField::Readiness, &mut self.duplicates);
        self
    }

    /// Overrides the launch cancel grace period.
    #[must_use]
    pub fn cancel_grace(mut self, grace: Duration) -> Self {
        assign(&mut self.cancel_grace, grace, ConfigField::CancelGrace, &mut self.duplicates);
        self
    }

    /// Overrides the engine log artifact path.
    #[must_use]
    pub fn engine_log(mut self, path: impl Into<PathBuf>) -> Self {
        assign(&mut self.engine_log, path.into(), ConfigField::EngineLog, &mut self.duplicates);
        self
    }

    /// Validates the accumulated parameters.
    ///
    /// Missing fields are reported first (in [`ConfigField::REQUIRED`] order),
    /// then duplicates, then invalid values.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] naming the first offending field.
    pub fn build(self) -> Result<ServiceConfiguration, ConfigError> {
        let hostname = self
            .hostname
            .filter(|host| !host.trim().is_empty())
            .ok_or(ConfigError::Missing {
                field: ConfigField::Hostname,
            })?;
        let port = self.port.ok_or(ConfigError::Missing {
            field: ConfigField::Port,
        })?;
        let store_dir = required_path(self.store_dir, ConfigField::StoreDir)?;
        let scratch_dir = required_path(self.scratch_dir, ConfigField::ScratchDir)?;
        let warehouse_dir = required_path(self.warehouse_dir, ConfigField::WarehouseDir)?;
        let settings = self.settings.ok_or(ConfigError::Missing {
            field: ConfigField::Settings,
        })?;
        if let Some(field) = self.duplicates.first() {
            return Err(ConfigError::Duplicate {
                field: *field,
            });
        }

        if hostname.chars().any(char::is_whitespace) {
            return Err(ConfigError::Invalid {
                field: ConfigField::Hostname,
                reason: "hostname must not contain whitespace".to_string(),
            });
        }
        if port == 0 {
            return Err(ConfigError::Invalid {
                field: ConfigField::Port,
                reason: "port must be greater than zero".to_string(),
            });
        }
        let readiness = self.readiness.unwrap_or_default();
        readiness.validate()?;
        let cancel_grace = self.cancel_grace.unwrap_or(DEFAULT_CANCEL_GRACE);
        if cancel_grace.is_zero() || cancel_grace > MAX_CANCEL_GRACE {
            return Err(ConfigError::Invalid {
                field: ConfigField::CancelGrace,
                reason: "cancel grace must be between 1ms and 600s".to_string(),
            });
        }
        let engine_log = match self.engine_log {
            Some(path) => required_path(Some(path), ConfigField::EngineLog)?,
            None => PathBuf::from(DEFAULT_ENGINE_LOG),
        };

        Ok(ServiceConfiguration {
            hostname,
            port,
            store_dir,
            scratch_dir,
            warehouse_dir,
            settings,
            readiness,
            cancel_grace,
            engine_log,
        })
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Stores `value` in `slot`, recording `field` when it was already set.
fn assign<T>(
    slot: &mut Option<T>,
    value: T,
    field: ConfigField,
    duplicates: &mut Vec<ConfigField>,
) {
    if slot.replace(value).is_some() && !duplicates.contains(&field) {
        duplicates.push(field);
    }
}

/// Requires a non-empty UTF-8 path without surrounding whitespace.
fn required_path(path: Option<PathBuf>, field: ConfigField) -> Result<PathBuf, ConfigError> {
    let path = path.filter(|path| !path.as_os_str().is_empty()).ok_or(ConfigError::Missing {
        field,
    })?;
    let Some(text) = path.to_str() else {
        return Err(ConfigError::Invalid {
            field,
            reason: "path must be valid utf-8".to_string(),
        });
    };
    if text.trim() != text {
        return Err(ConfigError::Invalid {
            field,
            reason: "path must not start or end with whitespace".to_string(),
        });
    }
    Ok(path)
}

/// Resolves `path` against the working directory and returns it as text.
fn absolute_text(path: &Path, field: ConfigField) -> Result<String, ConfigError> {
    let absolute = std::path::absolute(path).map_err(|err| ConfigError::Invalid {
        field,
        reason: err.to_string(),
    })?;
    absolute.into_os_string().into_string().map_err(|_| ConfigError::Invalid {
        field,
        reason: "absolute path must be valid utf-8".to_string(),
    })
}
