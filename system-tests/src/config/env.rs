// system-tests/src/config/env.rs
// ============================================================================
// Module: System Test Environment
// Description: Environment-backed configuration for system tests.
// Purpose: Centralize env parsing with strict UTF-8 validation.
// Dependencies: std
// ============================================================================

//! ## Overview
//! Environment values are parsed with strict UTF-8 enforcement to avoid silent
//! misconfiguration. Invalid UTF-8 fails closed.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::PathBuf;
use std::time::Duration;

// ============================================================================
// SECTION: Environment Constants
// ============================================================================

/// Port used by the canonical localhost scenario unless overridden.
pub const DEFAULT_CANONICAL_PORT: u16 = 9933;
/// Root holding `ms-db`, `scratch`, and `warehouse` for the canonical scenario.
pub const DEFAULT_CANONICAL_ROOT: &str = "/tmp";

/// Environment keys for system test configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemTestEnv {
    /// Optional run root override for artifacts.
    RunRoot,
    /// Optional timeout override in seconds (positive integer).
    TimeoutSeconds,
    /// Optional port override for the canonical scenario.
    CanonicalPort,
    /// Optional directory root override for the canonical scenario.
    CanonicalRoot,
}

impl SystemTestEnv {
    /// Returns the canonical environment variable name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::RunRoot => "METASTORE_HARNESS_SYSTEM_TEST_RUN_ROOT",
            Self::TimeoutSeconds => "METASTORE_HARNESS_SYSTEM_TEST_TIMEOUT_SEC",
            Self::CanonicalPort => "METASTORE_HARNESS_SYSTEM_TEST_PORT",
            Self::CanonicalRoot => "METASTORE_HARNESS_SYSTEM_TEST_ROOT",
        }
    }
}

// ============================================================================
// SECTION: Config Types
// ============================================================================

/// Typed system test configuration derived from environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemTestConfig {
    /// Optional run root override.
    pub run_root: Option<PathBuf>,
    /// Optional timeout override in seconds (positive integer).
    pub timeout: Option<Duration>,
    /// Port for the canonical scenario.
    pub canonical_port: u16,
    /// Directory root for the canonical scenario.
    pub canonical_root: PathBuf,
}

impl Default for SystemTestConfig {
    fn default() -> Self {
        Self {
            run_root: None,
            timeout: None,
            canonical_port: DEFAULT_CANONICAL_PORT,
            canonical_root: PathBuf::from(DEFAULT_CANONICAL_ROOT),
        }
    }
}

impl SystemTestConfig {
    /// Loads configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error when an environment value is not valid UTF-8, is empty,
    /// or fails validation (for example, an invalid timeout or port).
    pub fn load() -> Result<Self, String> {
        let run_root = read_env_nonempty(SystemTestEnv::RunRoot.as_str())?.map(PathBuf::from);
        let timeout = read_env_nonempty(SystemTestEnv::TimeoutSeconds.as_str())?
            .map(|value| parse_timeout_seconds(SystemTestEnv::TimeoutSeconds.as_str(), &value))
            .transpose()?;
        let canonical_port = read_env_nonempty(SystemTestEnv::CanonicalPort.as_str())?
            .map(|value| parse_port(SystemTestEnv::CanonicalPort.as_str(), &value))
            .transpose()?
            .unwrap_or(DEFAULT_CANONICAL_PORT);
        let canonical_root = read_env_nonempty(SystemTestEnv::CanonicalRoot.as_str())?
            .map_or_else(|| PathBuf::from(DEFAULT_CANONICAL_ROOT), PathBuf::from);
        Ok(Self {
            run_root,
            timeout,
            canonical_port,
            canonical_root,
        })
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Reads an environment variable and enforces UTF-8 validity.
///
/// # Errors
///
/// Returns an error when the environment variable contains invalid UTF-8.
pub fn read_env_strict(name: &str) -> Result<Option<String>, String> {
    std::env::var_os(name).map_or(Ok(None), |raw| {
        raw.into_string().map(Some).map_err(|_| format!("{name} must be valid UTF-8"))
    })
}

/// Reads an environment variable and rejects empty values.
///
/// # Errors
///
/// Returns an error when the variable is set but empty or whitespace.
fn read_env_nonempty(name: &str) -> Result<Option<String>, String> {
    match read_env_strict(name)? {
        Some(value) if value.trim().is_empty() => Err(format!("{name} must not be empty")),
        Some(value) => Ok(Some(value)),
        None => Ok(None),
    }
}

/// Parses a positive timeout value from an environment variable string.
///
/// # Errors
///
/// Returns an error when the value is non-numeric or zero.
fn parse_timeout_seconds(name: &str, raw: &str) -> Result<Duration, String> {
    let secs: u64 = raw
        .trim()
        .parse()
        .map_err(|_| format!("{name} must be a positive integer number of seconds"))?;
    if secs == 0 {
        return Err(format!("{name} must be greater than zero"));
    }
    Ok(Duration::from_secs(secs))
}

/// Parses a non-zero TCP port.
///
/// # Errors
///
/// Returns an error when the value is not a port in `1..=65535`.
fn parse_port(name: &str, raw: &str) -> Result<u16, String> {
    match raw.trim().parse::<u16>() {
        Ok(0) | Err(_) => Err(format!("{name} must be a port between 1 and 65535")),
        Ok(port) => Ok(port),
    }
}
