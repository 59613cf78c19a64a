// crates/metastore-harness-config/src/lib.rs
// ============================================================================
// Module: Metastore Harness Config Library
// Description: Configuration model and validation for embedded metastores.
// Purpose: Single source of truth for harness configuration semantics.
// Dependencies: serde, thiserror, toml
// ============================================================================

//! ## Overview
//! `metastore-harness-config` defines the immutable [`ServiceConfiguration`]
//! used to launch one embedded metastore instance. Configuration is assembled
//! through [`ServiceConfigurationBuilder`], which fails fast on any missing or
//! duplicated field so that misconfiguration never reaches the launch path.
//!
//! The crate also owns the opaque [`MetastoreSettings`] object, the derived
//! setting keys written by `configure()`, the Derby-style connection URL codec,
//! and TOML property loading via [`HarnessConfigFile`].

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod config;
pub mod connection;
pub mod file;
pub mod settings;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use config::ConfigError;
pub use config::ConfigField;
pub use config::DEFAULT_CANCEL_GRACE;
pub use config::DEFAULT_ENGINE_LOG;
pub use config::DEFAULT_READINESS_DELAY;
pub use config::ReadinessGate;
pub use config::ServiceConfiguration;
pub use config::ServiceConfigurationBuilder;
pub use connection::ConnectionUrl;
pub use connection::ConnectionUrlError;
pub use connection::derby_connection_url;
pub use file::CONFIG_ENV_VAR;
pub use file::HarnessConfigFile;
pub use file::MetastoreSection;
pub use file::ReadinessSection;
pub use settings::MetastoreSettings;
pub use settings::keys;
