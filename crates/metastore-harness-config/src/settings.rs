// crates/metastore-harness-config/src/settings.rs
// ============================================================================
// Module: Metastore Settings
// Description: Opaque key/value settings handed to the embedded service.
// Purpose: Carry caller overrides plus harness-derived settings.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! [`MetastoreSettings`] is the service-specific settings object. The harness
//! treats it as an ordered string map: callers supply overrides, `configure()`
//! layers derived keys on top, and the schema controller applies transactional
//! keys on a fresh copy before every prepare/clean.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Keys
// ============================================================================

/// Setting keys understood by the harness and the embedded service.
pub mod keys {
    /// Metastore endpoint URI (`thrift://<host>:<port>`).
    pub const METASTORE_URIS: &str = "hive.metastore.uris";
    /// Scratch directory (absolute).
    pub const SCRATCH_DIR: &str = "hive.exec.scratchdir";
    /// Warehouse directory (absolute).
    pub const WAREHOUSE_DIR: &str = "hive.metastore.warehouse.dir";
    /// Persistent store connection URL.
    pub const CONNECTION_URL: &str = "javax.jdo.option.ConnectionURL";
    /// Marks the service as running inside a test harness.
    pub const IN_TEST: &str = "hive.in.test";
    /// Engine log artifact written by the persistent store.
    pub const ENGINE_LOG_FILE: &str = "derby.stream.error.file";
    /// Enables SASL on the service endpoint.
    pub const SASL_ENABLED: &str = "hive.metastore.sasl.enabled";
    /// Enables concurrency support required by the transaction subsystem.
    pub const SUPPORT_CONCURRENCY: &str = "hive.support.concurrency";
    /// Transaction manager implementation.
    pub const TXN_MANAGER: &str = "hive.txn.manager";
    /// Database-backed transaction manager value.
    pub const DB_TXN_MANAGER: &str = "org.apache.hadoop.hive.ql.lockmgr.DbTxnManager";
}

// ============================================================================
// SECTION: Settings
// ============================================================================

/// Ordered key/value settings for the embedded service.
///
/// # Invariants
/// - Keys are unique; later writes replace earlier values.
/// - Serialized order is the lexical key order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MetastoreSettings {
    /// Backing map.
    values: BTreeMap<String, String>,
}

impl MetastoreSettings {
    /// Creates an empty settings object.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            values: BTreeMap::new(),
        }
    }

    /// Returns the settings with `key` set to `value`.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(key, value);
        self
    }

    /// Sets `key` to `value`, replacing any previous value.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    /// Sets a boolean value using `true`/`false` text.
    pub fn set_bool(&mut self, key: impl Into<String>, value: bool) {
        self.set(key, if value { "true" } else { "false" });
    }

    /// Returns the value stored under `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Returns the boolean stored under `key`, if it parses as one.
    #[must_use]
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        match self.get(key)?.trim() {
            value if value.eq_ignore_ascii_case("true") => Some(true),
            value if value.eq_ignore_ascii_case("false") => Some(false),
            _ => None,
        }
    }

    /// Returns true when no entries are set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
