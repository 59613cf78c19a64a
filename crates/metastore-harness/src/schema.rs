// crates/metastore-harness/src/schema.rs
// ============================================================================
// Module: Schema Lifecycle Controller
// Description: Idempotent prepare/clean of the transactional schema.
// Purpose: Apply transactional settings before every store operation.
// Dependencies: metastore-harness-config, thiserror
// ============================================================================

//! ## Overview
//! The transaction subsystem only works when concurrency support and the
//! database transaction manager are enabled. [`SchemaController`] applies
//! those settings to a fresh copy of the effective settings on every call,
//! then delegates to the collaborator. Panics inside the collaborator are
//! caught and reported as [`SchemaError`]s.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::panic;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use metastore_harness_config::MetastoreSettings;
use metastore_harness_config::keys;
use thiserror::Error;

use crate::interfaces::EmbeddedMetastore;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Schema operation kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaOperation {
    /// Create-if-absent.
    Prepare,
    /// Drop or reset.
    Clean,
}

impl SchemaOperation {
    /// Returns a stable label for the operation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Prepare => "prepare",
            Self::Clean => "clean",
        }
    }
}

impl fmt::Display for SchemaOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Schema operation failures.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SchemaError {
    /// The collaborator reported an error.
    #[error("schema {operation} failed: {reason}")]
    Failed {
        /// Operation that failed.
        operation: SchemaOperation,
        /// Collaborator error message.
        reason: String,
    },
    /// The collaborator panicked.
    #[error("schema {operation} panicked")]
    Panicked {
        /// Operation that panicked.
        operation: SchemaOperation,
    },
}

// ============================================================================
// SECTION: Settings
// ============================================================================

/// Returns a copy of `base` with the transactional settings applied.
#[must_use]
pub fn transactional_settings(base: &MetastoreSettings) -> MetastoreSettings {
    let mut settings = base.clone();
    settings.set_bool(keys::SUPPORT_CONCURRENCY, true);
    settings.set(keys::TXN_MANAGER, keys::DB_TXN_MANAGER);
    settings
}

// ============================================================================
// SECTION: Controller
// ============================================================================

/// Runs schema operations against one collaborator.
pub struct SchemaController<M> {
    /// Collaborator.
    metastore: Arc<M>,
}

impl<M: EmbeddedMetastore> SchemaController<M> {
    /// Creates a controller for `metastore`.
    #[must_use]
    pub const fn new(metastore: Arc<M>) -> Self {
        Self {
            metastore,
        }
    }

    /// Creates the transactional schema if absent.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError`] when the collaborator fails or panics.
    pub fn prepare(&self, settings: &MetastoreSettings) -> Result<(), SchemaError> {
        self.run(SchemaOperation::Prepare, settings)
    }

    /// Drops or resets the transactional schema.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError`] when the collaborator fails or panics.
    pub fn clean(&self, settings: &MetastoreSettings) -> Result<(), SchemaError> {
        self.run(SchemaOperation::Clean, settings)
    }

    /// Applies transactional settings and runs `operation`.
    fn run(
        &self,
        operation: SchemaOperation,
        settings: &MetastoreSettings,
    ) -> Result<(), SchemaError> {
        let settings = transactional_settings(settings);
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| match operation {
            SchemaOperation::Prepare => self.metastore.prepare_schema(&settings),
            SchemaOperation::Clean => self.metastore.clean_schema(&settings),
        }));
        match outcome {
            Ok(Ok(())) => Ok(()),
            Ok(Err(err)) => Err(SchemaError::Failed {
                operation,
                reason: err.to_string(),
            }),
            Err(_) => Err(SchemaError::Panicked {
                operation,
            }),
        }
    }
}
