// crates/metastore-harness/src/interfaces.rs
// ============================================================================
// Module: Metastore Interfaces
// Description: Collaborator contract for embedded metastore implementations.
// Purpose: Decouple the lifecycle manager from any concrete service.
// Dependencies: metastore-harness-config, thiserror, tokio
// ============================================================================

//! ## Overview
//! The lifecycle manager drives an [`EmbeddedMetastore`] through three
//! routines: a blocking `start_service` that runs until shutdown, and the
//! idempotent `prepare_schema` / `clean_schema` store operations.
//!
//! Cancellation is cooperative. The launch thread receives a
//! [`ShutdownSignal`] and is expected to return once it fires; the manager
//! never kills the thread.

// ============================================================================
// SECTION: Imports
// ============================================================================

use metastore_harness_config::MetastoreSettings;
use metastore_harness_config::keys;
use thiserror::Error;
use tokio::sync::watch;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors reported by an embedded metastore implementation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ServiceError {
    /// The settings object is missing or has an unusable value.
    #[error("metastore settings error: {0}")]
    Settings(String),
    /// Endpoint or file-system I/O failure.
    #[error("metastore io error: {0}")]
    Io(String),
    /// Persistent store failure.
    #[error("metastore store error: {0}")]
    Store(String),
    /// Requested capability is not supported by the implementation.
    #[error("metastore unsupported: {0}")]
    Unsupported(String),
}

// ============================================================================
// SECTION: Auth Bridge
// ============================================================================

/// Authentication bridge handed to the service on launch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthBridge {
    /// Unauthenticated endpoint.
    #[default]
    None,
    /// SASL-authenticated endpoint.
    Sasl,
}

impl AuthBridge {
    /// Selects the bridge from `hive.metastore.sasl.enabled`.
    #[must_use]
    pub fn from_settings(settings: &MetastoreSettings) -> Self {
        if settings.get_bool(keys::SASL_ENABLED) == Some(true) { Self::Sasl } else { Self::None }
    }

    /// Returns a stable label for the bridge.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Sasl => "sasl",
        }
    }
}

// ============================================================================
// SECTION: Shutdown
// ============================================================================

/// Creates a linked shutdown trigger and signal.
#[must_use]
pub fn shutdown_channel() -> (ShutdownTrigger, ShutdownSignal) {
    let (sender, receiver) = watch::channel(false);
    (
        ShutdownTrigger {
            sender,
        },
        ShutdownSignal {
            receiver,
        },
    )
}

/// Owner side of a cooperative shutdown request.
#[derive(Debug)]
pub struct ShutdownTrigger {
    /// Watch sender flipped to `true` on shutdown.
    sender: watch::Sender<bool>,
}

impl ShutdownTrigger {
    /// Requests shutdown. Repeated calls are harmless.
    pub fn trigger(&self) {
        self.sender.send_replace(true);
    }
}

/// Service side of a cooperative shutdown request.
///
/// # Invariants
/// - Once cancelled, the signal stays cancelled.
/// - A dropped trigger counts as cancellation.
#[derive(Debug, Clone)]
pub struct ShutdownSignal {
    /// Watch receiver observing the trigger.
    receiver: watch::Receiver<bool>,
}

impl ShutdownSignal {
    /// Returns true once shutdown has been requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        *self.receiver.borrow() || self.receiver.has_changed().is_err()
    }

    /// Completes once shutdown has been requested.
    pub async fn cancelled(&self) {
        let mut receiver = self.receiver.clone();
        let _ = receiver.wait_for(|cancelled| *cancelled).await;
    }
}

// ============================================================================
// SECTION: Collaborator
// ============================================================================

/// Embedded metastore driven by the lifecycle manager.
///
/// # Invariants
/// - `start_service` blocks the calling thread until `shutdown` fires or the
///   service fails; it must never terminate the process directly and should
///   call [`crate::request_process_exit`] where it would otherwise exit.
/// - `prepare_schema` and `clean_schema` are idempotent.
pub trait EmbeddedMetastore: Send + Sync + 'static {
    /// Runs the service endpoint on `port` until shutdown.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError`] when the service cannot start or fails while
    /// running.
    fn start_service(
        &self,
        port: u16,
        auth: &AuthBridge,
        settings: &MetastoreSettings,
        shutdown: &ShutdownSignal,
    ) -> Result<(), ServiceError>;

    /// Creates the transactional schema if absent.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError`] when the store cannot be prepared.
    fn prepare_schema(&self, settings: &MetastoreSettings) -> Result<(), ServiceError>;

    /// Drops or resets the transactional schema.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError`] when the store cannot be cleaned.
    fn clean_schema(&self, settings: &MetastoreSettings) -> Result<(), ServiceError>;
}
