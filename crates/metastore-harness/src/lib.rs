// crates/metastore-harness/src/lib.rs
// ============================================================================
// Module: Metastore Harness Library
// Description: Lifecycle manager for embedded metastore services in tests.
// Purpose: Launch, gate, prepare, and tear down one service per test suite.
// Dependencies: metastore-harness-config, serde, serde_json, thiserror, tokio
// ============================================================================

//! ## Overview
//! `metastore-harness` stands up an embedded metastore for integration tests
//! and tears it down afterward. [`LocalMetastore`] drives the lifecycle:
//!
//! 1. `configure()` derives the effective service settings.
//! 2. `start()` installs a [`ProcessGuard`], launches the service on a
//!    background thread, waits on the [`ReadinessGate`], and prepares the
//!    transactional schema.
//! 3. `stop()` cleans the schema, cancels the launch, restores the guard, and
//!    removes on-disk artifacts.
//!
//! Runtime failures after launch are logged as [`LifecycleEvent`]s and
//! recorded in [`LaunchStatus`]; only configuration errors and API misuse are
//! returned to callers.
//!
//! [`ReadinessGate`]: metastore_harness_config::ReadinessGate

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod events;
pub mod guard;
pub mod interfaces;
pub mod manager;
pub mod readiness;
pub mod schema;
pub mod supervisor;
pub mod teardown;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use events::EventOutcome;
pub use events::EventSink;
pub use events::FileEventSink;
pub use events::LifecycleEvent;
pub use events::NoopEventSink;
pub use events::StderrEventSink;
pub use guard::ExitPolicy;
pub use guard::ExitRequest;
pub use guard::GuardError;
pub use guard::ProcessGuard;
pub use guard::request_process_exit;
pub use interfaces::AuthBridge;
pub use interfaces::EmbeddedMetastore;
pub use interfaces::ServiceError;
pub use interfaces::ShutdownSignal;
pub use interfaces::ShutdownTrigger;
pub use interfaces::shutdown_channel;
pub use manager::LocalMetastore;
pub use manager::Phase;
pub use manager::StartError;
pub use metastore_harness_config as config;
pub use readiness::ReadinessOutcome;
pub use schema::SchemaController;
pub use schema::SchemaError;
pub use schema::SchemaOperation;
pub use schema::transactional_settings;
pub use supervisor::CancelOutcome;
pub use supervisor::LaunchError;
pub use supervisor::LaunchStatus;
pub use supervisor::LaunchStatusCell;
pub use supervisor::LaunchSupervisor;
pub use teardown::TeardownCoordinator;
pub use teardown::TeardownError;
pub use teardown::TeardownReport;
pub use teardown::TeardownStep;
