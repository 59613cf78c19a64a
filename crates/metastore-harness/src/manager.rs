// crates/metastore-harness/src/manager.rs
// ============================================================================
// Module: Local Metastore Manager
// Description: Public lifecycle surface for one embedded metastore instance.
// Purpose: Sequence configure, launch, readiness, schema, and teardown.
// Dependencies: metastore-harness-config, thiserror
// ============================================================================

//! ## Overview
//! [`LocalMetastore`] owns one [`ServiceConfiguration`], one collaborator, and
//! the background launch. The handle moves through [`Phase`]s exactly once:
//! `Created -> Starting -> Ready -> Stopping -> Stopped`.
//!
//! Only [`ConfigError`] and [`StartError`] reach callers. Every failure after
//! launch is logged to the [`EventSink`] and, for the launch itself, recorded
//! in [`LaunchStatus`].
//!
//! # Invariants
//! - `start()` succeeds at most once per handle.
//! - `stop()` never fails and may be repeated.
//! - Schema clean runs before the launch is cancelled.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use metastore_harness_config::ConfigError;
use metastore_harness_config::MetastoreSettings;
use metastore_harness_config::ServiceConfiguration;
use thiserror::Error;

use crate::events::EventOutcome;
use crate::events::EventSink;
use crate::events::LifecycleEvent;
use crate::events::StderrEventSink;
use crate::guard::ExitPolicy;
use crate::guard::GuardError;
use crate::guard::ProcessGuard;
use crate::interfaces::AuthBridge;
use crate::interfaces::EmbeddedMetastore;
use crate::readiness::await_ready;
use crate::schema::SchemaController;
use crate::schema::SchemaOperation;
use crate::supervisor::CancelOutcome;
use crate::supervisor::LaunchStatus;
use crate::supervisor::LaunchSupervisor;
use crate::teardown::TeardownCoordinator;
use crate::teardown::TeardownReport;
use crate::teardown::TeardownStep;
use crate::teardown::remove_dir_if_present;
use crate::teardown::remove_file_if_present;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Lifecycle phase of a [`LocalMetastore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Built, not yet started.
    Created,
    /// Launch issued; waiting on readiness.
    Starting,
    /// Readiness gate passed.
    Ready,
    /// Teardown in progress.
    Stopping,
    /// Teardown finished.
    Stopped,
}

impl Phase {
    /// Returns a stable label for the phase.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Starting => "starting",
            Self::Ready => "ready",
            Self::Stopping => "stopping",
            Self::Stopped => "stopped",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// API misuse reported by `start()`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StartError {
    /// The handle was already started or stopped.
    #[error("metastore cannot start from phase {phase}")]
    InvalidPhase {
        /// Phase at the time of the call.
        phase: Phase,
    },
    /// Another service instance holds the process guard.
    #[error(transparent)]
    Guard(#[from] GuardError),
    /// Effective settings could not be derived.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

// ============================================================================
// SECTION: Manager
// ============================================================================

/// Lifecycle manager for one embedded metastore instance.
pub struct LocalMetastore<M: EmbeddedMetastore> {
    /// Validated configuration.
    config: ServiceConfiguration,
    /// Collaborator.
    metastore: Arc<M>,
    /// Schema controller sharing the collaborator.
    schema: SchemaController<M>,
    /// Event sink.
    sink: Arc<dyn EventSink>,
    /// Exit codes the guard lets through.
    exit_policy: ExitPolicy,
    /// Effective settings once configured.
    effective: Option<MetastoreSettings>,
    /// Current lifecycle phase.
    phase: Phase,
    /// Active process guard.
    guard: Option<ProcessGuard>,
    /// Background launch owner.
    supervisor: LaunchSupervisor,
}

impl<M: EmbeddedMetastore> LocalMetastore<M> {
    /// Creates a manager logging to stderr.
    #[must_use]
    pub fn new(config: ServiceConfiguration, metastore: M) -> Self {
        Self::with_sink(config, metastore, Arc::new(StderrEventSink))
    }

    /// Creates a manager logging to `sink`.
    #[must_use]
    pub fn with_sink(config: ServiceConfiguration, metastore: M, sink: Arc<dyn EventSink>) -> Self {
        let metastore = Arc::new(metastore);
        let supervisor = LaunchSupervisor::new(config.endpoint_uri(), Arc::clone(&sink));
        Self {
            schema: SchemaController::new(Arc::clone(&metastore)),
            config,
            metastore,
            sink,
            exit_policy: ExitPolicy::deny_all(),
            effective: None,
            phase: Phase::Created,
            guard: None,
            supervisor,
        }
    }

    /// Replaces the exit policy applied while the service runs.
    #[must_use]
    pub fn with_exit_policy(mut self, policy: ExitPolicy) -> Self {
        self.exit_policy = policy;
        self
    }

    // ------------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------------

    /// Returns the validated configuration.
    #[must_use]
    pub const fn config(&self) -> &ServiceConfiguration {
        &self.config
    }

    /// Returns the metastore hostname.
    #[must_use]
    pub fn hostname(&self) -> &str {
        self.config.hostname()
    }

    /// Returns the metastore port.
    #[must_use]
    pub const fn port(&self) -> u16 {
        self.config.port()
    }

    /// Returns the persistent store directory.
    #[must_use]
    pub fn store_dir(&self) -> &Path {
        self.config.store_dir()
    }

    /// Returns the scratch directory.
    #[must_use]
    pub fn scratch_dir(&self) -> &Path {
        self.config.scratch_dir()
    }

    /// Returns the warehouse directory.
    #[must_use]
    pub fn warehouse_dir(&self) -> &Path {
        self.config.warehouse_dir()
    }

    /// Returns `thrift://<host>:<port>`.
    #[must_use]
    pub fn endpoint_uri(&self) -> String {
        self.config.endpoint_uri()
    }

    /// Returns the persistent store connection URL.
    #[must_use]
    pub fn connection_url(&self) -> String {
        self.config.connection_url()
    }

    /// Returns the effective settings, or the caller settings before
    /// `configure()`.
    #[must_use]
    pub fn settings(&self) -> &MetastoreSettings {
        self.effective.as_ref().unwrap_or_else(|| self.config.settings())
    }

    /// Returns the current lifecycle phase.
    #[must_use]
    pub const fn phase(&self) -> Phase {
        self.phase
    }

    /// Returns a snapshot of the background launch status.
    #[must_use]
    pub fn launch_status(&self) -> LaunchStatus {
        self.supervisor.status()
    }

    /// Returns the collaborator.
    #[must_use]
    pub fn metastore(&self) -> &M {
        &self.metastore
    }

    // ------------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------------

    /// Writes the derived keys into the effective settings.
    ///
    /// Repeated calls produce the same settings.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when a directory cannot be made absolute.
    pub fn configure(&mut self) -> Result<(), ConfigError> {
        let settings = self.config.derived_settings()?;
        self.effective = Some(settings);
        self.emit(LifecycleEvent::new("metastore_configured", EventOutcome::Ok));
        Ok(())
    }

    /// Launches the service, waits on the readiness gate, and prepares the
    /// schema.
    ///
    /// Launch, readiness, and schema failures are logged and recorded in
    /// [`LaunchStatus`]; they do not fail this call.
    ///
    /// # Errors
    ///
    /// Returns [`StartError`] when the handle is not in [`Phase::Created`],
    /// when another instance holds the process guard, or when the settings
    /// cannot be derived.
    pub fn start(&mut self) -> Result<(), StartError> {
        if self.phase != Phase::Created {
            return Err(StartError::InvalidPhase {
                phase: self.phase,
            });
        }
        if self.effective.is_none() {
            self.configure()?;
        }
        let settings = self.settings().clone();
        self.guard = Some(ProcessGuard::install(self.exit_policy.clone())?);
        self.phase = Phase::Starting;
        self.emit(LifecycleEvent::new("metastore_starting", EventOutcome::Ok));

        let auth = AuthBridge::from_settings(&settings);
        let thread_name = format!("metastore-launch-{}", self.config.port());
        self.supervisor.launch(
            Arc::clone(&self.metastore),
            self.config.port(),
            auth,
            settings,
            thread_name,
        );

        let outcome = await_ready(
            self.config.readiness(),
            self.config.hostname(),
            self.config.port(),
            &self.supervisor.status_cell(),
        );
        self.emit(
            LifecycleEvent::new("readiness", outcome.event_outcome())
                .with_detail(outcome.to_string()),
        );
        self.phase = Phase::Ready;
        self.prep_db();
        Ok(())
    }

    /// Stops the service and removes on-disk artifacts.
    pub fn stop(&mut self) {
        let _ = self.stop_with(true);
    }

    /// Stops the service; removes artifacts only when `cleanup` is set.
    ///
    /// Every step runs even if earlier steps fail. Failures are logged and
    /// returned in the report; this call never fails.
    pub fn stop_with(&mut self, cleanup: bool) -> TeardownReport {
        self.phase = Phase::Stopping;
        self.emit(LifecycleEvent::new("metastore_stopping", EventOutcome::Ok));
        let endpoint = self.config.endpoint_uri();
        let grace = self.config.cancel_grace();
        let schema_settings = self.schema_settings();
        let store_dir = self.config.store_dir().to_path_buf();
        let engine_log = self.config.engine_log_absolute();

        let mut teardown = TeardownCoordinator::new(&endpoint, self.sink.as_ref());
        if cleanup {
            teardown.step(TeardownStep::CleanSchema, || {
                let settings = schema_settings.map_err(|err| err.to_string())?;
                self.schema.clean(&settings).map_err(|err| err.to_string())
            });
        }
        let supervisor = &mut self.supervisor;
        teardown.step(TeardownStep::CancelLaunch, || match supervisor.cancel(grace) {
            CancelOutcome::NotLaunched | CancelOutcome::Finished => Ok(()),
            CancelOutcome::Detached => Err("launch thread detached".to_string()),
        });
        let guard = &mut self.guard;
        teardown.step(TeardownStep::RestoreGuard, || {
            drop(guard.take());
            Ok(())
        });
        if cleanup {
            teardown.step(TeardownStep::RemoveStoreDir, || remove_dir_if_present(&store_dir));
            teardown.step(TeardownStep::RemoveEngineLog, || {
                let path = engine_log.map_err(|err| err.to_string())?;
                remove_file_if_present(&path)
            });
        }
        let report = teardown.finish();

        self.phase = Phase::Stopped;
        let outcome = if report.is_clean() { EventOutcome::Ok } else { EventOutcome::Failed };
        self.emit(
            LifecycleEvent::new("metastore_stopped", outcome)
                .with_detail(format!("cleanup={cleanup} failures={}", report.failures.len())),
        );
        report
    }

    /// Prepares the transactional schema; failures are logged only.
    pub fn prep_db(&self) {
        self.run_schema(SchemaOperation::Prepare);
    }

    /// Cleans the transactional schema; failures are logged only.
    pub fn clean_db(&self) {
        self.run_schema(SchemaOperation::Clean);
    }

    // ------------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------------

    /// Runs a schema operation and logs the outcome.
    fn run_schema(&self, operation: SchemaOperation) {
        let event = match operation {
            SchemaOperation::Prepare => "schema_prepare",
            SchemaOperation::Clean => "schema_clean",
        };
        let result = self.schema_settings().map_err(|err| err.to_string()).and_then(|settings| {
            match operation {
                SchemaOperation::Prepare => self.schema.prepare(&settings),
                SchemaOperation::Clean => self.schema.clean(&settings),
            }
            .map_err(|err| err.to_string())
        });
        match result {
            Ok(()) => self.emit(LifecycleEvent::new(event, EventOutcome::Ok)),
            Err(reason) => {
                self.emit(LifecycleEvent::new(event, EventOutcome::Failed).with_detail(reason));
            }
        }
    }

    /// Returns the settings used for schema operations.
    fn schema_settings(&self) -> Result<MetastoreSettings, ConfigError> {
        match &self.effective {
            Some(settings) => Ok(settings.clone()),
            None => self.config.derived_settings(),
        }
    }

    /// Records `event` tagged with the endpoint.
    fn emit(&self, event: LifecycleEvent) {
        self.sink.record(&event.with_endpoint(self.config.endpoint_uri()));
    }
}

impl<M: EmbeddedMetastore> Drop for LocalMetastore<M> {
    fn drop(&mut self) {
        if matches!(self.phase, Phase::Starting | Phase::Ready) {
            let _ = self.stop_with(false);
        }
    }
}
