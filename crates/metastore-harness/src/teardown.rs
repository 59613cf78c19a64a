// crates/metastore-harness/src/teardown.rs
// ============================================================================
// Module: Teardown Coordinator
// Description: Ordered, failure-tolerant teardown steps.
// Purpose: Run every teardown step even when earlier steps fail.
// Dependencies: thiserror
// ============================================================================

//! ## Overview
//! [`TeardownCoordinator`] runs named steps in order. A failing or panicking
//! step is logged and recorded in the [`TeardownReport`]; later steps still
//! run. Artifact removal treats an already-missing path as success so that
//! repeated teardown is harmless.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::fs;
use std::io;
use std::panic;
use std::panic::AssertUnwindSafe;
use std::path::Path;

use thiserror::Error;

use crate::events::EventOutcome;
use crate::events::EventSink;
use crate::events::LifecycleEvent;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Teardown steps in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TeardownStep {
    /// Clean the transactional schema.
    CleanSchema,
    /// Cancel the launch thread.
    CancelLaunch,
    /// Restore the process guard.
    RestoreGuard,
    /// Remove the persistent store directory.
    RemoveStoreDir,
    /// Remove the engine log artifact.
    RemoveEngineLog,
}

impl TeardownStep {
    /// Returns a stable label for the step.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CleanSchema => "clean_schema",
            Self::CancelLaunch => "cancel_launch",
            Self::RestoreGuard => "restore_guard",
            Self::RemoveStoreDir => "remove_store_dir",
            Self::RemoveEngineLog => "remove_engine_log",
        }
    }
}

impl fmt::Display for TeardownStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-step teardown failure.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("teardown step {step} failed: {reason}")]
pub struct TeardownError {
    /// Failed step.
    pub step: TeardownStep,
    /// Failure reason.
    pub reason: String,
}

/// Summary of one teardown pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TeardownReport {
    /// Steps that completed.
    pub completed: Vec<TeardownStep>,
    /// Steps that failed.
    pub failures: Vec<TeardownError>,
}

impl TeardownReport {
    /// Returns true when every step completed.
    #[must_use]
    pub const fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

// ============================================================================
// SECTION: Coordinator
// ============================================================================

/// Runs teardown steps without letting failures escape.
pub struct TeardownCoordinator<'a> {
    /// Event sink.
    sink: &'a dyn EventSink,
    /// Endpoint label attached to events.
    endpoint: &'a str,
    /// Accumulated report.
    report: TeardownReport,
}

impl<'a> TeardownCoordinator<'a> {
    /// Creates a coordinator logging to `sink`.
    #[must_use]
    pub fn new(endpoint: &'a str, sink: &'a dyn EventSink) -> Self {
        Self {
            sink,
            endpoint,
            report: TeardownReport::default(),
        }
    }

    /// Runs `action` as `step`, logging and recording any failure.
    pub fn step<F>(&mut self, step: TeardownStep, action: F)
    where
        F: FnOnce() -> Result<(), String>,
    {
        let result = match panic::catch_unwind(AssertUnwindSafe(action)) {
            Ok(result) => result,
            Err(_) => Err("step panicked".to_string()),
        };
        let event = LifecycleEvent::new("teardown_step", EventOutcome::Ok)
            .with_endpoint(self.endpoint)
            .with_detail(step.as_str());
        match result {
            Ok(()) => {
                self.sink.record(&event);
                self.report.completed.push(step);
            }
            Err(reason) => {
                let error = TeardownError {
                    step,
                    reason,
                };
                self.sink.record(&LifecycleEvent {
                    outcome: EventOutcome::Failed,
                    detail: Some(error.to_string()),
                    ..event
                });
                self.report.failures.push(error);
            }
        }
    }

    /// Finishes the pass and returns its report.
    #[must_use]
    pub fn finish(self) -> TeardownReport {
        self.report
    }
}

// ============================================================================
// SECTION: Artifact Removal
// ============================================================================

/// Recursively removes `path`; a missing directory counts as removed.
///
/// # Errors
///
/// Returns the I/O error text when removal fails for any other reason.
pub fn remove_dir_if_present(path: &Path) -> Result<(), String> {
    match fs::remove_dir_all(path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(format!("{}: {err}", path.display())),
    }
}

/// Removes the file at `path`; a missing file counts as removed.
///
/// # Errors
///
/// Returns the I/O error text when removal fails for any other reason.
pub fn remove_file_if_present(path: &Path) -> Result<(), String> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(format!("{}: {err}", path.display())),
    }
}
