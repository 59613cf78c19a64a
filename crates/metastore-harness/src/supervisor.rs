// crates/metastore-harness/src/supervisor.rs
// ============================================================================
// Module: Launch Supervisor
// Description: Runs the embedded service on a named background thread.
// Purpose: Contain every launch failure and support bounded cancellation.
// Dependencies: metastore-harness-config, thiserror
// ============================================================================

//! ## Overview
//! [`LaunchSupervisor`] spawns the collaborator's `start_service` on a
//! dedicated thread. Errors, panics, and intercepted exit requests inside that
//! thread are converted into a [`LaunchError`], logged, and stored in a shared
//! [`LaunchStatusCell`]; nothing reaches the caller.
//!
//! Cancellation fires the cooperative shutdown signal and waits up to the
//! grace period. A thread that outlives the grace period is detached and the
//! detachment is logged. The supervisor never kills a thread.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::any::Any;
use std::panic;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::PoisonError;
use std::thread;
use std::thread::JoinHandle;
use std::time::Duration;
use std::time::Instant;

use metastore_harness_config::MetastoreSettings;
use thiserror::Error;

use crate::events::EventOutcome;
use crate::events::EventSink;
use crate::events::LifecycleEvent;
use crate::guard::ExitRequest;
use crate::interfaces::AuthBridge;
use crate::interfaces::EmbeddedMetastore;
use crate::interfaces::ShutdownTrigger;
use crate::interfaces::shutdown_channel;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Poll interval while waiting for the launch thread to finish.
const CANCEL_POLL_INTERVAL: Duration = Duration::from_millis(20);

// ============================================================================
// SECTION: Status
// ============================================================================

/// Failures captured inside the launch thread.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LaunchError {
    /// The launch thread could not be spawned.
    #[error("failed to spawn launch thread: {0}")]
    Spawn(String),
    /// The service returned an error.
    #[error("metastore service failed: {0}")]
    Service(String),
    /// The service panicked.
    #[error("metastore service panicked: {0}")]
    Panicked(String),
    /// The service tried to terminate the process.
    #[error("metastore service attempted to exit with code {code}")]
    ExitIntercepted {
        /// Requested exit code.
        code: i32,
    },
}

/// Observed state of the background launch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum LaunchStatus {
    /// No launch has been attempted.
    #[default]
    NotStarted,
    /// The service routine is running.
    Running,
    /// The service routine returned normally.
    Exited,
    /// The launch failed.
    Failed(LaunchError),
}

impl LaunchStatus {
    /// Returns true once the launch thread has stopped running the service.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Exited | Self::Failed(_))
    }
}

/// Shared, thread-safe launch status.
#[derive(Debug, Clone, Default)]
pub struct LaunchStatusCell {
    /// Current status.
    inner: Arc<Mutex<LaunchStatus>>,
}

impl LaunchStatusCell {
    /// Returns a snapshot of the current status.
    #[must_use]
    pub fn get(&self) -> LaunchStatus {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Replaces the current status.
    pub fn set(&self, status: LaunchStatus) {
        *self.inner.lock().unwrap_or_else(PoisonError::into_inner) = status;
    }
}

/// Result of a cancellation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelOutcome {
    /// Nothing was launched, or the launch was already cancelled.
    NotLaunched,
    /// The launch thread finished within the grace period.
    Finished,
    /// The launch thread was still running and has been detached.
    Detached,
}

// ============================================================================
// SECTION: Supervisor
// ============================================================================

/// Owns the background launch of one service instance.
pub struct LaunchSupervisor {
    /// Shared launch status.
    status: LaunchStatusCell,
    /// Shutdown trigger for the running launch.
    trigger: Option<ShutdownTrigger>,
    /// Launch thread handle.
    handle: Option<JoinHandle<()>>,
    /// Event sink.
    sink: Arc<dyn EventSink>,
    /// Endpoint label attached to events.
    endpoint: String,
}

impl LaunchSupervisor {
    /// Creates an idle supervisor.
    #[must_use]
    pub fn new(endpoint: impl Into<String>, sink: Arc<dyn EventSink>) -> Self {
        Self {
            status: LaunchStatusCell::default(),
            trigger: None,
            handle: None,
            sink,
            endpoint: endpoint.into(),
        }
    }

    /// Returns a snapshot of the launch status.
    #[must_use]
    pub fn status(&self) -> LaunchStatus {
        self.status.get()
    }

    /// Returns the shared status cell.
    #[must_use]
    pub fn status_cell(&self) -> LaunchStatusCell {
        self.status.clone()
    }

    /// Returns true while a launch thread is owned by the supervisor.
    #[must_use]
    pub const fn is_launched(&self) -> bool {
        self.handle.is_some()
    }

    /// Starts `metastore` on a thread named `thread_name`.
    ///
    /// The status is `Running` before this returns unless spawning failed.
    /// A supervisor launches at most once; later calls are ignored and logged.
    pub fn launch<M: EmbeddedMetastore>(
        &mut self,
        metastore: Arc<M>,
        port: u16,
        auth: AuthBridge,
        settings: MetastoreSettings,
        thread_name: String,
    ) {
        if self.handle.is_some() || self.status.get() != LaunchStatus::NotStarted {
            self.emit(
                LifecycleEvent::new("launch_spawn", EventOutcome::Skipped)
                    .with_detail("service already launched"),
            );
            return;
        }
        let (trigger, signal) = shutdown_channel();
        let status = self.status.clone();
        let sink = Arc::clone(&self.sink);
        let endpoint = self.endpoint.clone();
        self.status.set(LaunchStatus::Running);

        let spawned = thread::Builder::new().name(thread_name).spawn(move || {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                metastore.start_service(port, &auth, &settings, &signal)
            }));
            let final_status = match outcome {
                Ok(Ok(())) => LaunchStatus::Exited,
                Ok(Err(err)) => LaunchStatus::Failed(LaunchError::Service(err.to_string())),
                Err(payload) => LaunchStatus::Failed(classify_unwind(payload.as_ref())),
            };
            let event = match &final_status {
                LaunchStatus::Failed(err) => {
                    LifecycleEvent::new("launch_failed", EventOutcome::Failed)
                        .with_detail(err.to_string())
                }
                _ => LifecycleEvent::new("launch_exited", EventOutcome::Ok),
            };
            status.set(final_status);
            sink.record(&event.with_endpoint(endpoint));
        });

        match spawned {
            Ok(handle) => {
                self.trigger = Some(trigger);
                self.handle = Some(handle);
                self.emit(
                    LifecycleEvent::new("launch_spawn", EventOutcome::Ok)
                        .with_detail(format!("auth={}", auth.as_str())),
                );
            }
            Err(err) => {
                let error = LaunchError::Spawn(err.to_string());
                self.emit(
                    LifecycleEvent::new("launch_spawn", EventOutcome::Failed)
                        .with_detail(error.to_string()),
                );
                self.status.set(LaunchStatus::Failed(error));
            }
        }
    }

    /// Requests shutdown and waits up to `grace` for the thread to finish.
    pub fn cancel(&mut self, grace: Duration) -> CancelOutcome {
        let Some(handle) = self.handle.take() else {
            return CancelOutcome::NotLaunched;
        };
        if let Some(trigger) = self.trigger.take() {
            trigger.trigger();
        }
        let started = Instant::now();
        while !handle.is_finished() {
            let elapsed = started.elapsed();
            if elapsed >= grace {
                self.emit(
                    LifecycleEvent::new("launch_cancel", EventOutcome::Detached).with_detail(
                        format!("launch thread still running after {}ms", grace.as_millis()),
                    ),
                );
                return CancelOutcome::Detached;
            }
            thread::sleep(CANCEL_POLL_INTERVAL.min(grace.saturating_sub(elapsed)));
        }
        if handle.join().is_err() {
            self.emit(
                LifecycleEvent::new("launch_cancel", EventOutcome::Failed)
                    .with_detail("launch thread panicked outside the service routine"),
            );
        } else {
            self.emit(LifecycleEvent::new("launch_cancel", EventOutcome::Ok));
        }
        CancelOutcome::Finished
    }

    /// Records `event` tagged with the endpoint.
    fn emit(&self, event: LifecycleEvent) {
        self.sink.record(&event.with_endpoint(self.endpoint.clone()));
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Converts an unwind payload into a launch error.
fn classify_unwind(payload: &(dyn Any + Send)) -> LaunchError {
    if let Some(request) = payload.downcast_ref::<ExitRequest>() {
        return LaunchError::ExitIntercepted {
            code: request.code(),
        };
    }
    if let Some(message) = payload.downcast_ref::<&str>() {
        return LaunchError::Panicked((*message).to_string());
    }
    if let Some(message) = payload.downcast_ref::<String>() {
        return LaunchError::Panicked(message.clone());
    }
    LaunchError::Panicked("non-text panic payload".to_string())
}
