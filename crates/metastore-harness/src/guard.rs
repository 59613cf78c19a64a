// crates/metastore-harness/src/guard.rs
// ============================================================================
// Module: Process Guard
// Description: Scoped interception of service-initiated process exits.
// Purpose: Keep an embedded service from terminating the host test process.
// Dependencies: thiserror
// ============================================================================

//! ## Overview
//! Embedded services sometimes try to exit the process on fatal errors. A
//! wrapped service calls [`request_process_exit`] instead of
//! [`std::process::exit`]. While a [`ProcessGuard`] is alive, exits that the
//! active [`ExitPolicy`] does not authorize unwind the calling thread with an
//! [`ExitRequest`] payload, which the launch supervisor catches and records.
//!
//! The guard also swaps the process panic hook so intercepted exits are not
//! reported as panics. Every other panic is forwarded to the previous hook.
//! Dropping the guard restores the previous hook and clears the policy.
//!
//! # Invariants
//! - At most one guard is installed per process.
//! - Without a guard, [`request_process_exit`] exits the process.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::panic;
use std::panic::PanicHookInfo;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::PoisonError;

use thiserror::Error;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Panic hook signature used by the standard library.
type PanicHook = Box<dyn Fn(&PanicHookInfo<'_>) + Sync + Send + 'static>;

/// Process-global exit policy; `Some` while a guard is installed.
static ACTIVE_POLICY: Mutex<Option<ExitPolicy>> = Mutex::new(None);

/// Exit codes a guarded service is allowed to terminate the process with.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExitPolicy {
    /// Authorized exit codes.
    authorized: BTreeSet<i32>,
}

impl ExitPolicy {
    /// Returns a policy that intercepts every exit.
    #[must_use]
    pub const fn deny_all() -> Self {
        Self {
            authorized: BTreeSet::new(),
        }
    }

    /// Returns the policy with `code` authorized.
    #[must_use]
    pub fn allow(mut self, code: i32) -> Self {
        self.authorized.insert(code);
        self
    }

    /// Returns true when `code` may terminate the process.
    #[must_use]
    pub fn allows(&self, code: i32) -> bool {
        self.authorized.contains(&code)
    }
}

/// Unwind payload carrying an intercepted exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitRequest {
    /// Exit code the service asked for.
    code: i32,
}

impl ExitRequest {
    /// Returns the requested exit code.
    #[must_use]
    pub const fn code(&self) -> i32 {
        self.code
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Process guard errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GuardError {
    /// Another guard is already active in this process.
    #[error("a process guard is already installed")]
    AlreadyInstalled,
}

// ============================================================================
// SECTION: Guard
// ============================================================================

/// Scoped process-exit interception.
///
/// # Invariants
/// - The previous panic hook is restored on drop, unless the dropping thread
///   is itself panicking; the delegating hook then stays in place.
pub struct ProcessGuard {
    /// Hook that was active before installation.
    previous_hook: Option<Arc<PanicHook>>,
}

impl ProcessGuard {
    /// Installs the guard with `policy`.
    ///
    /// # Errors
    ///
    /// Returns [`GuardError::AlreadyInstalled`] when another guard is alive.
    pub fn install(policy: ExitPolicy) -> Result<Self, GuardError> {
        let mut active = lock_policy();
        if active.is_some() {
            return Err(GuardError::AlreadyInstalled);
        }
        *active = Some(policy);
        drop(active);

        let previous_hook = Arc::new(panic::take_hook());
        let delegate = Arc::clone(&previous_hook);
        panic::set_hook(Box::new(move |info| {
            if info.payload().downcast_ref::<ExitRequest>().is_some() {
                return;
            }
            delegate(info);
        }));
        Ok(Self {
            previous_hook: Some(previous_hook),
        })
    }

    /// Returns true when a guard is installed in this process.
    #[must_use]
    pub fn is_installed() -> bool {
        lock_policy().is_some()
    }
}

impl Drop for ProcessGuard {
    fn drop(&mut self) {
        if !std::thread::panicking()
            && let Some(previous_hook) = self.previous_hook.take()
        {
            drop(panic::take_hook());
            match Arc::try_unwrap(previous_hook) {
                Ok(hook) => panic::set_hook(hook),
                Err(shared) => panic::set_hook(Box::new(move |info| shared(info))),
            }
        }
        *lock_policy() = None;
    }
}

// ============================================================================
// SECTION: Exit Requests
// ============================================================================

/// Terminates the process unless an installed guard intercepts `code`.
///
/// Intercepted requests unwind the calling thread with an [`ExitRequest`]
/// payload instead of returning.
pub fn request_process_exit(code: i32) -> ! {
    let intercept = lock_policy().as_ref().is_some_and(|policy| !policy.allows(code));
    if intercept {
        panic::panic_any(ExitRequest {
            code,
        });
    }
    exit_process(code)
}

/// Exits the process with `code`.
#[allow(clippy::exit, reason = "Authorized or unguarded exit requests terminate the process.")]
fn exit_process(code: i32) -> ! {
    std::process::exit(code)
}

/// Locks the global policy, recovering from poisoning.
fn lock_policy() -> MutexGuard<'static, Option<ExitPolicy>> {
    ACTIVE_POLICY.lock().unwrap_or_else(PoisonError::into_inner)
}
