// system-tests/tests/helpers/checks.rs
// ============================================================================
// Module: Check Helpers
// Description: Fallible assertions for Result-returning system tests.
// Purpose: Report failures as errors so reporters still write summaries.
// ============================================================================

use std::fmt::Debug;

/// Boxed error returned by system tests.
pub type TestError = Box<dyn std::error::Error>;

/// Fails with `message` unless `condition` holds.
pub fn require(condition: bool, message: impl Into<String>) -> Result<(), TestError> {
    if condition { Ok(()) } else { Err(message.into().into()) }
}

/// Fails with both values unless they are equal.
#[allow(clippy::use_debug, reason = "Mismatch reports print both values.")]
pub fn require_eq<T: PartialEq + Debug>(
    left: &T,
    right: &T,
    context: &str,
) -> Result<(), TestError> {
    if left == right {
        Ok(())
    } else {
        Err(format!("{context}: left={left:?} right={right:?}").into())
    }
}
