// system-tests/tests/helpers/timeouts.rs
// ============================================================================
// Module: System Test Timeouts
// Description: Centralized timeout configuration with env overrides.
// Purpose: Keep readiness budgets consistent and configurable across suites.
// ============================================================================

use std::time::Duration;

use system_tests::config::SystemTestConfig;

/// Returns the effective timeout, honoring the timeout override when set.
/// The override acts as a minimum to avoid shortening explicitly longer budgets.
#[must_use]
#[allow(clippy::panic, reason = "Invalid overrides abort the test run.")]
pub fn resolve_timeout(requested: Duration) -> Duration {
    match SystemTestConfig::load() {
        Ok(SystemTestConfig {
            timeout: Some(override_timeout),
            ..
        }) => requested.max(override_timeout),
        Ok(_) => requested,
        Err(err) => panic!("system-test config: {err}"),
    }
}
