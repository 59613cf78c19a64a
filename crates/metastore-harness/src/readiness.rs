// crates/metastore-harness/src/readiness.rs
// ============================================================================
// Module: Readiness Gate
// Description: Blocks the caller until the launched service may be used.
// Purpose: Bound the only foreground wait in the lifecycle.
// Dependencies: metastore-harness-config
// ============================================================================

//! ## Overview
//! The default gate is a fixed sleep after which readiness is assumed. The
//! polling gate attempts TCP connects against the endpoint and returns early
//! on success, on timeout, or when the launch has already stopped running.
//! No outcome is an error; the manager logs it and proceeds.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::net::SocketAddr;
use std::net::TcpStream;
use std::net::ToSocketAddrs;
use std::thread;
use std::time::Duration;
use std::time::Instant;

use metastore_harness_config::ReadinessGate;

use crate::events::EventOutcome;
use crate::supervisor::LaunchStatusCell;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Result of waiting on a readiness gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadinessOutcome {
    /// The fixed delay elapsed; readiness is assumed.
    DelayElapsed,
    /// A TCP connect to the endpoint succeeded.
    EndpointReachable {
        /// Connect attempts made.
        attempts: u32,
    },
    /// The launch stopped running before the endpoint became reachable.
    LaunchStopped {
        /// Connect attempts made.
        attempts: u32,
    },
    /// The polling budget elapsed.
    TimedOut {
        /// Connect attempts made.
        attempts: u32,
    },
}

impl ReadinessOutcome {
    /// Returns the event outcome used when logging this result.
    #[must_use]
    pub const fn event_outcome(self) -> EventOutcome {
        match self {
            Self::DelayElapsed | Self::EndpointReachable {
                ..
            } => EventOutcome::Ok,
            Self::LaunchStopped {
                ..
            } => EventOutcome::Failed,
            Self::TimedOut {
                ..
            } => EventOutcome::TimedOut,
        }
    }
}

impl fmt::Display for ReadinessOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DelayElapsed => f.write_str("fixed delay elapsed"),
            Self::EndpointReachable {
                attempts,
            } => write!(f, "endpoint reachable after {attempts} attempt(s)"),
            Self::LaunchStopped {
                attempts,
            } => write!(f, "launch stopped after {attempts} attempt(s)"),
            Self::TimedOut {
                attempts,
            } => write!(f, "endpoint unreachable after {attempts} attempt(s)"),
        }
    }
}

// ============================================================================
// SECTION: Waiting
// ============================================================================

/// Blocks until `gate` is satisfied for `hostname:port`.
#[must_use]
pub fn await_ready(
    gate: ReadinessGate,
    hostname: &str,
    port: u16,
    status: &LaunchStatusCell,
) -> ReadinessOutcome {
    match gate {
        ReadinessGate::FixedDelay {
            delay,
        } => {
            thread::sleep(delay);
            ReadinessOutcome::DelayElapsed
        }
        ReadinessGate::PollEndpoint {
            timeout,
            interval,
        } => poll_endpoint(hostname, port, timeout, interval, status),
    }
}

/// Polls TCP connects until success, launch termination, or timeout.
fn poll_endpoint(
    hostname: &str,
    port: u16,
    timeout: Duration,
    interval: Duration,
    status: &LaunchStatusCell,
) -> ReadinessOutcome {
    let start = Instant::now();
    let mut attempts = 0_u32;
    loop {
        if status.get().is_terminal() {
            return ReadinessOutcome::LaunchStopped {
                attempts,
            };
        }
        attempts = attempts.saturating_add(1);
        if try_connect(hostname, port, interval) {
            return ReadinessOutcome::EndpointReachable {
                attempts,
            };
        }
        let elapsed = start.elapsed();
        if elapsed >= timeout {
            return ReadinessOutcome::TimedOut {
                attempts,
            };
        }
        thread::sleep(interval.min(timeout.saturating_sub(elapsed)));
    }
}

/// Attempts one connect against every resolved address.
fn try_connect(hostname: &str, port: u16, connect_timeout: Duration) -> bool {
    let Ok(addrs) = (hostname, port).to_socket_addrs() else {
        return false;
    };
    let addrs: Vec<SocketAddr> = addrs.collect();
    addrs.iter().any(|addr| TcpStream::connect_timeout(addr, connect_timeout).is_ok())
}
