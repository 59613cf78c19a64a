// system-tests/tests/helpers/mod.rs
// ============================================================================
// Module: System Test Helpers
// Description: Shared helpers for metastore harness system-tests.
// Purpose: Provide lifecycle harnesses, a protocol client, and artifacts.
// Dependencies: system-tests, metastore-harness, metastore-harness-sqlite
// ============================================================================

//! ## Overview
//! Shared helpers for metastore harness system-tests.
//! Invariants:
//! - Lifecycles in one binary are serialized; the process guard admits one
//!   live instance.
//! - Sandboxed scenarios live in temporary directories removed on drop.

#![allow(dead_code, reason = "Shared helpers are reused across multiple test suites.")]

pub mod artifacts;
pub mod checks;
pub mod client;
pub mod harness;
pub mod timeouts;
