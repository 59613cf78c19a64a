// system-tests/src/lib.rs
// ============================================================================
// Module: Metastore Harness System Tests Library
// Description: Shared configuration for system test scenarios.
// Purpose: Provide common settings for the system-test binaries.
// Dependencies: std
// ============================================================================

//! ## Overview
//! This crate hosts shared configuration used by the metastore harness
//! system-test binaries in `system-tests/tests`.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod config;
