// system-tests/tests/suites/lifecycle.rs
// ============================================================================
// Module: Lifecycle Tests
// Description: Start, stop, and failure containment against the SQLite store.
// Purpose: Validate the lifecycle contract end to end over a real endpoint.
// Dependencies: system-tests helpers
// ============================================================================

//! ## Overview
//! Start, stop, and failure containment against the SQLite store.
//! Invariants:
//! - Launch failures never fail `start`.
//! - Teardown always releases the process guard.

#![allow(clippy::await_holding_lock, reason = "The lifecycle lock spans each whole test.")]

use std::time::Duration;

use helpers::artifacts::TestReporter;
use helpers::checks::TestError;
use helpers::checks::require;
use helpers::checks::require_eq;
use helpers::client::EndpointClient;
use helpers::harness::Sandbox;
use helpers::harness::canonical_config;
use helpers::harness::serial;
use metastore_harness::EventOutcome;
use metastore_harness::GuardError;
use metastore_harness::LaunchError;
use metastore_harness::LaunchStatus;
use metastore_harness::LocalMetastore;
use metastore_harness::Phase;
use metastore_harness::ProcessGuard;
use metastore_harness::StartError;
use metastore_harness::config::MetastoreSettings;
use metastore_harness::config::keys;
use metastore_harness_sqlite::Response;
use metastore_harness_sqlite::SqliteMetastore;
use metastore_harness_sqlite::TXN_TABLES;
use system_tests::config::SystemTestConfig;

use crate::helpers;

#[tokio::test(flavor = "multi_thread")]
async fn canonical_localhost_lifecycle() -> Result<(), TestError> {
    let _serial = serial();
    let mut reporter = TestReporter::new("canonical_localhost_lifecycle")?;
    let env = SystemTestConfig::load()?;
    let root = env.canonical_root.clone();
    let mut manager = LocalMetastore::new(canonical_config(&env)?, SqliteMetastore::new());

    manager.configure()?;
    require_eq(
        &manager.endpoint_uri(),
        &format!("thrift://localhost:{}", env.canonical_port),
        "endpoint uri",
    )?;
    let expected_url =
        format!("jdbc:derby:;databaseName={};create=true", root.join("ms-db").display());
    require_eq(
        &manager.settings().get(keys::CONNECTION_URL),
        &Some(expected_url.as_str()),
        "connection url",
    )?;
    require_eq(&manager.settings().get_bool(keys::IN_TEST), &Some(true), "in-test flag")?;

    manager.start()?;
    require_eq(&manager.phase(), &Phase::Ready, "phase after start")?;
    require_eq(&manager.launch_status(), &LaunchStatus::Running, "launch status")?;

    let mut client =
        EndpointClient::connect("localhost", manager.port(), Duration::from_secs(5)).await?;
    require_eq(&client.call("PING").await?, &Response::Pong, "ping")?;
    require_eq(&client.schema().await?.len(), &TXN_TABLES.len(), "prepared tables")?;
    drop(client);

    let report = manager.stop_with(true);
    require(report.is_clean(), format!("teardown failures: {}", report.failures.len()))?;
    require(!root.join("ms-db").exists(), "store dir survived cleanup")?;
    require(!root.join("derby.log").exists(), "engine log survived cleanup")?;
    require(!ProcessGuard::is_installed(), "guard still installed")?;

    reporter.finish("pass", vec!["canonical lifecycle started and cleaned up".to_string()])?;
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn stop_without_cleanup_keeps_artifacts() -> Result<(), TestError> {
    let _serial = serial();
    let mut reporter = TestReporter::new("stop_without_cleanup_keeps_artifacts")?;
    let mut sandbox = Sandbox::new(reporter.artifacts(), MetastoreSettings::new())?;
    sandbox.manager.start()?;

    let mut client =
        EndpointClient::connect("127.0.0.1", sandbox.manager.port(), Duration::from_secs(5))
            .await?;
    require_eq(&client.open_txn("etl").await?, &1, "first txn id")?;
    drop(client);

    require(sandbox.manager.stop_with(false).is_clean(), "stop(false) reported failures")?;
    let store = sandbox.dir.path().join("ms-db").join("metastore.db");
    require(store.exists(), "store file removed by stop(false)")?;
    let log = std::fs::read_to_string(sandbox.dir.path().join("derby.log"))?;
    require(log.contains("metastore booted"), "engine log missing boot line")?;
    require(log.contains("metastore shut down"), "engine log missing shutdown line")?;

    reporter.finish("pass", vec!["store and engine log survived stop(false)".to_string()])?;
    Ok(())
}

#[test]
fn repeated_stop_is_harmless() -> Result<(), TestError> {
    let _serial = serial();
    let mut reporter = TestReporter::new("repeated_stop_is_harmless")?;
    let mut sandbox = Sandbox::new(reporter.artifacts(), MetastoreSettings::new())?;
    sandbox.manager.start()?;

    require(sandbox.manager.stop_with(true).is_clean(), "first stop reported failures")?;
    require(sandbox.manager.stop_with(true).is_clean(), "second stop reported failures")?;
    require_eq(&sandbox.manager.phase(), &Phase::Stopped, "phase after stops")?;
    require_eq(&sandbox.sink.count("metastore_stopped"), &2, "stop events")?;
    require(!sandbox.dir.path().join("ms-db").exists(), "store dir survived cleanup")?;
    require_eq(
        &sandbox.manager.start(),
        &Err(StartError::InvalidPhase {
            phase: Phase::Stopped,
        }),
        "restart after stop",
    )?;

    reporter.finish("pass", vec!["second stop completed every step again".to_string()])?;
    Ok(())
}

#[test]
fn sasl_launch_failure_is_contained() -> Result<(), TestError> {
    let _serial = serial();
    let mut reporter = TestReporter::new("sasl_launch_failure_is_contained")?;
    let settings = MetastoreSettings::new().with(keys::SASL_ENABLED, "true");
    let mut sandbox = Sandbox::new(reporter.artifacts(), settings)?;

    sandbox.manager.start()?;
    require_eq(&sandbox.manager.phase(), &Phase::Ready, "phase after failed launch")?;
    require(
        matches!(sandbox.manager.launch_status(), LaunchStatus::Failed(LaunchError::Service(_))),
        "launch status is not a service failure",
    )?;
    require(sandbox.sink.saw("launch_failed", EventOutcome::Failed), "no launch_failed event")?;
    require(sandbox.sink.saw("readiness", EventOutcome::Failed), "readiness did not fail")?;
    // Schema preparation is independent of the endpoint.
    require(sandbox.sink.saw("schema_prepare", EventOutcome::Ok), "schema not prepared")?;

    sandbox.manager.stop();
    require(!ProcessGuard::is_installed(), "guard still installed")?;
    reporter.finish("pass", vec!["sasl refusal recorded as launch failure".to_string()])?;
    Ok(())
}

#[test]
fn second_live_instance_is_rejected() -> Result<(), TestError> {
    let _serial = serial();
    let mut reporter = TestReporter::new("second_live_instance_is_rejected")?;
    let mut first = Sandbox::new(reporter.artifacts(), MetastoreSettings::new())?;
    let mut second = Sandbox::new(reporter.artifacts(), MetastoreSettings::new())?;

    first.manager.start()?;
    require_eq(
        &second.manager.start(),
        &Err(StartError::Guard(GuardError::AlreadyInstalled)),
        "second start while first is live",
    )?;
    require_eq(&second.manager.phase(), &Phase::Created, "rejected phase")?;
    first.manager.stop();

    second.manager.start()?;
    require_eq(&second.manager.launch_status(), &LaunchStatus::Running, "second launch")?;
    second.manager.stop();

    reporter.finish("pass", vec!["guard admitted one live instance at a time".to_string()])?;
    Ok(())
}
