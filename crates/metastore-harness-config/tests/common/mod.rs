// crates/metastore-harness-config/tests/common/mod.rs
// =============================================================================
// Module: Config Test Helpers
// Description: Shared helpers for configuration tests.
// Purpose: Reduce duplication across metastore-harness-config suites.
// =============================================================================

#![allow(dead_code, reason = "Test helpers are selectively used across suites.")]

use metastore_harness_config::ConfigError;
use metastore_harness_config::ConfigField;
use metastore_harness_config::MetastoreSettings;
use metastore_harness_config::ServiceConfigurationBuilder;

/// Hostname used by the reference scenario.
pub const HOSTNAME: &str = "localhost";
/// Port used by the reference scenario.
pub const PORT: u16 = 9933;
/// Store directory used by the reference scenario.
pub const STORE_DIR: &str = "/tmp/ms-db";
/// Scratch directory used by the reference scenario.
pub const SCRATCH_DIR: &str = "/tmp/scratch";
/// Warehouse directory used by the reference scenario.
pub const WAREHOUSE_DIR: &str = "/tmp/warehouse";

/// Returns the caller settings used by the reference scenario.
pub fn sample_settings() -> MetastoreSettings {
    MetastoreSettings::new()
        .with("hive.compactor.initiator.on", "true")
        .with("hive.compactor.worker.threads", "5")
        .with("hive.metastore.connect.retries", "3")
}

/// Returns a builder with every required field applied except `skip`.
pub fn builder_without(skip: &[ConfigField]) -> ServiceConfigurationBuilder {
    let mut builder = ServiceConfigurationBuilder::default();
    for field in ConfigField::REQUIRED {
        if skip.contains(&field) {
            continue;
        }
        builder = match field {
            ConfigField::Hostname => builder.hostname(HOSTNAME),
            ConfigField::Port => builder.port(PORT),
            ConfigField::StoreDir => builder.store_dir(STORE_DIR),
            ConfigField::ScratchDir => builder.scratch_dir(SCRATCH_DIR),
            ConfigField::WarehouseDir => builder.warehouse_dir(WAREHOUSE_DIR),
            ConfigField::Settings => builder.settings(sample_settings()),
            ConfigField::Readiness | ConfigField::CancelGrace | ConfigField::EngineLog => builder,
        };
    }
    builder
}

/// Returns a builder with every required field applied.
pub fn full_builder() -> ServiceConfigurationBuilder {
    builder_without(&[])
}

/// Asserts that `result` failed with an error message containing `needle`.
pub fn assert_error_contains<T>(
    result: Result<T, ConfigError>,
    needle: &str,
) -> Result<(), String> {
    match result {
        Err(error) => {
            let message = error.to_string();
            if message.contains(needle) {
                Ok(())
            } else {
                Err(format!("error {message} did not contain {needle}"))
            }
        }
        Ok(_) => Err("expected config error".to_string()),
    }
}
