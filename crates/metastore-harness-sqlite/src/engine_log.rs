// crates/metastore-harness-sqlite/src/engine_log.rs
// ============================================================================
// Module: Engine Log
// Description: Append-only engine message log.
// Purpose: Write boot, shutdown, and failure lines to the configured artifact.
// Dependencies: metastore-harness-config
// ============================================================================

//! ## Overview
//! The engine log path comes from `derby.stream.error.file`. When the setting
//! is absent the log is disabled and every write is dropped. Write failures
//! never surface to the caller.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs::File;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use metastore_harness::ServiceError;
use metastore_harness_config::MetastoreSettings;
use metastore_harness_config::keys;

// ============================================================================
// SECTION: Engine Log
// ============================================================================

/// Engine log writer.
#[derive(Debug)]
pub struct EngineLog {
    /// Open log file, when enabled.
    file: Option<Mutex<File>>,
}

impl EngineLog {
    /// Returns a log that drops every line.
    #[must_use]
    pub const fn disabled() -> Self {
        Self {
            file: None,
        }
    }

    /// Opens `path` for appending, creating it if needed.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Io`] when the file cannot be opened.
    pub fn open(path: &Path) -> Result<Self, ServiceError> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|err| ServiceError::Io(format!("engine log {}: {err}", path.display())))?;
        Ok(Self {
            file: Some(Mutex::new(file)),
        })
    }

    /// Opens the log named by the engine log setting, or a disabled log.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Io`] when the file cannot be opened.
    pub fn from_settings(settings: &MetastoreSettings) -> Result<Self, ServiceError> {
        settings
            .get(keys::ENGINE_LOG_FILE)
            .map_or_else(|| Ok(Self::disabled()), |path| Self::open(Path::new(path)))
    }

    /// Appends one timestamped line.
    pub fn write(&self, message: &str) {
        let Some(file) = &self.file else {
            return;
        };
        let millis = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis();
        if let Ok(mut guard) = file.lock() {
            let _ = writeln!(guard, "{millis} {message}");
            let _ = guard.flush();
        }
    }
}
