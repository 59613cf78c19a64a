// system-tests/tests/helpers/harness.rs
// ============================================================================
// Module: Lifecycle Harness
// Description: Builders for SQLite-backed metastore lifecycles.
// Purpose: Give suites ready-made configurations and event capture.
// Dependencies: metastore-harness, metastore-harness-sqlite, tempfile
// ============================================================================

use std::net::TcpListener;
use std::path::Path;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::PoisonError;
use std::time::Duration;

use metastore_harness::EventOutcome;
use metastore_harness::EventSink;
use metastore_harness::FileEventSink;
use metastore_harness::LifecycleEvent;
use metastore_harness::LocalMetastore;
use metastore_harness::config::MetastoreSettings;
use metastore_harness::config::ReadinessGate;
use metastore_harness::config::ServiceConfiguration;
use metastore_harness_sqlite::SqliteMetastore;
use system_tests::config::SystemTestConfig;
use tempfile::TempDir;

use super::artifacts::TestArtifacts;
use super::timeouts::resolve_timeout;

/// Fixed readiness delay used by the canonical scenario.
pub const CANONICAL_DELAY: Duration = Duration::from_millis(300);

/// Serializes lifecycles in one test binary.
static LIFECYCLE_LOCK: Mutex<()> = Mutex::new(());

/// Acquires the lifecycle lock, ignoring poisoning from failed tests.
pub fn serial() -> MutexGuard<'static, ()> {
    LIFECYCLE_LOCK.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Allocates a free loopback port.
pub fn allocate_port() -> Result<u16, String> {
    let listener =
        TcpListener::bind("127.0.0.1:0").map_err(|err| format!("port probe failed: {err}"))?;
    listener.local_addr().map(|addr| addr.port()).map_err(|err| format!("port probe: {err}"))
}

/// Sink that records events in memory and mirrors them to a JSONL artifact.
pub struct RecordingSink {
    /// Captured events.
    events: Mutex<Vec<LifecycleEvent>>,
    /// Artifact mirror.
    file: FileEventSink,
}

impl RecordingSink {
    /// Creates a sink writing `events.jsonl` under `artifacts`.
    pub fn new(artifacts: &TestArtifacts) -> Result<Self, String> {
        let file = FileEventSink::new(&artifacts.root().join("events.jsonl"))
            .map_err(|err| format!("event log: {err}"))?;
        Ok(Self {
            events: Mutex::new(Vec::new()),
            file,
        })
    }

    /// Returns captured event names in order.
    pub fn names(&self) -> Vec<&'static str> {
        self.events
            .lock()
            .map(|events| events.iter().map(|event| event.event).collect())
            .unwrap_or_default()
    }

    /// Returns true when `name` was recorded with `outcome`.
    pub fn saw(&self, name: &str, outcome: EventOutcome) -> bool {
        self.events.lock().is_ok_and(|events| {
            events.iter().any(|event| event.event == name && event.outcome == outcome)
        })
    }

    /// Returns the number of events named `name`.
    pub fn count(&self, name: &str) -> usize {
        self.events
            .lock()
            .map(|events| events.iter().filter(|event| event.event == name).count())
            .unwrap_or_default()
    }
}

impl EventSink for RecordingSink {
    fn record(&self, event: &LifecycleEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
        self.file.record(event);
    }
}

/// Configuration of the canonical localhost scenario.
pub fn canonical_config(config: &SystemTestConfig) -> Result<ServiceConfiguration, String> {
    let root = &config.canonical_root;
    ServiceConfiguration::builder()
        .hostname("localhost")
        .port(config.canonical_port)
        .store_dir(root.join("ms-db"))
        .scratch_dir(root.join("scratch"))
        .warehouse_dir(root.join("warehouse"))
        .engine_log(root.join("derby.log"))
        .settings(MetastoreSettings::new())
        .readiness(ReadinessGate::fixed_delay(CANONICAL_DELAY))
        .build()
        .map_err(|err| err.to_string())
}

/// Configuration rooted in `dir` on a fresh port with a polling gate.
pub fn sandbox_config(
    dir: &Path,
    settings: MetastoreSettings,
) -> Result<ServiceConfiguration, String> {
    ServiceConfiguration::builder()
        .hostname("127.0.0.1")
        .port(allocate_port()?)
        .store_dir(dir.join("ms-db"))
        .scratch_dir(dir.join("scratch"))
        .warehouse_dir(dir.join("warehouse"))
        .engine_log(dir.join("derby.log"))
        .settings(settings)
        .readiness(ReadinessGate::poll_endpoint(
            resolve_timeout(Duration::from_secs(5)),
            Duration::from_millis(25),
        ))
        .cancel_grace(resolve_timeout(Duration::from_secs(3)))
        .build()
        .map_err(|err| err.to_string())
}

/// A sandboxed lifecycle with its directory and event capture.
pub struct Sandbox {
    /// Lifecycle manager.
    pub manager: LocalMetastore<SqliteMetastore>,
    /// Captured events.
    pub sink: Arc<RecordingSink>,
    /// Directory holding every artifact of the run.
    pub dir: TempDir,
}

impl Sandbox {
    /// Builds a sandbox with caller `settings`.
    pub fn new(artifacts: &TestArtifacts, settings: MetastoreSettings) -> Result<Self, String> {
        let dir = TempDir::new().map_err(|err| format!("tempdir: {err}"))?;
        let config = sandbox_config(dir.path(), settings)?;
        let sink = Arc::new(RecordingSink::new(artifacts)?);
        let manager = LocalMetastore::with_sink(config, SqliteMetastore::new(), sink.clone());
        Ok(Self {
            manager,
            sink,
            dir,
        })
    }
}
