// crates/metastore-harness/tests/common/mod.rs
// =============================================================================
// Module: Harness Test Helpers
// Description: Fake collaborators and guard serialization for lifecycle tests.
// Purpose: Drive LocalMetastore without a real metastore service.
// =============================================================================

#![allow(dead_code, reason = "Test helpers are selectively used across suites.")]

use std::net::TcpListener;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::PoisonError;
use std::thread;
use std::time::Duration;

use metastore_harness::AuthBridge;
use metastore_harness::EmbeddedMetastore;
use metastore_harness::EventOutcome;
use metastore_harness::EventSink;
use metastore_harness::LifecycleEvent;
use metastore_harness::LocalMetastore;
use metastore_harness::ServiceError;
use metastore_harness::ShutdownSignal;
use metastore_harness::config::MetastoreSettings;
use metastore_harness::config::ReadinessGate;
use metastore_harness::config::ServiceConfiguration;
use metastore_harness::request_process_exit;
use tempfile::TempDir;

/// Serializes tests that install the process-global guard.
static GUARD_LOCK: Mutex<()> = Mutex::new(());

/// Acquires the guard lock, ignoring poisoning from failed tests.
pub fn serial() -> MutexGuard<'static, ()> {
    GUARD_LOCK.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Returns a free loopback port.
pub fn free_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    listener.local_addr().expect("addr").port()
}

/// Launch behavior of the fake service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchMode {
    /// Listen on the port until shutdown.
    Listen,
    /// Request a process exit with the given code.
    Exit(i32),
    /// Panic during startup.
    Panic,
    /// Fail to start.
    Fail,
}

/// In-process fake metastore.
pub struct FakeMetastore {
    /// Launch behavior.
    pub mode: LaunchMode,
    /// Schema operations in call order.
    pub schema_calls: Mutex<Vec<&'static str>>,
    /// Auth bridge seen by the last launch.
    pub auth_seen: Mutex<Option<AuthBridge>>,
}

impl FakeMetastore {
    /// Creates a fake with `mode`.
    pub fn new(mode: LaunchMode) -> Self {
        Self {
            mode,
            schema_calls: Mutex::new(Vec::new()),
            auth_seen: Mutex::new(None),
        }
    }

    /// Returns recorded schema operations.
    pub fn schema_calls(&self) -> Vec<&'static str> {
        self.schema_calls.lock().expect("schema calls").clone()
    }
}

impl EmbeddedMetastore for FakeMetastore {
    fn start_service(
        &self,
        port: u16,
        auth: &AuthBridge,
        _settings: &MetastoreSettings,
        shutdown: &ShutdownSignal,
    ) -> Result<(), ServiceError> {
        *self.auth_seen.lock().expect("auth") = Some(*auth);
        match self.mode {
            LaunchMode::Listen => {
                let listener = TcpListener::bind(("127.0.0.1", port))
                    .map_err(|err| ServiceError::Io(err.to_string()))?;
                listener.set_nonblocking(true).map_err(|err| ServiceError::Io(err.to_string()))?;
                while !shutdown.is_cancelled() {
                    let _ = listener.accept();
                    thread::sleep(Duration::from_millis(5));
                }
                Ok(())
            }
            LaunchMode::Exit(code) => request_process_exit(code),
            LaunchMode::Panic => panic!("fake metastore failed to boot"),
            LaunchMode::Fail => Err(ServiceError::Io("address already in use".to_string())),
        }
    }

    fn prepare_schema(&self, _settings: &MetastoreSettings) -> Result<(), ServiceError> {
        self.schema_calls.lock().expect("schema calls").push("prepare");
        Ok(())
    }

    fn clean_schema(&self, _settings: &MetastoreSettings) -> Result<(), ServiceError> {
        self.schema_calls.lock().expect("schema calls").push("clean");
        Ok(())
    }
}

/// Sink capturing events in memory.
#[derive(Default)]
pub struct CaptureSink {
    /// Captured events.
    pub events: Mutex<Vec<LifecycleEvent>>,
}

impl CaptureSink {
    /// Returns captured event names in order.
    pub fn names(&self) -> Vec<&'static str> {
        self.events.lock().expect("events").iter().map(|event| event.event).collect()
    }

    /// Returns true when `name` was recorded with `outcome`.
    pub fn saw(&self, name: &str, outcome: EventOutcome) -> bool {
        self.events
            .lock()
            .expect("events")
            .iter()
            .any(|event| event.event == name && event.outcome == outcome)
    }
}

impl EventSink for CaptureSink {
    fn record(&self, event: &LifecycleEvent) {
        self.events.lock().expect("events").push(event.clone());
    }
}

/// Builds a configuration rooted in `dir` with a polling gate.
pub fn config_in(dir: &TempDir, port: u16, settings: MetastoreSettings) -> ServiceConfiguration {
    ServiceConfiguration::builder()
        .hostname("127.0.0.1")
        .port(port)
        .store_dir(dir.path().join("ms-db"))
        .scratch_dir(dir.path().join("scratch"))
        .warehouse_dir(dir.path().join("warehouse"))
        .engine_log(dir.path().join("derby.log"))
        .settings(settings)
        .readiness(ReadinessGate::poll_endpoint(
            Duration::from_secs(5),
            Duration::from_millis(20),
        ))
        .cancel_grace(Duration::from_secs(2))
        .build()
        .expect("config")
}

/// Builds a manager around a fake with `mode`.
pub fn fake_manager(
    dir: &TempDir,
    mode: LaunchMode,
) -> (LocalMetastore<FakeMetastore>, Arc<CaptureSink>) {
    let sink = Arc::new(CaptureSink::default());
    let config = config_in(dir, free_port(), MetastoreSettings::new());
    let manager = LocalMetastore::with_sink(config, FakeMetastore::new(mode), sink.clone());
    (manager, sink)
}
