// crates/metastore-harness-sqlite/src/service.rs
// ============================================================================
// Module: SQLite Metastore Service
// Description: Embedded metastore endpoint backed by the SQLite txn store.
// Purpose: Serve the line protocol on a blocking launch thread until shutdown.
// Dependencies: metastore-harness, rusqlite (via store), tokio
// ============================================================================

//! ## Overview
//! [`SqliteMetastore`] implements [`EmbeddedMetastore`]. `start_service`
//! binds `host:port` (host taken from `hive.metastore.uris`), runs a
//! current-thread tokio runtime on the calling thread, and returns once the
//! shutdown signal fires. Store calls run on the blocking pool.
//!
//! # Invariants
//! - Bind failures are returned, never turned into a process exit.
//! - The SASL auth bridge is rejected before binding.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::net::SocketAddr;
use std::net::TcpListener as StdTcpListener;
use std::sync::Arc;
use std::time::Duration;

use metastore_harness::AuthBridge;
use metastore_harness::EmbeddedMetastore;
use metastore_harness::ServiceError;
use metastore_harness::ShutdownSignal;
use metastore_harness_config::MetastoreSettings;
use metastore_harness_config::keys;
use tokio::io::AsyncBufReadExt;
use tokio::io::AsyncReadExt;
use tokio::io::AsyncWriteExt;
use tokio::io::BufReader;
use tokio::net::TcpListener;
use tokio::net::TcpStream;
use tokio::runtime::Builder;

use crate::engine_log::EngineLog;
use crate::protocol::MAX_LINE_BYTES;
use crate::protocol::ProtocolError;
use crate::protocol::Request;
use crate::protocol::Response;
use crate::store::DEFAULT_BUSY_TIMEOUT;
use crate::store::StoreError;
use crate::store::TxnStore;
use crate::store::require_transactional;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// URI scheme expected in `hive.metastore.uris`.
const THRIFT_SCHEME: &str = "thrift://";

// ============================================================================
// SECTION: Service
// ============================================================================

/// SQLite-backed embedded metastore.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SqliteMetastore {
    /// Busy timeout for store connections.
    busy_timeout: Duration,
}

impl Default for SqliteMetastore {
    fn default() -> Self {
        Self::new()
    }
}

impl SqliteMetastore {
    /// Creates a metastore with the default busy timeout.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
        }
    }

    /// Returns the transaction store named by `settings`.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Settings`] when the connection URL is unusable.
    pub fn store(&self, settings: &MetastoreSettings) -> Result<TxnStore, ServiceError> {
        TxnStore::from_settings(settings)
            .map(|store| store.with_busy_timeout(self.busy_timeout))
            .map_err(|err| ServiceError::Settings(err.to_string()))
    }
}

impl EmbeddedMetastore for SqliteMetastore {
    fn start_service(
        &self,
        port: u16,
        auth: &AuthBridge,
        settings: &MetastoreSettings,
        shutdown: &ShutdownSignal,
    ) -> Result<(), ServiceError> {
        if *auth == AuthBridge::Sasl {
            return Err(ServiceError::Unsupported(format!(
                "auth bridge {} is not supported by the sqlite metastore",
                auth.as_str()
            )));
        }
        let host = endpoint_host(settings)?;
        let store = self.store(settings)?;
        let log = EngineLog::from_settings(settings)?;

        let listener = StdTcpListener::bind((host.as_str(), port))
            .map_err(|err| ServiceError::Io(format!("bind {host}:{port} failed: {err}")))?;
        listener
            .set_nonblocking(true)
            .map_err(|err| ServiceError::Io(format!("listener nonblocking failed: {err}")))?;
        let runtime = Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|err| ServiceError::Io(format!("runtime build failed: {err}")))?;

        let log = Arc::new(log);
        log.write(&format!("metastore booted on {host}:{port}"));
        let result =
            runtime.block_on(serve(listener, Arc::new(store), Arc::clone(&log), shutdown.clone()));
        match &result {
            Ok(()) => log.write("metastore shut down"),
            Err(err) => log.write(&format!("metastore stopped: {err}")),
        }
        result
    }

    fn prepare_schema(&self, settings: &MetastoreSettings) -> Result<(), ServiceError> {
        require_transactional(settings).map_err(store_error)?;
        self.store(settings)?.prepare().map_err(store_error)
    }

    fn clean_schema(&self, settings: &MetastoreSettings) -> Result<(), ServiceError> {
        require_transactional(settings).map_err(store_error)?;
        self.store(settings)?.clean().map(|_| ()).map_err(store_error)
    }
}

/// Maps store failures onto the service error surface.
fn store_error(err: StoreError) -> ServiceError {
    match err {
        StoreError::Settings(reason) => ServiceError::Settings(reason),
        other => ServiceError::Store(other.to_string()),
    }
}

/// Extracts the host of the first `thrift://host:port` endpoint.
///
/// # Errors
///
/// Returns [`ServiceError::Settings`] when the setting is missing or malformed.
pub fn endpoint_host(settings: &MetastoreSettings) -> Result<String, ServiceError> {
    let uris = settings
        .get(keys::METASTORE_URIS)
        .ok_or_else(|| ServiceError::Settings(format!("missing {}", keys::METASTORE_URIS)))?;
    let first = uris.split(',').next().unwrap_or_default().trim();
    let authority = first.strip_prefix(THRIFT_SCHEME).ok_or_else(|| {
        let key = keys::METASTORE_URIS;
        ServiceError::Settings(format!("{key} must use {THRIFT_SCHEME}: {first}"))
    })?;
    let host = authority.rsplit_once(':').map_or(authority, |(host, _)| host);
    if host.is_empty() {
        return Err(ServiceError::Settings(format!("{} has no host", keys::METASTORE_URIS)));
    }
    Ok(host.to_string())
}

// ============================================================================
// SECTION: Endpoint
// ============================================================================

/// Accepts connections until shutdown.
async fn serve(
    listener: StdTcpListener,
    store: Arc<TxnStore>,
    log: Arc<EngineLog>,
    shutdown: ShutdownSignal,
) -> Result<(), ServiceError> {
    let listener = TcpListener::from_std(listener)
        .map_err(|err| ServiceError::Io(format!("listener conversion failed: {err}")))?;
    loop {
        tokio::select! {
            () = shutdown.cancelled() => return Ok(()),
            accepted = listener.accept() => {
                match accepted {
                    Ok((stream, peer)) => {
                        tokio::spawn(handle_connection(
                            stream,
                            peer,
                            Arc::clone(&store),
                            Arc::clone(&log),
                            shutdown.clone(),
                        ));
                    }
                    Err(err) => log.write(&format!("accept failed: {err}")),
                }
            }
        }
    }
}

/// Serves one client until it disconnects, misbehaves, or shutdown fires.
async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    store: Arc<TxnStore>,
    log: Arc<EngineLog>,
    shutdown: ShutdownSignal,
) {
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);
    let limit = u64::try_from(MAX_LINE_BYTES).unwrap_or(u64::MAX);
    let mut line = String::new();
    loop {
        line.clear();
        let mut limited = (&mut reader).take(limit);
        let read = tokio::select! {
            () = shutdown.cancelled() => return,
            read = limited.read_line(&mut line) => read,
        };
        let read = match read {
            Ok(0) => return,
            Ok(read) => read,
            Err(err) => {
                log.write(&format!("connection {peer} read failed: {err}"));
                return;
            }
        };
        if read >= MAX_LINE_BYTES && !line.ends_with('\n') {
            let reply = Response::error(ProtocolError::TooLong.to_string());
            let _ = writer.write_all(reply.to_line().as_bytes()).await;
            return;
        }
        let response = match Request::parse(&line) {
            Ok(request) => dispatch(request, Arc::clone(&store), peer).await,
            Err(err) => Response::error(err.to_string()),
        };
        if let Response::Error {
            message,
        } = &response
        {
            log.write(&format!("connection {peer} request failed: {message}"));
        }
        if writer.write_all(response.to_line().as_bytes()).await.is_err() {
            return;
        }
    }
}

/// Runs one request against the store on the blocking pool.
async fn dispatch(request: Request, store: Arc<TxnStore>, peer: SocketAddr) -> Response {
    if request == Request::Ping {
        return Response::Pong;
    }
    let host = peer.ip().to_string();
    tokio::task::spawn_blocking(move || execute(&store, request, &host))
        .await
        .unwrap_or_else(|err| Response::error(format!("request task failed: {err}")))
}

/// Executes a store-backed request.
fn execute(store: &TxnStore, request: Request, host: &str) -> Response {
    let result = match request {
        Request::Ping => Ok(Response::Pong),
        Request::OpenTxn {
            user,
        } => store.open_txn(&user, host).map(|txn_id| Response::TxnOpened {
            txn_id,
        }),
        Request::CommitTxn {
            txn_id,
        } => store.commit_txn(txn_id).map(|()| Response::TxnCommitted {
            txn_id,
        }),
        Request::Schema => store.tables().map(|tables| Response::Schema {
            tables,
        }),
    };
    result.unwrap_or_else(|err| Response::error(err.to_string()))
}
