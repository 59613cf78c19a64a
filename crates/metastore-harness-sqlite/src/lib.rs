// crates/metastore-harness-sqlite/src/lib.rs
// ============================================================================
// Module: Metastore Harness SQLite
// Description: Reference embedded metastore backed by SQLite.
// Purpose: Give the lifecycle manager a real endpoint and transactional store.
// Dependencies: metastore-harness, rusqlite, serde, tokio
// ============================================================================

//! ## Overview
//! [`SqliteMetastore`] serves a small line protocol over TCP and keeps the
//! transactional schema in a SQLite file under the store directory named by
//! the connection URL. Pair it with
//! [`metastore_harness::LocalMetastore`] to run a full lifecycle in tests.

pub mod engine_log;
pub mod protocol;
pub mod service;
pub mod store;

pub use engine_log::EngineLog;
pub use protocol::ProtocolError;
pub use protocol::Request;
pub use protocol::Response;
pub use service::SqliteMetastore;
pub use service::endpoint_host;
pub use store::StoreError;
pub use store::TXN_TABLES;
pub use store::TxnStore;
pub use store::require_transactional;
