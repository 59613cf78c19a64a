// crates/metastore-harness-sqlite/src/store.rs
// ============================================================================
// Module: SQLite Transaction Store
// Description: Transactional metastore schema persisted in SQLite.
// Purpose: Provide idempotent prepare/clean and basic txn bookkeeping.
// Dependencies: metastore-harness-config, rusqlite, thiserror
// ============================================================================

//! ## Overview
//! [`TxnStore`] locates its database from the Derby-style connection URL in
//! the service settings. The store directory holds a single SQLite file,
//! `metastore.db`. The directory is created on prepare only when the URL
//! carries `create=true`.
//!
//! Prepare creates the transaction tables when absent and seeds each id
//! sequence exactly once, so repeated prepares leave a valid schema. Clean
//! drops the tables; cleaning a store that was never prepared is a no-op.
//!
//! # Invariants
//! - Schema changes run inside a single transaction.
//! - Transaction bookkeeping takes the write lock up front, so concurrent
//!   callers wait on the busy timeout instead of failing.
//! - Transaction operations fail with [`StoreError::NotPrepared`] until the
//!   schema exists.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use metastore_harness_config::ConnectionUrl;
use metastore_harness_config::MetastoreSettings;
use metastore_harness_config::keys;
use rusqlite::Connection;
use rusqlite::OpenFlags;
use rusqlite::OptionalExtension;
use rusqlite::TransactionBehavior;
use rusqlite::params;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Database file name inside the store directory.
pub const DATABASE_FILE: &str = "metastore.db";
/// Default busy timeout for store connections.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_millis(5_000);

/// Transaction tables managed by the store, in creation order.
pub const TXN_TABLES: [&str; 8] = [
    "TXNS",
    "TXN_COMPONENTS",
    "COMPLETED_TXN_COMPONENTS",
    "NEXT_TXN_ID",
    "HIVE_LOCKS",
    "NEXT_LOCK_ID",
    "COMPACTION_QUEUE",
    "NEXT_COMPACTION_QUEUE_ID",
];

/// Schema DDL; every statement is safe to re-run.
const SCHEMA_DDL: &str = "
CREATE TABLE IF NOT EXISTS TXNS (
    TXN_ID INTEGER PRIMARY KEY,
    TXN_STATE TEXT NOT NULL,
    TXN_STARTED INTEGER NOT NULL,
    TXN_LAST_HEARTBEAT INTEGER NOT NULL,
    TXN_USER TEXT NOT NULL,
    TXN_HOST TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS TXN_COMPONENTS (
    TC_TXNID INTEGER NOT NULL REFERENCES TXNS (TXN_ID),
    TC_DATABASE TEXT NOT NULL,
    TC_TABLE TEXT,
    TC_PARTITION TEXT
);
CREATE TABLE IF NOT EXISTS COMPLETED_TXN_COMPONENTS (
    CTC_TXNID INTEGER NOT NULL,
    CTC_DATABASE TEXT NOT NULL,
    CTC_TABLE TEXT,
    CTC_PARTITION TEXT
);
CREATE TABLE IF NOT EXISTS NEXT_TXN_ID (
    NTXN_NEXT INTEGER NOT NULL
);
CREATE TABLE IF NOT EXISTS HIVE_LOCKS (
    HL_LOCK_EXT_ID INTEGER NOT NULL,
    HL_LOCK_INT_ID INTEGER NOT NULL,
    HL_TXNID INTEGER,
    HL_DB TEXT NOT NULL,
    HL_TABLE TEXT,
    HL_PARTITION TEXT,
    HL_LOCK_STATE TEXT NOT NULL,
    HL_LOCK_TYPE TEXT NOT NULL,
    HL_LAST_HEARTBEAT INTEGER NOT NULL,
    HL_ACQUIRED_AT INTEGER,
    HL_USER TEXT NOT NULL,
    HL_HOST TEXT NOT NULL,
    PRIMARY KEY (HL_LOCK_EXT_ID, HL_LOCK_INT_ID)
);
CREATE TABLE IF NOT EXISTS NEXT_LOCK_ID (
    NL_NEXT INTEGER NOT NULL
);
CREATE TABLE IF NOT EXISTS COMPACTION_QUEUE (
    CQ_ID INTEGER PRIMARY KEY,
    CQ_DATABASE TEXT NOT NULL,
    CQ_TABLE TEXT NOT NULL,
    CQ_PARTITION TEXT,
    CQ_STATE TEXT NOT NULL,
    CQ_TYPE TEXT NOT NULL,
    CQ_WORKER_ID TEXT,
    CQ_START INTEGER,
    CQ_RUN_AS TEXT
);
CREATE TABLE IF NOT EXISTS NEXT_COMPACTION_QUEUE_ID (
    NCQ_NEXT INTEGER NOT NULL
);
INSERT INTO NEXT_TXN_ID (NTXN_NEXT)
    SELECT 1 WHERE NOT EXISTS (SELECT 1 FROM NEXT_TXN_ID);
INSERT INTO NEXT_LOCK_ID (NL_NEXT)
    SELECT 1 WHERE NOT EXISTS (SELECT 1 FROM NEXT_LOCK_ID);
INSERT INTO NEXT_COMPACTION_QUEUE_ID (NCQ_NEXT)
    SELECT 1 WHERE NOT EXISTS (SELECT 1 FROM NEXT_COMPACTION_QUEUE_ID);
";

/// Open transaction state marker.
const TXN_STATE_OPEN: &str = "o";

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Transaction store errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Settings lack a usable connection URL or transactional flags.
    #[error("store settings error: {0}")]
    Settings(String),
    /// Store directory is missing and creation is disabled.
    #[error("store directory does not exist: {0}")]
    MissingDatabase(String),
    /// File-system failure.
    #[error("store io error: {0}")]
    Io(String),
    /// `SQLite` failure.
    #[error("store db error: {0}")]
    Db(String),
    /// The transaction schema has not been prepared.
    #[error("transaction schema is not prepared")]
    NotPrepared,
    /// No open transaction with the given id.
    #[error("no open transaction with id {0}")]
    NoSuchTxn(i64),
}

// ============================================================================
// SECTION: Store
// ============================================================================

/// SQLite-backed transaction store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxnStore {
    /// Store directory named by the connection URL.
    directory: PathBuf,
    /// Whether the directory may be created.
    create: bool,
    /// Busy timeout applied to every connection.
    busy_timeout: Duration,
}

impl TxnStore {
    /// Locates the store named by `url`.
    #[must_use]
    pub fn from_url(url: &ConnectionUrl) -> Self {
        Self {
            directory: url.database().to_path_buf(),
            create: url.create(),
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
        }
    }

    /// Locates the store named by the settings' connection URL.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Settings`] when the URL is missing or malformed.
    pub fn from_settings(settings: &MetastoreSettings) -> Result<Self, StoreError> {
        let url = settings.get(keys::CONNECTION_URL).ok_or_else(|| {
            StoreError::Settings(format!("missing {}", keys::CONNECTION_URL))
        })?;
        let url = ConnectionUrl::parse(url).map_err(|err| StoreError::Settings(err.to_string()))?;
        Ok(Self::from_url(&url))
    }

    /// Overrides the busy timeout.
    #[must_use]
    pub const fn with_busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    /// Returns the store directory.
    #[must_use]
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Returns the database file path.
    #[must_use]
    pub fn database_path(&self) -> PathBuf {
        self.directory.join(DATABASE_FILE)
    }

    /// Creates the transaction schema if absent and seeds id sequences once.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the directory or schema cannot be created.
    pub fn prepare(&self) -> Result<(), StoreError> {
        if !self.directory.exists() {
            if !self.create {
                return Err(StoreError::MissingDatabase(self.directory.display().to_string()));
            }
            fs::create_dir_all(&self.directory).map_err(|err| StoreError::Io(err.to_string()))?;
        }
        let mut connection = self.open()?;
        let tx = connection.transaction().map_err(|err| StoreError::Db(err.to_string()))?;
        tx.execute_batch(SCHEMA_DDL).map_err(|err| StoreError::Db(err.to_string()))?;
        tx.commit().map_err(|err| StoreError::Db(err.to_string()))
    }

    /// Drops the transaction schema. Returns false when there was no store.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the tables cannot be dropped.
    pub fn clean(&self) -> Result<bool, StoreError> {
        if !self.database_path().exists() {
            return Ok(false);
        }
        let mut connection = self.open()?;
        let tx = connection.transaction().map_err(|err| StoreError::Db(err.to_string()))?;
        for table in TXN_TABLES.iter().rev() {
            tx.execute_batch(&format!("DROP TABLE IF EXISTS {table};"))
                .map_err(|err| StoreError::Db(err.to_string()))?;
        }
        tx.commit().map_err(|err| StoreError::Db(err.to_string()))?;
        Ok(true)
    }

    /// Returns the transaction tables currently present, sorted by name.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the catalog cannot be read.
    pub fn tables(&self) -> Result<Vec<String>, StoreError> {
        if !self.database_path().exists() {
            return Ok(Vec::new());
        }
        let connection = self.open()?;
        let mut statement = connection
            .prepare("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name")
            .map_err(|err| StoreError::Db(err.to_string()))?;
        let names = statement
            .query_map(params![], |row| row.get::<_, String>(0))
            .map_err(|err| StoreError::Db(err.to_string()))?;
        let mut tables = Vec::new();
        for name in names {
            let name = name.map_err(|err| StoreError::Db(err.to_string()))?;
            if TXN_TABLES.contains(&name.as_str()) {
                tables.push(name);
            }
        }
        Ok(tables)
    }

    /// Returns true when every transaction table exists.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the catalog cannot be read.
    pub fn is_prepared(&self) -> Result<bool, StoreError> {
        Ok(self.tables()?.len() == TXN_TABLES.len())
    }

    /// Opens a transaction and returns its id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotPrepared`] before prepare, or a db error.
    pub fn open_txn(&self, user: &str, host: &str) -> Result<i64, StoreError> {
        self.require_prepared()?;
        let mut connection = self.open()?;
        let tx = connection
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(|err| StoreError::Db(err.to_string()))?;
        let txn_id: i64 = tx
            .query_row("SELECT NTXN_NEXT FROM NEXT_TXN_ID", params![], |row| row.get(0))
            .optional()
            .map_err(|err| StoreError::Db(err.to_string()))?
            .ok_or(StoreError::NotPrepared)?;
        let now = now_millis();
        tx.execute(
            "INSERT INTO TXNS (TXN_ID, TXN_STATE, TXN_STARTED, TXN_LAST_HEARTBEAT, TXN_USER, \
             TXN_HOST) VALUES (?1, ?2, ?3, ?3, ?4, ?5)",
            params![txn_id, TXN_STATE_OPEN, now, user, host],
        )
        .map_err(|err| StoreError::Db(err.to_string()))?;
        tx.execute("UPDATE NEXT_TXN_ID SET NTXN_NEXT = ?1", params![txn_id + 1])
            .map_err(|err| StoreError::Db(err.to_string()))?;
        tx.commit().map_err(|err| StoreError::Db(err.to_string()))?;
        Ok(txn_id)
    }

    /// Commits an open transaction, moving its components to the completed
    /// table.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NoSuchTxn`] when the id is not open.
    pub fn commit_txn(&self, txn_id: i64) -> Result<(), StoreError> {
        self.require_prepared()?;
        let mut connection = self.open()?;
        let tx = connection
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(|err| StoreError::Db(err.to_string()))?;
        let open = tx
            .query_row(
                "SELECT 1 FROM TXNS WHERE TXN_ID = ?1 AND TXN_STATE = ?2",
                params![txn_id, TXN_STATE_OPEN],
                |_| Ok(()),
            )
            .optional()
            .map_err(|err| StoreError::Db(err.to_string()))?;
        if open.is_none() {
            return Err(StoreError::NoSuchTxn(txn_id));
        }
        tx.execute(
            "INSERT INTO COMPLETED_TXN_COMPONENTS (CTC_TXNID, CTC_DATABASE, CTC_TABLE, \
             CTC_PARTITION) SELECT TC_TXNID, TC_DATABASE, TC_TABLE, TC_PARTITION FROM \
             TXN_COMPONENTS WHERE TC_TXNID = ?1",
            params![txn_id],
        )
        .map_err(|err| StoreError::Db(err.to_string()))?;
        tx.execute("DELETE FROM TXN_COMPONENTS WHERE TC_TXNID = ?1", params![txn_id])
            .map_err(|err| StoreError::Db(err.to_string()))?;
        tx.execute("DELETE FROM TXNS WHERE TXN_ID = ?1", params![txn_id])
            .map_err(|err| StoreError::Db(err.to_string()))?;
        tx.commit().map_err(|err| StoreError::Db(err.to_string()))
    }

    /// Returns the number of open transactions.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotPrepared`] before prepare, or a db error.
    pub fn open_txn_count(&self) -> Result<i64, StoreError> {
        self.require_prepared()?;
        let connection = self.open()?;
        connection
            .query_row(
                "SELECT COUNT(*) FROM TXNS WHERE TXN_STATE = ?1",
                params![TXN_STATE_OPEN],
                |row| row.get(0),
            )
            .map_err(|err| StoreError::Db(err.to_string()))
    }

    /// Fails unless the schema is prepared.
    fn require_prepared(&self) -> Result<(), StoreError> {
        if self.is_prepared()? { Ok(()) } else { Err(StoreError::NotPrepared) }
    }

    /// Opens a connection with the store pragmas applied.
    fn open(&self) -> Result<Connection, StoreError> {
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_FULL_MUTEX;
        let connection = Connection::open_with_flags(self.database_path(), flags)
            .map_err(|err| StoreError::Db(err.to_string()))?;
        connection
            .execute_batch("PRAGMA foreign_keys = ON;")
            .map_err(|err| StoreError::Db(err.to_string()))?;
        connection.busy_timeout(self.busy_timeout).map_err(|err| StoreError::Db(err.to_string()))?;
        Ok(connection)
    }
}

// ============================================================================
// SECTION: Settings Checks
// ============================================================================

/// Verifies the transactional settings required by the store.
///
/// # Errors
///
/// Returns [`StoreError::Settings`] naming the first missing setting.
pub fn require_transactional(settings: &MetastoreSettings) -> Result<(), StoreError> {
    if settings.get_bool(keys::SUPPORT_CONCURRENCY) != Some(true) {
        return Err(StoreError::Settings(format!("{} must be true", keys::SUPPORT_CONCURRENCY)));
    }
    if settings.get(keys::TXN_MANAGER) != Some(keys::DB_TXN_MANAGER) {
        return Err(StoreError::Settings(format!(
            "{} must be {}",
            keys::TXN_MANAGER,
            keys::DB_TXN_MANAGER
        )));
    }
    Ok(())
}

/// Returns the current time in milliseconds since the epoch.
fn now_millis() -> i64 {
    let millis = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis();
    i64::try_from(millis).unwrap_or(i64::MAX)
}
