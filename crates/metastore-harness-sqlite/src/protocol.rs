// crates/metastore-harness-sqlite/src/protocol.rs
// ============================================================================
// Module: Endpoint Protocol
// Description: Line-oriented request parsing and JSON responses.
// Purpose: Give tests a minimal, inspectable wire surface.
// Dependencies: serde, thiserror
// ============================================================================

//! ## Overview
//! Clients send one command per line; the endpoint answers with one JSON
//! object per line.
//!
//! | request | response `status` |
//! |---|---|
//! | `PING` | `pong` |
//! | `OPEN_TXN [user]` | `txn_opened` with `txn_id` |
//! | `COMMIT_TXN <id>` | `txn_committed` with `txn_id` |
//! | `SCHEMA` | `schema` with `tables` |
//!
//! Any failure yields `error` with a `message`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Maximum accepted request line length in bytes, newline included.
pub const MAX_LINE_BYTES: usize = 4096;
/// Transaction owner used when `OPEN_TXN` names none.
pub const DEFAULT_TXN_USER: &str = "harness";

// ============================================================================
// SECTION: Requests
// ============================================================================

/// Parsed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    /// Liveness probe.
    Ping,
    /// Open a transaction owned by `user`.
    OpenTxn {
        /// Transaction owner.
        user: String,
    },
    /// Commit an open transaction.
    CommitTxn {
        /// Transaction id.
        txn_id: i64,
    },
    /// List prepared transaction tables.
    Schema,
}

/// Request parsing errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Blank request line.
    #[error("empty request")]
    Empty,
    /// Unknown command keyword.
    #[error("unknown command: {0}")]
    UnknownCommand(String),
    /// Command arguments are missing or malformed.
    #[error("invalid arguments for {command}: {reason}")]
    InvalidArguments {
        /// Command keyword.
        command: &'static str,
        /// Human-readable reason.
        reason: String,
    },
    /// Request line exceeds [`MAX_LINE_BYTES`].
    #[error("request exceeds {MAX_LINE_BYTES} bytes")]
    TooLong,
}

impl Request {
    /// Parses one request line. Keywords are case-insensitive.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError`] when the line is not a known command.
    pub fn parse(line: &str) -> Result<Self, ProtocolError> {
        let mut parts = line.split_whitespace();
        let keyword = parts.next().ok_or(ProtocolError::Empty)?.to_ascii_uppercase();
        let args: Vec<&str> = parts.collect();
        match keyword.as_str() {
            "PING" => no_args("PING", &args).map(|()| Self::Ping),
            "SCHEMA" => no_args("SCHEMA", &args).map(|()| Self::Schema),
            "OPEN_TXN" => match args.as_slice() {
                [] => Ok(Self::OpenTxn {
                    user: DEFAULT_TXN_USER.to_string(),
                }),
                [user] => Ok(Self::OpenTxn {
                    user: (*user).to_string(),
                }),
                _ => Err(ProtocolError::InvalidArguments {
                    command: "OPEN_TXN",
                    reason: "expected at most one user name".to_string(),
                }),
            },
            "COMMIT_TXN" => match args.as_slice() {
                [id] => {
                    let txn_id =
                        id.parse::<i64>().map_err(|err| ProtocolError::InvalidArguments {
                            command: "COMMIT_TXN",
                            reason: err.to_string(),
                        })?;
                    Ok(Self::CommitTxn {
                        txn_id,
                    })
                }
                _ => Err(ProtocolError::InvalidArguments {
                    command: "COMMIT_TXN",
                    reason: "expected one transaction id".to_string(),
                }),
            },
            _ => Err(ProtocolError::UnknownCommand(keyword)),
        }
    }
}

/// Rejects any arguments for `command`.
fn no_args(command: &'static str, args: &[&str]) -> Result<(), ProtocolError> {
    if args.is_empty() {
        Ok(())
    } else {
        Err(ProtocolError::InvalidArguments {
            command,
            reason: "takes no arguments".to_string(),
        })
    }
}

// ============================================================================
// SECTION: Responses
// ============================================================================

/// Endpoint response, serialized as one JSON line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Response {
    /// Reply to `PING`.
    Pong,
    /// Transaction opened.
    TxnOpened {
        /// New transaction id.
        txn_id: i64,
    },
    /// Transaction committed.
    TxnCommitted {
        /// Committed transaction id.
        txn_id: i64,
    },
    /// Prepared transaction tables.
    Schema {
        /// Table names, sorted.
        tables: Vec<String>,
    },
    /// Request failed.
    Error {
        /// Failure message.
        message: String,
    },
}

impl Response {
    /// Builds an error response.
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    /// Serializes the response as a newline-terminated JSON line.
    #[must_use]
    pub fn to_line(&self) -> String {
        let mut line = serde_json::to_string(self)
            .unwrap_or_else(|_| r#"{"status":"error","message":"encoding failed"}"#.to_string());
        line.push('\n');
        line
    }
}
