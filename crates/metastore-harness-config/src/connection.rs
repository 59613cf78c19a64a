// crates/metastore-harness-config/src/connection.rs
// ============================================================================
// Module: Store Connection URL
// Description: Derby-style connection URL construction and parsing.
// Purpose: Keep the persistent store URL format in one place.
// Dependencies: thiserror
// ============================================================================

//! ## Overview
//! The embedded service locates its persistent store through a JDBC-style
//! URL of the form `jdbc:derby:;databaseName=<dir>;create=true`. The harness
//! writes this URL during `configure()`; store implementations parse it back
//! with [`ConnectionUrl::parse`].

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::path::Path;
use std::path::PathBuf;

use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Scheme prefix for store connection URLs.
pub const CONNECTION_URL_SCHEME: &str = "jdbc:derby:";
/// Attribute naming the database directory.
const DATABASE_NAME_ATTR: &str = "databaseName";
/// Attribute requesting database creation.
const CREATE_ATTR: &str = "create";

// ============================================================================
// SECTION: Construction
// ============================================================================

/// Builds the connection URL for a store directory.
///
/// The directory text is embedded verbatim.
#[must_use]
pub fn derby_connection_url(store_dir: &str) -> String {
    format!("{CONNECTION_URL_SCHEME};{DATABASE_NAME_ATTR}={store_dir};{CREATE_ATTR}=true")
}

// ============================================================================
// SECTION: Parsing
// ============================================================================

/// Connection URL parse errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConnectionUrlError {
    /// URL does not use the expected scheme.
    #[error("connection url must start with jdbc:derby:")]
    Scheme,
    /// URL does not name a database.
    #[error("connection url does not name a database")]
    MissingDatabase,
    /// Attribute is malformed.
    #[error("malformed connection url attribute: {0}")]
    Attribute(String),
}

/// Parsed store connection URL.
///
/// # Invariants
/// - `database` is never empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionUrl {
    /// Store directory.
    database: PathBuf,
    /// Whether the store may be created on open.
    create: bool,
}

impl ConnectionUrl {
    /// Parses a `jdbc:derby:` URL.
    ///
    /// The database may be given as the subname (`jdbc:derby:/dir;...`) or as
    /// the `databaseName` attribute; the attribute wins when both are present.
    /// Unknown attributes are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectionUrlError`] when the scheme is wrong, an attribute is
    /// malformed, or no database is named.
    pub fn parse(url: &str) -> Result<Self, ConnectionUrlError> {
        let rest =
            url.trim().strip_prefix(CONNECTION_URL_SCHEME).ok_or(ConnectionUrlError::Scheme)?;
        let mut parts = rest.split(';');
        let subname = parts.next().unwrap_or_default().trim();
        let mut database = (!subname.is_empty()).then(|| subname.to_string());
        let mut create = false;
        for attribute in parts {
            if attribute.trim().is_empty() {
                continue;
            }
            let (name, value) = attribute
                .split_once('=')
                .ok_or_else(|| ConnectionUrlError::Attribute(attribute.to_string()))?;
            match name.trim() {
                DATABASE_NAME_ATTR => database = Some(value.to_string()),
                CREATE_ATTR => {
                    create = match value.trim() {
                        v if v.eq_ignore_ascii_case("true") => true,
                        v if v.eq_ignore_ascii_case("false") => false,
                        _ => return Err(ConnectionUrlError::Attribute(attribute.to_string())),
                    };
                }
                _ => {}
            }
        }
        let database = database
            .filter(|name| !name.is_empty())
            .ok_or(ConnectionUrlError::MissingDatabase)?;
        Ok(Self {
            database: PathBuf::from(database),
            create,
        })
    }

    /// Returns the store directory.
    #[must_use]
    pub fn database(&self) -> &Path {
        &self.database
    }

    /// Returns true when the URL allows creating the store.
    #[must_use]
    pub const fn create(&self) -> bool {
        self.create
    }
}

impl fmt::Display for ConnectionUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{CONNECTION_URL_SCHEME};{DATABASE_NAME_ATTR}={}", self.database.display())?;
        if self.create {
            write!(f, ";{CREATE_ATTR}=true")?;
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
