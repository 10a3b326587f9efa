//! Core error types for the poptimizer coordination core.
//!
//! The taxonomy separates four kinds of failure because callers react to them
//! differently:
//!
//! - [`AdapterError`]: storage or network I/O failed. Potentially transient.
//! - [`Error::ConcurrencyConflict`]: an optimistic-concurrency save matched no
//!   document. The in-memory entity is stale and must be reloaded.
//! - [`DomainError`]: a business rule was violated inside a handler or a DAG
//!   node. This is the only kind retry policies react to.
//! - [`Error::Service`]: the core was misused by the program (adding a node to
//!   a running DAG, running it twice). Always fatal.
//!
//! Storage-specific errors (Diesel, r2d2, ...) are converted to
//! [`AdapterError`] by the storage crates.

use std::fmt;

use thiserror::Error;

/// Type alias for Result using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Root error type of the coordination core.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Adapter operation failed: {0}")]
    Adapter(#[from] AdapterError),

    #[error("Concurrency conflict on {collection}/{uid}: version {ver} is stale")]
    ConcurrencyConflict {
        collection: String,
        uid: String,
        ver: u64,
    },

    #[error("Domain rule violated: {0}")]
    Domain(#[from] DomainError),

    #[error("Service misuse: {0}")]
    Service(String),

    #[error("{0}")]
    Group(#[from] ErrorGroup),

    #[error("Operation cancelled")]
    Cancelled,
}

impl Error {
    /// Shortcut for building a domain error from a message.
    pub fn domain(message: impl Into<String>) -> Self {
        Error::Domain(DomainError::new(message))
    }

    /// Shortcut for building a service (programmer misuse) error.
    pub fn service(message: impl Into<String>) -> Self {
        Error::Service(message.into())
    }

    /// Returns true when retry policies are allowed to react to this error.
    ///
    /// A group counts as domain-level only when every member does; a single
    /// adapter failure inside a fan-out makes the whole group fatal.
    pub fn is_domain(&self) -> bool {
        match self {
            Error::Domain(_) => true,
            Error::Group(group) => !group.is_empty() && group.iter().all(Error::is_domain),
            _ => false,
        }
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, Error::ConcurrencyConflict { .. })
    }
}

/// Storage and network failures.
///
/// Details are kept in string form so this type stays independent of the
/// concrete backend.
#[derive(Error, Debug)]
pub enum AdapterError {
    /// Failed to establish a storage connection.
    #[error("Failed to connect to storage: {0}")]
    ConnectionFailed(String),

    /// Failed to create or configure the connection pool.
    #[error("Failed to create storage pool: {0}")]
    PoolCreationFailed(String),

    /// A storage query failed to execute.
    #[error("Storage query failed: {0}")]
    QueryFailed(String),

    /// Storage migration failed.
    #[error("Storage migration failed: {0}")]
    MigrationFailed(String),

    /// A document body could not be encoded or decoded.
    #[error("Document serialization failed: {0}")]
    Serialization(String),

    /// A document expected to exist was missing.
    #[error("Document not found: {0}")]
    NotFound(String),

    /// An HTTP request to a data source failed.
    #[error("HTTP request failed: {0}")]
    Http(String),

    /// Internal/unexpected storage error.
    #[error("Internal storage error: {0}")]
    Internal(String),
}

/// A business-rule violation raised by entity logic.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct DomainError {
    message: String,
}

impl DomainError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Failures collected from concurrent sub-operations.
///
/// Fan-out helpers wait for every branch and keep every failure instead of
/// reporting only the first one. The display form joins all members.
#[derive(Error, Debug, Default)]
pub struct ErrorGroup {
    errors: Vec<Error>,
}

impl ErrorGroup {
    pub fn new(errors: Vec<Error>) -> Self {
        Self { errors }
    }

    pub fn push(&mut self, error: Error) {
        self.errors.push(error);
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Error> {
        self.errors.iter()
    }

    /// Collapses the group into a result: `Ok` when empty, the single error
    /// when there is exactly one, the group otherwise.
    pub fn into_result(mut self) -> Result<()> {
        match self.errors.len() {
            0 => Ok(()),
            1 => Err(self.errors.remove(0)),
            _ => Err(Error::Group(self)),
        }
    }
}

impl fmt::Display for ErrorGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} error(s): ", self.errors.len())?;
        for (idx, err) in self.errors.iter().enumerate() {
            if idx > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{}", err)?;
        }
        Ok(())
    }
}

impl IntoIterator for ErrorGroup {
    type Item = Error;
    type IntoIter = std::vec::IntoIter<Error>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.into_iter()
    }
}

impl FromIterator<Error> for ErrorGroup {
    fn from_iter<I: IntoIterator<Item = Error>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

// === From implementations for common error types ===

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Adapter(AdapterError::Serialization(err.to_string()))
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::Adapter(AdapterError::Http(err.to_string()))
    }
}

impl From<Error> for String {
    fn from(err: Error) -> Self {
        err.to_string()
    }
}
