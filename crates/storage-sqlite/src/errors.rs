//! Storage-specific error types for SQLite operations.
//!
//! Diesel and r2d2 errors are wrapped here and converted to the
//! backend-independent [`AdapterError`] of `poptimizer_core`.

use diesel::result::Error as DieselError;
use poptimizer_core::errors::{AdapterError, Error};
use thiserror::Error;

/// Storage-specific errors that wrap Diesel and r2d2 types.
///
/// These errors are internal to the storage layer and are converted to
/// `poptimizer_core::Error` before being returned to callers.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Database connection failed: {0}")]
    ConnectionFailed(#[from] diesel::ConnectionError),

    #[error("Connection pool error: {0}")]
    PoolError(#[from] r2d2::Error),

    #[error("Query execution failed: {0}")]
    QueryFailed(#[from] DieselError),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    #[error("Stored document is malformed: {0}")]
    MalformedDocument(String),

    #[error("Filesystem error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Writer actor stopped: {0}")]
    WriterStopped(String),

    #[error("Core error: {0}")]
    CoreError(String),
}

/// Convert core Error to StorageError (for the writer actor transaction wrapper)
impl From<Error> for StorageError {
    fn from(err: Error) -> Self {
        StorageError::CoreError(err.to_string())
    }
}

impl From<StorageError> for Error {
    fn from(err: StorageError) -> Self {
        let adapter = match err {
            StorageError::ConnectionFailed(e) => AdapterError::ConnectionFailed(e.to_string()),
            StorageError::PoolError(e) => AdapterError::PoolCreationFailed(e.to_string()),
            StorageError::QueryFailed(DieselError::NotFound) => {
                AdapterError::NotFound("Record not found".to_string())
            }
            StorageError::QueryFailed(e) => AdapterError::QueryFailed(e.to_string()),
            StorageError::MigrationFailed(e) => AdapterError::MigrationFailed(e),
            StorageError::MalformedDocument(e) => AdapterError::Serialization(e),
            StorageError::Io(e) => AdapterError::ConnectionFailed(e.to_string()),
            StorageError::WriterStopped(e) => AdapterError::Internal(e),
            // Already a stringified core error
            StorageError::CoreError(e) => AdapterError::Internal(e),
        };
        Error::Adapter(adapter)
    }
}

/// Extension trait for converting Diesel and r2d2 results to core results.
///
/// Since we can't implement `From<DieselError> for Error` due to orphan
/// rules, this goes through [`StorageError`].
pub trait IntoCore<T> {
    fn into_core(self) -> poptimizer_core::Result<T>;
}

impl<T> IntoCore<T> for std::result::Result<T, DieselError> {
    fn into_core(self) -> poptimizer_core::Result<T> {
        self.map_err(|e| StorageError::from(e).into())
    }
}

impl<T> IntoCore<T> for std::result::Result<T, r2d2::Error> {
    fn into_core(self) -> poptimizer_core::Result<T> {
        self.map_err(|e| StorageError::from(e).into())
    }
}
