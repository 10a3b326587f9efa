//! SQLite storage for poptimizer.
//!
//! This crate provides the database side of the document store using Diesel
//! with SQLite. It implements
//! [`DocumentRepositoryTrait`](poptimizer_core::store::DocumentRepositoryTrait)
//! and contains:
//! - Database connection pooling and management
//! - Diesel migrations
//! - The document repository and its Diesel model
//!
//! # Architecture
//!
//! This crate is the only place where Diesel dependencies exist. The core
//! crate is database-agnostic and works with traits.
//!
//! ```text
//! core (EntityStore)
//!        │
//!        ▼
//! storage-sqlite (this crate)
//!        │
//!        ▼
//!    SQLite DB
//! ```

pub mod db;
pub mod documents;
pub mod errors;
pub mod schema;

// Re-export database utilities
pub use db::{
    create_pool, get_connection, init, run_migrations, spawn_writer, DbConnection, DbPool,
    WriteHandle,
};

pub use documents::SqliteDocumentRepository;

// Re-export storage errors
pub use errors::{IntoCore, StorageError};

// Re-export from poptimizer-core for convenience
pub use poptimizer_core::errors::{AdapterError, Error, Result};
