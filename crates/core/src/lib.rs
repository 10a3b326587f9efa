//! Poptimizer Core - entity store, unit of work, message bus and DAG scheduler.
//!
//! This crate holds the coordination core of the portfolio optimizer and the
//! daily data-refresh flow built on it. It is database-agnostic: document
//! persistence is a trait implemented in memory here and on SQLite by the
//! `storage-sqlite` crate.

pub mod bus;
pub mod constants;
pub mod dag;
pub mod data;
pub mod errors;
pub mod events;
pub mod runtime;
pub mod store;
pub mod uow;
pub mod utils;

#[cfg(test)]
pub(crate) mod test_support;

// Re-export error types
pub use errors::Error;
pub use errors::Result;
