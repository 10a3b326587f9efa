//! Versioned entity storage.
//!
//! - [`store_model`] - Revision, document and typed record models
//! - [`store_traits`] - `Entity` and the document repository contract
//! - [`entity_store`] - Typed CRUD with optimistic concurrency
//! - [`memory_repository`] - In-memory repository for tests and embedding
//!
//! ```text
//! UnitOfWork → EntityStore → DocumentRepositoryTrait
//!                                 ↓              ↓
//!                         MemoryDocumentRepository   SqliteDocumentRepository
//! ```

mod entity_store;
mod memory_repository;
mod store_model;
mod store_traits;

#[cfg(test)]
mod entity_store_tests;

pub use entity_store::EntityStore;
pub use memory_repository::MemoryDocumentRepository;
pub use store_model::{Document, Record, Revision};
pub use store_traits::{DocumentRepositoryTrait, Entity};
