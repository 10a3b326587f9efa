//! SQLite storage for versioned documents.

mod model;
mod repository;

pub use model::DocumentDB;
pub use repository::SqliteDocumentRepository;
