//! Entity and document repository traits.
//!
//! These traits define the persistence contract without any database-specific
//! types. `storage-sqlite` implements [`DocumentRepositoryTrait`] on SQLite;
//! [`MemoryDocumentRepository`](super::MemoryDocumentRepository) implements it
//! in memory.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::store_model::Document;
use crate::errors::Result;

/// A domain aggregate persisted as one document.
///
/// `Default` is the state of an entity that was never saved: loading an
/// unknown uid yields it at version 0.
pub trait Entity: Serialize + DeserializeOwned + Default + Send + Sync + 'static {
    /// Name of the document collection holding this entity type.
    const COLLECTION: &'static str;
}

/// Contract of a versioned document collection.
///
/// All methods address one document by `(collection, uid)`.
#[async_trait]
pub trait DocumentRepositoryTrait: Send + Sync {
    /// Loads a document, atomically inserting `placeholder` when absent.
    async fn get_or_insert(&self, collection: &str, placeholder: Document) -> Result<Document>;

    /// Conditionally replaces a document.
    ///
    /// Matches on `uid`, `ver == doc.ver` and `stored day <= doc.day`. On a
    /// match the stored version becomes `doc.ver + 1` and day and body are
    /// replaced. Returns `false` when nothing matched.
    async fn replace_if_current(&self, collection: &str, doc: Document) -> Result<bool>;

    /// Deletes a document, returning the number of removed documents.
    async fn delete(&self, collection: &str, uid: &str) -> Result<usize>;

    /// Reads up to `limit` documents ordered by uid, strictly after `after`.
    async fn scan_page(
        &self,
        collection: &str,
        after: Option<String>,
        limit: i64,
    ) -> Result<Vec<Document>>;
}
