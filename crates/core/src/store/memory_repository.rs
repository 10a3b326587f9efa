//! In-memory document repository.

use async_trait::async_trait;
use dashmap::DashMap;

use super::store_model::Document;
use super::store_traits::DocumentRepositoryTrait;
use crate::errors::Result;

/// Document repository kept in a concurrent map.
///
/// Every operation runs under the map's shard lock for its key, which gives
/// the same atomicity as a single-document conditional update in a database.
#[derive(Default)]
pub struct MemoryDocumentRepository {
    documents: DashMap<(String, String), Document>,
}

impl MemoryDocumentRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored documents across all collections.
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    fn key(collection: &str, uid: &str) -> (String, String) {
        (collection.to_string(), uid.to_string())
    }
}

#[async_trait]
impl DocumentRepositoryTrait for MemoryDocumentRepository {
    async fn get_or_insert(&self, collection: &str, placeholder: Document) -> Result<Document> {
        let key = Self::key(collection, &placeholder.uid);
        Ok(self.documents.entry(key).or_insert(placeholder).clone())
    }

    async fn replace_if_current(&self, collection: &str, doc: Document) -> Result<bool> {
        let key = Self::key(collection, &doc.uid);
        match self.documents.get_mut(&key) {
            Some(mut stored) if stored.ver == doc.ver && stored.day <= doc.day => {
                *stored = Document {
                    ver: doc.ver + 1,
                    ..doc
                };
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn delete(&self, collection: &str, uid: &str) -> Result<usize> {
        Ok(usize::from(
            self.documents.remove(&Self::key(collection, uid)).is_some(),
        ))
    }

    async fn scan_page(
        &self,
        collection: &str,
        after: Option<String>,
        limit: i64,
    ) -> Result<Vec<Document>> {
        let mut page: Vec<Document> = self
            .documents
            .iter()
            .filter(|entry| entry.key().0 == collection)
            .filter(|entry| after.as_deref().map_or(true, |after| entry.key().1.as_str() > after))
            .map(|entry| entry.value().clone())
            .collect();
        page.sort_by(|a, b| a.uid.cmp(&b.uid));
        page.truncate(usize::try_from(limit).unwrap_or(0));
        Ok(page)
    }
}
