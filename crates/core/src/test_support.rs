//! Shared fixtures for unit tests.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::bus::Bus;
use crate::errors::{AdapterError, Error, Result};
use crate::store::{
    Document, DocumentRepositoryTrait, Entity, EntityStore, MemoryDocumentRepository,
};

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Counter {
    pub value: i64,
}

impl Entity for Counter {
    const COLLECTION: &'static str = "counters";
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Note {
    pub text: String,
}

impl Entity for Note {
    const COLLECTION: &'static str = "notes";
}

pub fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn memory_store() -> (Arc<MemoryDocumentRepository>, EntityStore) {
    let repository = Arc::new(MemoryDocumentRepository::new());
    let store = EntityStore::new(repository.clone());
    (repository, store)
}

/// Bus with no handlers over a fresh in-memory store.
pub fn bare_bus() -> (Arc<MemoryDocumentRepository>, Bus) {
    let (repository, store) = memory_store();
    (repository, Bus::builder(store).build())
}

/// Repository whose every call fails with an adapter error.
pub struct BrokenRepository;

#[async_trait]
impl DocumentRepositoryTrait for BrokenRepository {
    async fn get_or_insert(&self, _collection: &str, _placeholder: Document) -> Result<Document> {
        Err(Error::Adapter(AdapterError::ConnectionFailed(
            "storage is down".to_string(),
        )))
    }

    async fn replace_if_current(&self, _collection: &str, _doc: Document) -> Result<bool> {
        Err(Error::Adapter(AdapterError::ConnectionFailed(
            "storage is down".to_string(),
        )))
    }

    async fn delete(&self, _collection: &str, _uid: &str) -> Result<usize> {
        Err(Error::Adapter(AdapterError::ConnectionFailed(
            "storage is down".to_string(),
        )))
    }

    async fn scan_page(
        &self,
        _collection: &str,
        _after: Option<String>,
        _limit: i64,
    ) -> Result<Vec<Document>> {
        Err(Error::Adapter(AdapterError::ConnectionFailed(
            "storage is down".to_string(),
        )))
    }
}
