use std::sync::Arc;

use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};
use log::debug;

use super::store_model::{Document, Record, Revision};
use super::store_traits::{DocumentRepositoryTrait, Entity};
use crate::constants::SCAN_PAGE_SIZE;
use crate::errors::{AdapterError, Error, Result};

/// Typed entity access on top of a document repository.
///
/// Loads never fail for a missing document: absence is a valid initial state
/// and yields `E::default()` at version 0. Saves use optimistic concurrency
/// and report a stale version as [`Error::ConcurrencyConflict`]; they are
/// never retried here.
#[derive(Clone)]
pub struct EntityStore {
    repository: Arc<dyn DocumentRepositoryTrait>,
}

impl EntityStore {
    pub fn new(repository: Arc<dyn DocumentRepositoryTrait>) -> Self {
        Self { repository }
    }

    /// Loads an entity, creating a zero-version placeholder when absent.
    pub async fn get<E: Entity>(&self, uid: &str) -> Result<Record<E>> {
        let placeholder = Document::placeholder(uid, serde_json::to_value(E::default())?);
        let doc = self
            .repository
            .get_or_insert(E::COLLECTION, placeholder)
            .await?;
        decode(doc)
    }

    /// Saves an entity if nobody saved it since it was loaded.
    ///
    /// The stored version advances by one. The caller's record keeps the old
    /// revision and must be reloaded before another save.
    pub async fn save<E: Entity>(&self, record: &Record<E>) -> Result<()> {
        let doc = Document {
            uid: record.uid().to_string(),
            ver: record.ver(),
            day: record.day(),
            body: serde_json::to_value(record.data())?,
        };
        if self
            .repository
            .replace_if_current(E::COLLECTION, doc)
            .await?
        {
            debug!(
                "Saved {}/{} at version {}",
                E::COLLECTION,
                record.uid(),
                record.ver() + 1
            );
            Ok(())
        } else {
            Err(Error::ConcurrencyConflict {
                collection: E::COLLECTION.to_string(),
                uid: record.uid().to_string(),
                ver: record.ver(),
            })
        }
    }

    /// Deletes an entity. Unlike [`get`](Self::get), a missing document is an error.
    pub async fn delete<E: Entity>(&self, record: &Record<E>) -> Result<()> {
        let deleted = self
            .repository
            .delete(E::COLLECTION, record.uid())
            .await?;
        if deleted == 0 {
            return Err(AdapterError::NotFound(format!(
                "{}/{}",
                E::COLLECTION,
                record.uid()
            ))
            .into());
        }
        debug!("Deleted {}/{}", E::COLLECTION, record.uid());
        Ok(())
    }

    /// Streams every entity of a collection in storage order.
    ///
    /// The stream reads lazily page by page; each call starts a fresh scan.
    pub fn get_all<E: Entity>(&self) -> BoxStream<'static, Result<Record<E>>> {
        let repository = Arc::clone(&self.repository);
        stream::try_unfold(
            (repository, None::<String>, false),
            |(repository, after, exhausted)| async move {
                if exhausted {
                    return Ok::<_, Error>(None);
                }
                let page = repository
                    .scan_page(E::COLLECTION, after.clone(), SCAN_PAGE_SIZE)
                    .await?;
                let exhausted = i64::try_from(page.len()).unwrap_or(i64::MAX) < SCAN_PAGE_SIZE;
                let after = page.last().map(|doc| doc.uid.clone()).or(after);
                Ok::<_, Error>(Some((page, (repository, after, exhausted))))
            },
        )
        .map_ok(|page| stream::iter(page.into_iter().map(decode::<E>)))
        .try_flatten()
        .boxed()
    }
}

fn decode<E: Entity>(doc: Document) -> Result<Record<E>> {
    let data: E = serde_json::from_value(doc.body).map_err(|e| {
        AdapterError::Serialization(format!("{}/{}: {}", E::COLLECTION, doc.uid, e))
    })?;
    Ok(Record::new(Revision::new(doc.uid, doc.ver), doc.day, data))
}
