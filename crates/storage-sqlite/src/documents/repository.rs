use std::sync::Arc;

use async_trait::async_trait;
use diesel::prelude::*;
use diesel::SqliteConnection;
use poptimizer_core::errors::{Error, Result};
use poptimizer_core::store::{Document, DocumentRepositoryTrait};

use super::model::DocumentDB;
use crate::db::{get_connection, DbPool, WriteHandle};
use crate::errors::{IntoCore, StorageError};
use crate::schema::documents;

/// Versioned documents in one SQLite table keyed by `(collection, id)`.
///
/// Reads use the pool. Writes go through the writer actor, so the
/// conditional update is atomic with respect to every other write.
pub struct SqliteDocumentRepository {
    pool: Arc<DbPool>,
    writer: WriteHandle,
}

impl SqliteDocumentRepository {
    pub fn new(pool: Arc<DbPool>, writer: WriteHandle) -> Self {
        SqliteDocumentRepository { pool, writer }
    }

    fn find_impl(&self, collection: &str, uid: &str) -> Result<Option<Document>> {
        let mut conn = get_connection(&self.pool)?;
        let row = documents::table
            .find((collection, uid))
            .select(DocumentDB::as_select())
            .first::<DocumentDB>(&mut conn)
            .optional()
            .into_core()?;
        Ok(row.map(Document::try_from).transpose()?)
    }
}

#[async_trait]
impl DocumentRepositoryTrait for SqliteDocumentRepository {
    async fn get_or_insert(&self, collection: &str, placeholder: Document) -> Result<Document> {
        if let Some(doc) = self.find_impl(collection, &placeholder.uid)? {
            return Ok(doc);
        }

        let row = DocumentDB::from_document(collection, &placeholder)?;
        self.writer
            .exec(move |conn: &mut SqliteConnection| -> Result<Document> {
                // Someone may have inserted it since the read above.
                diesel::insert_or_ignore_into(documents::table)
                    .values(&row)
                    .execute(conn)
                    .map_err(StorageError::from)?;
                let stored = documents::table
                    .find((row.collection.as_str(), row.id.as_str()))
                    .select(DocumentDB::as_select())
                    .first::<DocumentDB>(conn)
                    .map_err(StorageError::from)?;
                Ok(Document::try_from(stored)?)
            })
            .await
    }

    async fn replace_if_current(&self, collection: &str, doc: Document) -> Result<bool> {
        let row = DocumentDB::from_document(collection, &doc)?;
        self.writer
            .exec(move |conn: &mut SqliteConnection| -> Result<bool> {
                let updated = diesel::update(
                    documents::table
                        .filter(documents::collection.eq(&row.collection))
                        .filter(documents::id.eq(&row.id))
                        .filter(documents::ver.eq(row.ver))
                        .filter(documents::day.le(&row.day)),
                )
                .set((
                    documents::ver.eq(documents::ver + 1),
                    documents::day.eq(&row.day),
                    documents::body.eq(&row.body),
                ))
                .execute(conn)
                .map_err(StorageError::from)?;
                Ok(updated == 1)
            })
            .await
    }

    async fn delete(&self, collection: &str, uid: &str) -> Result<usize> {
        let collection = collection.to_string();
        let uid = uid.to_string();
        self.writer
            .exec(move |conn: &mut SqliteConnection| -> Result<usize> {
                Ok(
                    diesel::delete(documents::table.find((collection.as_str(), uid.as_str())))
                        .execute(conn)
                        .map_err(StorageError::from)?,
                )
            })
            .await
    }

    async fn scan_page(
        &self,
        collection: &str,
        after: Option<String>,
        limit: i64,
    ) -> Result<Vec<Document>> {
        let mut conn = get_connection(&self.pool)?;
        let mut query = documents::table
            .filter(documents::collection.eq(collection))
            .select(DocumentDB::as_select())
            .into_boxed();
        if let Some(after) = after {
            query = query.filter(documents::id.gt(after));
        }
        let rows = query
            .order(documents::id.asc())
            .limit(limit)
            .load::<DocumentDB>(&mut conn)
            .into_core()?;

        rows.into_iter()
            .map(|row| Document::try_from(row).map_err(Error::from))
            .collect()
    }
}
