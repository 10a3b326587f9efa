//! Database model for documents.

use chrono::NaiveDate;
use diesel::prelude::*;
use poptimizer_core::store::Document;

use crate::errors::StorageError;

/// Database model for documents.
///
/// `day` is ISO-8601 text so that comparing strings compares dates.
#[derive(Queryable, Insertable, Selectable, PartialEq, Debug, Clone)]
#[diesel(table_name = crate::schema::documents)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct DocumentDB {
    pub collection: String,
    pub id: String,
    pub ver: i64,
    pub day: String,
    pub body: String,
}

impl DocumentDB {
    pub fn from_document(collection: &str, doc: &Document) -> Result<Self, StorageError> {
        Ok(Self {
            collection: collection.to_string(),
            id: doc.uid.clone(),
            ver: i64::try_from(doc.ver).map_err(|_| {
                StorageError::MalformedDocument(format!(
                    "{}/{}: version {} is out of range",
                    collection, doc.uid, doc.ver
                ))
            })?,
            day: format_day(doc.day),
            body: serde_json::to_string(&doc.body)
                .map_err(|e| StorageError::MalformedDocument(e.to_string()))?,
        })
    }
}

impl TryFrom<DocumentDB> for Document {
    type Error = StorageError;

    fn try_from(db: DocumentDB) -> Result<Self, Self::Error> {
        let malformed = |what: String| {
            StorageError::MalformedDocument(format!("{}/{}: {}", db.collection, db.id, what))
        };
        let ver = u64::try_from(db.ver)
            .map_err(|_| malformed(format!("negative version {}", db.ver)))?;
        let day = NaiveDate::parse_from_str(&db.day, DAY_FORMAT)
            .map_err(|e| malformed(format!("day {}: {}", db.day, e)))?;
        let body = serde_json::from_str(&db.body).map_err(|e| malformed(e.to_string()))?;
        Ok(Document {
            uid: db.id.clone(),
            ver,
            day,
            body,
        })
    }
}

const DAY_FORMAT: &str = "%Y-%m-%d";

pub(crate) fn format_day(day: NaiveDate) -> String {
    day.format(DAY_FORMAT).to_string()
}
