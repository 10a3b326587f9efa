//! Versioned document and entity record models.

use std::ops::{Deref, DerefMut};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::constants::start_day;
use crate::errors::{Error, Result};

/// Identity and version of a loaded entity.
///
/// Fields are private: a revision is frozen once the entity is loaded and
/// only the store produces new ones.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Revision {
    uid: String,
    ver: u64,
}

impl Revision {
    pub(crate) fn new(uid: impl Into<String>, ver: u64) -> Self {
        Self {
            uid: uid.into(),
            ver,
        }
    }

    pub fn uid(&self) -> &str {
        &self.uid
    }

    pub fn ver(&self) -> u64 {
        self.ver
    }
}

/// Storage shape of an entity: `{_id, ver, day, ...fields}`.
///
/// This is what document repositories persist. `body` holds the entity's
/// domain fields as JSON.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub uid: String,
    pub ver: u64,
    pub day: NaiveDate,
    pub body: serde_json::Value,
}

impl Document {
    /// Zero-version document dated at the start day.
    pub fn placeholder(uid: impl Into<String>, body: serde_json::Value) -> Self {
        Self {
            uid: uid.into(),
            ver: 0,
            day: start_day(),
            body,
        }
    }
}

/// A typed entity together with its revision and as-of day.
#[derive(Clone, Debug, PartialEq)]
pub struct Record<E> {
    rev: Revision,
    day: NaiveDate,
    data: E,
}

impl<E> Record<E> {
    pub(crate) fn new(rev: Revision, day: NaiveDate, data: E) -> Self {
        Self { rev, day, data }
    }

    pub fn revision(&self) -> &Revision {
        &self.rev
    }

    pub fn uid(&self) -> &str {
        self.rev.uid()
    }

    pub fn ver(&self) -> u64 {
        self.rev.ver()
    }

    /// Day the entity's data is valid for.
    pub fn day(&self) -> NaiveDate {
        self.day
    }

    /// Moves the as-of day forward. Moving it back is a domain error.
    pub fn advance_day(&mut self, day: NaiveDate) -> Result<()> {
        if day < self.day {
            return Err(Error::domain(format!(
                "{} can't move back from {} to {}",
                self.rev.uid, self.day, day
            )));
        }
        self.day = day;
        Ok(())
    }

    pub fn data(&self) -> &E {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut E {
        &mut self.data
    }

    pub fn into_data(self) -> E {
        self.data
    }
}

impl<E> Deref for Record<E> {
    type Target = E;

    fn deref(&self) -> &E {
        &self.data
    }
}

impl<E> DerefMut for Record<E> {
    fn deref_mut(&mut self) -> &mut E {
        &mut self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_placeholder_starts_at_version_zero() {
        let doc = Document::placeholder("GAZP", serde_json::json!({"rows": []}));
        assert_eq!(doc.ver, 0);
        assert_eq!(doc.day, start_day());
        assert_eq!(doc.uid, "GAZP");
    }

    #[test]
    fn test_advance_day_is_monotonic() {
        let mut record = Record::new(Revision::new("main", 2), day(2024, 1, 10), 0u32);

        record.advance_day(day(2024, 1, 10)).unwrap();
        record.advance_day(day(2024, 1, 11)).unwrap();
        assert_eq!(record.day(), day(2024, 1, 11));

        let err = record.advance_day(day(2024, 1, 9)).unwrap_err();
        assert!(err.is_domain());
        assert_eq!(record.day(), day(2024, 1, 11));
    }

    #[test]
    fn test_record_derefs_to_data() {
        let mut record = Record::new(Revision::new("x", 0), start_day(), vec![1, 2]);
        record.push(3);
        assert_eq!(record.len(), 3);
        assert_eq!(record.revision(), &Revision::new("x", 0));
        assert_eq!(record.into_data(), vec![1, 2, 3]);
    }
}
