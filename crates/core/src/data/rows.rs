use std::fmt::Debug;

use chrono::NaiveDate;

use crate::errors::{Error, Result};

/// A table row keyed by date.
pub trait DatedRow: Clone + Debug + PartialEq {
    fn date(&self) -> NaiveDate;
}

/// Appends the rows of `update` dated after the last stored row.
///
/// `update` must be strictly increasing by date. Rows dated on the last
/// stored date must repeat the stored row; older rows are ignored. Returns
/// the number of appended rows.
pub fn append_rows<R: DatedRow>(rows: &mut Vec<R>, update: Vec<R>) -> Result<usize> {
    if let Some(pair) = update.windows(2).find(|pair| pair[0].date() >= pair[1].date()) {
        return Err(Error::domain(format!(
            "rows are not strictly increasing: {} then {}",
            pair[0].date(),
            pair[1].date()
        )));
    }

    let Some(last) = rows.last().cloned() else {
        let added = update.len();
        *rows = update;
        return Ok(added);
    };

    let mut added = 0;
    for row in update {
        if row.date() < last.date() {
            continue;
        }
        if row.date() == last.date() {
            if row != last {
                return Err(Error::domain(format!(
                    "row for {} differs from the stored one: {:?} vs {:?}",
                    last.date(),
                    row,
                    last
                )));
            }
            continue;
        }
        rows.push(row);
        added += 1;
    }
    Ok(added)
}

/// Replaces every row. Several rows may share a date but dates must not
/// decrease. Returns `true` when the rows changed.
pub fn replace_rows<R: DatedRow>(rows: &mut Vec<R>, update: Vec<R>) -> Result<bool> {
    if let Some(pair) = update.windows(2).find(|pair| pair[0].date() > pair[1].date()) {
        return Err(Error::domain(format!(
            "rows are out of order: {} then {}",
            pair[0].date(),
            pair[1].date()
        )));
    }
    if *rows == update {
        return Ok(false);
    }
    *rows = update;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Debug, PartialEq)]
    struct Row(NaiveDate, i32);

    impl DatedRow for Row {
        fn date(&self) -> NaiveDate {
            self.0
        }
    }

    fn row(d: u32, v: i32) -> Row {
        Row(NaiveDate::from_ymd_opt(2024, 3, d).unwrap(), v)
    }

    #[test]
    fn test_append_to_empty_table() {
        let mut rows = Vec::new();
        assert_eq!(append_rows(&mut rows, vec![row(1, 1), row(4, 2)]).unwrap(), 2);
        assert_eq!(rows, vec![row(1, 1), row(4, 2)]);
    }

    #[test]
    fn test_append_skips_overlap() {
        let mut rows = vec![row(1, 1), row(4, 2)];
        let added = append_rows(&mut rows, vec![row(1, 1), row(4, 2), row(5, 3)]).unwrap();
        assert_eq!(added, 1);
        assert_eq!(rows.last(), Some(&row(5, 3)));
    }

    #[test]
    fn test_append_rejects_changed_history() {
        let mut rows = vec![row(4, 2)];
        let err = append_rows(&mut rows, vec![row(4, 7), row(5, 3)]).unwrap_err();
        assert!(err.is_domain());
        assert_eq!(rows, vec![row(4, 2)]);
    }

    #[test]
    fn test_append_rejects_unordered_update() {
        let mut rows = vec![row(1, 1)];
        for update in [vec![row(3, 1), row(2, 1)], vec![row(3, 1), row(3, 2)]] {
            let err = append_rows(&mut rows, update).unwrap_err();
            assert!(err.is_domain());
        }
        assert_eq!(rows, vec![row(1, 1)]);
    }

    #[test]
    fn test_replace_allows_shared_dates() {
        let mut rows = vec![row(1, 1)];
        assert!(replace_rows(&mut rows, vec![row(1, 1), row(1, 2), row(9, 3)]).unwrap());
        assert!(!replace_rows(&mut rows, vec![row(1, 1), row(1, 2), row(9, 3)]).unwrap());
        assert!(replace_rows(&mut rows, vec![row(9, 3), row(1, 1)])
            .unwrap_err()
            .is_domain());
    }
}
