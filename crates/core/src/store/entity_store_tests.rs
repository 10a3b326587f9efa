#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use futures::TryStreamExt;

    use crate::constants::{start_day, SCAN_PAGE_SIZE};
    use crate::errors::{AdapterError, Error};
    use crate::store::{EntityStore, Record};
    use crate::test_support::{day, memory_store, BrokenRepository, Counter, Note};

    #[tokio::test]
    async fn test_get_creates_placeholder_at_version_zero() {
        let (repository, store) = memory_store();

        let record: Record<Counter> = store.get("x").await.unwrap();

        assert_eq!(record.ver(), 0);
        assert_eq!(record.day(), start_day());
        assert_eq!(record.data(), &Counter::default());
        assert_eq!(repository.len(), 1);
    }

    #[tokio::test]
    async fn test_save_then_get_round_trip() {
        let (_, store) = memory_store();

        let mut record: Record<Counter> = store.get("x").await.unwrap();
        record.value = 42;
        record.advance_day(day(2024, 3, 1)).unwrap();
        store.save(&record).await.unwrap();

        let reloaded: Record<Counter> = store.get("x").await.unwrap();
        assert_eq!(reloaded.ver(), 1);
        assert_eq!(reloaded.day(), day(2024, 3, 1));
        assert_eq!(reloaded.data(), record.data());
    }

    #[tokio::test]
    async fn test_stale_version_is_a_conflict() {
        let (_, store) = memory_store();

        let first: Record<Counter> = store.get("x").await.unwrap();
        let second: Record<Counter> = store.get("x").await.unwrap();

        store.save(&first).await.unwrap();
        let err = store.save(&second).await.unwrap_err();

        match err {
            Error::ConcurrencyConflict {
                collection,
                uid,
                ver,
            } => {
                assert_eq!(collection, "counters");
                assert_eq!(uid, "x");
                assert_eq!(ver, 0);
            }
            other => panic!("expected conflict, got {other:?}"),
        }
        let stored: Record<Counter> = store.get("x").await.unwrap();
        assert_eq!(stored.ver(), 1);
    }

    #[tokio::test]
    async fn test_saving_twice_from_same_record_conflicts() {
        let (_, store) = memory_store();

        let record: Record<Counter> = store.get("x").await.unwrap();
        store.save(&record).await.unwrap();

        assert!(store.save(&record).await.unwrap_err().is_conflict());
    }

    #[tokio::test]
    async fn test_day_regression_is_a_conflict() {
        let (_, store) = memory_store();

        let mut newer: Record<Counter> = store.get("x").await.unwrap();
        newer.advance_day(day(2024, 5, 2)).unwrap();
        store.save(&newer).await.unwrap();

        // Forge an older copy at the current version but an earlier day.
        let mut older: Record<Counter> = store.get("x").await.unwrap();
        *older.data_mut() = Counter { value: 1 };
        let older = Record::new(older.revision().clone(), day(2024, 5, 1), older.into_data());

        assert!(store.save(&older).await.unwrap_err().is_conflict());
    }

    #[tokio::test]
    async fn test_delete_missing_entity_fails() {
        let (repository, store) = memory_store();

        let record: Record<Note> = store.get("n1").await.unwrap();
        store.delete(&record).await.unwrap();
        assert!(repository.is_empty());

        let err = store.delete(&record).await.unwrap_err();
        assert!(matches!(err, Error::Adapter(AdapterError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_get_after_delete_starts_over() {
        let (_, store) = memory_store();

        let mut record: Record<Counter> = store.get("x").await.unwrap();
        record.value = 5;
        store.save(&record).await.unwrap();
        let saved: Record<Counter> = store.get("x").await.unwrap();
        store.delete(&saved).await.unwrap();

        let fresh: Record<Counter> = store.get("x").await.unwrap();
        assert_eq!(fresh.ver(), 0);
        assert_eq!(fresh.value, 0);
    }

    #[tokio::test]
    async fn test_get_all_streams_every_page() {
        let (_, store) = memory_store();
        let total = usize::try_from(SCAN_PAGE_SIZE).unwrap() + 7;

        for idx in 0..total {
            let mut record: Record<Counter> = store.get(&format!("c{idx:04}")).await.unwrap();
            record.value = i64::try_from(idx).unwrap();
            store.save(&record).await.unwrap();
        }
        // Other collections stay out of the scan.
        let _: Record<Note> = store.get("n1").await.unwrap();

        let all: Vec<Record<Counter>> = store.get_all::<Counter>().try_collect().await.unwrap();
        assert_eq!(all.len(), total);
        assert!(all.iter().all(|record| record.ver() == 1));

        // Restartable: a second call scans again from the beginning.
        let again: Vec<Record<Counter>> = store.get_all::<Counter>().try_collect().await.unwrap();
        assert_eq!(again.len(), total);
    }

    #[tokio::test]
    async fn test_io_failure_is_an_adapter_error() {
        let store = EntityStore::new(Arc::new(BrokenRepository));

        let err = store.get::<Counter>("x").await.unwrap_err();
        assert!(matches!(err, Error::Adapter(_)));
        assert!(!err.is_conflict());

        let stream_err = store
            .get_all::<Counter>()
            .try_collect::<Vec<_>>()
            .await
            .unwrap_err();
        assert!(matches!(stream_err, Error::Adapter(_)));
    }
}
