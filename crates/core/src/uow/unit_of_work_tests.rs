#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;

    use crate::bus::{Bus, Handler, IgnoreErrorsPolicy};
    use crate::errors::Result;
    use crate::store::Record;
    use crate::test_support::{bare_bus, day, memory_store, Counter, Note};
    use crate::uow::UnitOfWork;

    #[derive(Debug)]
    struct Ping(u32);

    #[derive(Default)]
    struct PingRecorder {
        seen: Mutex<Vec<u32>>,
    }

    #[async_trait]
    impl Handler<Ping> for PingRecorder {
        async fn handle(&self, _ctx: &UnitOfWork, msg: &Ping) -> Result<()> {
            self.seen.lock().unwrap().push(msg.0);
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_repeated_get_returns_same_instance() {
        let (repository, bus) = bare_bus();
        let ctx = bus.uow();

        let first = ctx.get::<Counter>("x").await.unwrap();
        let second = ctx.get::<Counter>("x").await.unwrap();
        let for_update = ctx.get_for_update::<Counter>("x").await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert!(Arc::ptr_eq(&first, &for_update));
        assert_eq!(repository.len(), 1);

        // Same uid in another collection is another entity.
        let note = ctx.get::<Note>("x").await.unwrap();
        assert_eq!(note.lock().await.data(), &Note::default());
        assert_eq!(repository.len(), 2);
    }

    #[tokio::test]
    async fn test_read_only_entities_are_not_saved() {
        let (_, bus) = bare_bus();
        let ctx = bus.uow();

        let counter = ctx.get::<Counter>("x").await.unwrap();
        counter.lock().await.value = 10;
        ctx.commit().await.unwrap();

        let stored: Record<Counter> = bus.store().get("x").await.unwrap();
        assert_eq!(stored.ver(), 0);
        assert_eq!(stored.value, 0);
    }

    #[tokio::test]
    async fn test_get_for_update_upgrades_cached_entity() {
        let (_, bus) = bare_bus();
        let ctx = bus.uow();

        let counter = ctx.get::<Counter>("x").await.unwrap();
        counter.lock().await.value = 3;
        ctx.get_for_update::<Counter>("x").await.unwrap();
        ctx.commit().await.unwrap();

        let stored: Record<Counter> = bus.store().get("x").await.unwrap();
        assert_eq!(stored.ver(), 1);
        assert_eq!(stored.value, 3);
    }

    #[tokio::test]
    async fn test_commit_then_reload_in_new_unit_of_work() {
        let (_, bus) = bare_bus();

        let ctx = bus.uow();
        let counter = ctx.get_for_update::<Counter>("x").await.unwrap();
        {
            let mut counter = counter.lock().await;
            counter.value = 7;
            counter.advance_day(day(2024, 6, 3)).unwrap();
        }
        ctx.commit().await.unwrap();

        let reloaded = bus.uow().get::<Counter>("x").await.unwrap();
        let reloaded = reloaded.lock().await;
        assert_eq!(reloaded.value, 7);
        assert_eq!(reloaded.ver(), 1);
        assert_eq!(reloaded.day(), day(2024, 6, 3));
    }

    #[tokio::test]
    async fn test_dropped_unit_of_work_persists_and_publishes_nothing() {
        let (_, store) = memory_store();
        let recorder = Arc::new(PingRecorder::default());
        let bus = Bus::builder(store)
            .register::<Ping, _, _>(recorder.clone(), IgnoreErrorsPolicy)
            .build();

        {
            let ctx = bus.uow();
            let counter = ctx.get_for_update::<Counter>("x").await.unwrap();
            counter.lock().await.value = 99;
            ctx.publish(Ping(1));
        }
        bus.wait().await.unwrap();

        let stored: Record<Counter> = bus.store().get("x").await.unwrap();
        assert_eq!(stored.ver(), 0);
        assert!(recorder.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_commit_releases_messages_in_publish_order() {
        let (_, store) = memory_store();
        let recorder = Arc::new(PingRecorder::default());
        let bus = Bus::builder(store)
            .register::<Ping, _, _>(recorder.clone(), IgnoreErrorsPolicy)
            .build();

        let ctx = bus.uow();
        for idx in 1..=5 {
            ctx.publish(Ping(idx));
        }
        // Nothing leaves before commit.
        tokio::task::yield_now().await;
        assert_eq!(bus.in_flight(), 0);

        ctx.commit().await.unwrap();
        bus.wait().await.unwrap();

        assert_eq!(*recorder.seen.lock().unwrap(), vec![1, 2, 3, 4, 5]);
    }

    #[tokio::test]
    async fn test_stale_unit_of_work_fails_with_conflict() {
        let (_, bus) = bare_bus();

        let late = bus.uow();
        let stale = late.get_for_update::<Counter>("x").await.unwrap();
        assert_eq!(stale.lock().await.ver(), 0);

        let n1 = bus.uow();
        n1.get_for_update::<Counter>("x")
            .await
            .unwrap()
            .lock()
            .await
            .value = 1;
        n1.commit().await.unwrap();
        let stored: Record<Counter> = bus.store().get("x").await.unwrap();
        assert_eq!(stored.ver(), 1);

        stale.lock().await.value = 2;
        let err = late.commit().await.unwrap_err();
        assert!(err.is_conflict());

        let stored: Record<Counter> = bus.store().get("x").await.unwrap();
        assert_eq!(stored.ver(), 1);
        assert_eq!(stored.value, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_saves_of_one_uid_have_one_winner() {
        let (_, bus) = bare_bus();

        let first = bus.uow();
        let second = bus.uow();
        first
            .get_for_update::<Counter>("x")
            .await
            .unwrap()
            .lock()
            .await
            .value = 1;
        second
            .get_for_update::<Counter>("x")
            .await
            .unwrap()
            .lock()
            .await
            .value = 2;

        let (a, b) = tokio::join!(
            tokio::spawn(first.commit()),
            tokio::spawn(second.commit())
        );
        let outcomes = [a.unwrap(), b.unwrap()];

        assert_eq!(outcomes.iter().filter(|outcome| outcome.is_ok()).count(), 1);
        assert!(outcomes
            .iter()
            .any(|outcome| matches!(outcome, Err(err) if err.is_conflict())));
        let stored: Record<Counter> = bus.store().get("x").await.unwrap();
        assert_eq!(stored.ver(), 1);
    }

    #[tokio::test]
    async fn test_store_failure_surfaces_as_adapter_error() {
        let bus = Bus::builder(crate::store::EntityStore::new(Arc::new(
            crate::test_support::BrokenRepository,
        )))
        .build();

        let err = bus.uow().get::<Counter>("x").await.unwrap_err();
        assert!(matches!(err, crate::errors::Error::Adapter(_)));
    }
}
