use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError};

use async_trait::async_trait;
use futures::future::try_join_all;
use log::debug;
use tokio::sync::Mutex;

use crate::bus::{Bus, Envelope, Message};
use crate::errors::{Error, Result};
use crate::store::{Entity, EntityStore, Record};
use crate::utils::short_type_name;

/// Shared handle to an entity cached by a unit of work.
///
/// Every load of the same entity within one unit of work returns a clone of
/// the same handle.
pub type EntityRef<E> = Arc<Mutex<Record<E>>>;

/// Type-erased view of a cached entity.
#[async_trait]
trait CachedEntity: Send + Sync {
    fn as_any(&self) -> &dyn Any;

    async fn save(&self, store: &EntityStore) -> Result<()>;
}

#[async_trait]
impl<E: Entity> CachedEntity for EntityRef<E> {
    fn as_any(&self) -> &dyn Any {
        self
    }

    async fn save(&self, store: &EntityStore) -> Result<()> {
        let record = self.lock().await;
        store.save(&*record).await
    }
}

struct CachedEntry {
    entity: Box<dyn CachedEntity>,
    dirty: bool,
}

type IdentityKey = (TypeId, String);

/// Transactional scope over the entity store.
///
/// Dropping a unit of work without calling [`commit`](Self::commit) is the
/// rollback: nothing is saved and buffered messages are discarded.
pub struct UnitOfWork {
    bus: Bus,
    identity_map: Mutex<HashMap<IdentityKey, CachedEntry>>,
    outbox: std::sync::Mutex<Vec<Envelope>>,
}

impl UnitOfWork {
    pub(crate) fn new(bus: Bus) -> Self {
        Self {
            bus,
            identity_map: Mutex::new(HashMap::new()),
            outbox: std::sync::Mutex::new(Vec::new()),
        }
    }

    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    pub fn store(&self) -> &EntityStore {
        self.bus.store()
    }

    /// Loads an entity for reading.
    pub async fn get<E: Entity>(&self, uid: &str) -> Result<EntityRef<E>> {
        self.load(uid, false).await
    }

    /// Loads an entity and marks it to be saved on commit.
    ///
    /// An entity already cached for reading is upgraded.
    pub async fn get_for_update<E: Entity>(&self, uid: &str) -> Result<EntityRef<E>> {
        self.load(uid, true).await
    }

    /// Buffers a message until the unit of work commits.
    pub fn publish<M: Message>(&self, msg: M) {
        self.outbox
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Envelope::new(msg));
    }

    /// Saves every entity loaded for update, then releases buffered messages
    /// in publish order.
    ///
    /// Saves run concurrently. The first failure aborts the ones still
    /// pending and no message is released; saves that already completed stay
    /// persisted.
    pub async fn commit(self) -> Result<()> {
        let identity_map = self.identity_map.into_inner();
        let store = self.bus.store();

        let saves = identity_map
            .values()
            .filter(|entry| entry.dirty)
            .map(|entry| entry.entity.save(store));
        let saved = try_join_all(saves).await?.len();

        let outbox = self
            .outbox
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner);
        debug!(
            "Unit of work committed {} entit(ies) and {} message(s)",
            saved,
            outbox.len()
        );
        for envelope in outbox {
            self.bus.publish_envelope(envelope);
        }
        Ok(())
    }

    async fn load<E: Entity>(&self, uid: &str, for_update: bool) -> Result<EntityRef<E>> {
        let key = (TypeId::of::<E>(), uid.to_string());
        // Held across the store load so concurrent loads of one uid share it.
        let mut identity_map = self.identity_map.lock().await;

        if let Some(entry) = identity_map.get_mut(&key) {
            entry.dirty |= for_update;
            return entry
                .entity
                .as_any()
                .downcast_ref::<EntityRef<E>>()
                .cloned()
                .ok_or_else(|| {
                    Error::service(format!(
                        "cached {}/{} is not a {}",
                        E::COLLECTION,
                        uid,
                        short_type_name::<E>()
                    ))
                });
        }

        let record = self.bus.store().get::<E>(uid).await?;
        let entity: EntityRef<E> = Arc::new(Mutex::new(record));
        identity_map.insert(
            key,
            CachedEntry {
                entity: Box::new(Arc::clone(&entity)),
                dirty: for_update,
            },
        );
        Ok(entity)
    }
}
