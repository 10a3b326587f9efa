use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;

use crate::utils::short_type_name;

/// An immutable typed payload routed by its runtime type.
pub trait Message: Any + Send + Sync + fmt::Debug {}

impl<T> Message for T where T: Any + Send + Sync + fmt::Debug {}

/// A message with its type erased, as buffered by a unit of work.
#[derive(Clone)]
pub(crate) struct Envelope {
    pub(crate) type_id: TypeId,
    pub(crate) type_name: &'static str,
    pub(crate) payload: Arc<dyn Any + Send + Sync>,
}

impl Envelope {
    pub(crate) fn new<M: Message>(msg: M) -> Self {
        Self {
            type_id: TypeId::of::<M>(),
            type_name: short_type_name::<M>(),
            payload: Arc::new(msg),
        }
    }
}

impl fmt::Debug for Envelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Envelope")
            .field("type_name", &self.type_name)
            .finish_non_exhaustive()
    }
}
