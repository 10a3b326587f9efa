//! In-process message bus.
//!
//! Handlers are registered per message type on a [`BusBuilder`]. Every
//! publish fans out to all matching handlers, each in its own task and its
//! own [`UnitOfWork`](crate::uow::UnitOfWork), retried under the
//! [`Policy`] it was registered with.

mod message;
mod message_bus;
mod policy;


pub(crate) use message::Envelope;
pub use message::Message;
pub use message_bus::{Bus, BusBuilder, Handler};
pub use policy::{Backoff, IgnoreErrorsPolicy, IndefiniteRetryPolicy, Policy, PolicyFactory};
