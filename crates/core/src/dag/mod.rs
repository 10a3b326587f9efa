//! Dependency-graph task scheduler.
//!
//! A [`Dag`] runs [`Action`]s in dependency order. A node starts once all of
//! its parents completed; each node runs in its own
//! [`UnitOfWork`](crate::uow::UnitOfWork) and may be retried with backoff.
//!
//! - [`dag_model`] - Node handles and run status
//! - [`dag_traits`] - The `Action` contract
//! - [`dag_scheduler`] - Graph building and execution

mod dag_model;
mod dag_scheduler;
mod dag_traits;


pub use dag_model::{DagStatus, NodeHandle};
pub use dag_scheduler::Dag;
pub use dag_traits::Action;
