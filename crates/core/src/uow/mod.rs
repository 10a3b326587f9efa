//! Unit of work with an identity map.
//!
//! A [`UnitOfWork`] scopes one handler invocation or one DAG node run. It
//! caches every entity it loads, saves the ones loaded for update on
//! [`commit`](UnitOfWork::commit) and only then releases the messages
//! published through it.

mod unit_of_work;

#[cfg(test)]
mod unit_of_work_tests;

pub use unit_of_work::{EntityRef, UnitOfWork};
