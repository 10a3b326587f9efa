//! Messages of the daily data-refresh flow.
//!
//! These are published on the [`Bus`](crate::bus::Bus) after successful
//! units of work and describe facts that already happened.

mod messages;

pub use messages::*;
