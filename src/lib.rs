//! Reconciliation of Upwork earnings into Wave.
//!
//! This crate mirrors Upwork client teams as Wave customers and Upwork
//! earnings as Wave invoices with matching payments. The job is driven by
//! [`longboard::Longboard`] over two collaborator traits defined in
//! [`platform`], with blocking HTTP implementations in `client` (behind
//! the `http` feature) and in-memory ones for tests.

#[cfg(feature = "http")]
pub mod client;
pub mod config;
pub mod dates;
pub mod description;
pub mod error;
pub mod longboard;
pub mod models;
pub mod platform;
pub mod reconcile;
#[cfg(test)]
mod testing;

pub use error::{LongboardError, Result};
pub use longboard::{Longboard, LongboardBuilder, SyncReport, WindowReport};
