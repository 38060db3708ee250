//! datademo-core library.
//!
//! Bulk document walking and batched mutation for demo repositories: a paged
//! query walker, a transaction boundary that commits every N saves, listener
//! suspension with snapshot restore, and mutators that shift or randomize
//! date fields across every document type.
//!
//! # Conventions
//!
//! - **Errors**: Library code returns [`error::Result`]; `anyhow::Result` is
//!   reserved for configuration loading and binaries.
//! - **Logging**: Use `tracing` macros (`info!`, `warn!`, `debug!`).

pub mod config;
pub mod db;
pub mod error;
pub mod fields;
pub mod listeners;
pub mod lock;
pub mod model;
pub mod random;
pub mod session;
pub mod shift;
pub mod txn;
pub mod walker;
pub mod worker;

#[cfg(test)]
pub(crate) mod testing;
