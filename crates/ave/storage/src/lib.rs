//! AVE storage abstractions.
//!
//! Store traits for every persisted AVE entity plus two adapters:
//! - [`memory::InMemoryVerifyStorage`] for development and tests
//! - `postgres::PostgresVerifyStorage` (feature `postgres`)
//!
//! Snapshots, deliveries and reports are write-once. Specs and jobs change
//! only through compare-and-set on their revision.

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]
#![warn(rust_2018_idioms)]

mod config;
mod error;
pub mod memory;
#[cfg(feature = "postgres")]
pub mod postgres;
mod traits;

pub use config::{open_storage, StorageConfig};
pub use error::{StorageError, StorageResult};
pub use memory::InMemoryVerifyStorage;
#[cfg(feature = "postgres")]
pub use postgres::PostgresVerifyStorage;
pub use traits::{
    AcceptanceStore, DeliveryStore, EvidenceStore, JobStore, ReportStore, SnapshotStore,
    SpecStore, StorageLifecycle, VerifyStorage,
};
