//! The top-level entity store.
//!
//! A [`CompositeDataSource`] indexes composite entities by identity and by
//! store-local id, and reconciles externally supplied entities according to a
//! fixed [`MergeStrategy`].

pub mod config;
pub mod snapshot;
pub mod store;

pub use config::{DataSourceConfig, DeletionStrategy, MergeStrategy};
pub use snapshot::Snapshot;
pub use store::{CompositeDataSource, DataSourceStats};
