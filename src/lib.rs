//! # Entigraph - In-memory entity graph store
//!
//! Entigraph keeps a graph of entities, each a predicate-keyed bag of literal
//! and entity-valued properties, inside a thread-safe datasource. Entities from
//! elsewhere are reconciled with the store according to a merge strategy, and
//! several representations of one identity can be joined into a single
//! composite whose reads see an aggregated view.
//!
//! ## Core Concepts
//!
//! - **Identity**: Local, managed, relative or external key with a synthesized URI
//! - **Entity**: A predicate→values bag with an identity
//! - **CompositeManagedEntity**: The handle callers hold; joins parts sharing an identity
//! - **EntityAggregation**: Read-only merged view over several parts
//! - **CompositeDataSource**: The store, indexed by identity and by store-local id
//!
//! ## Usage
//!
//! ```rust
//! use std::sync::Arc;
//! use entigraph::{
//!     BasicEntity, CompositeDataSource, DataSourceConfig, Entity, Identity, MergeStrategy,
//!     Predicate,
//! };
//!
//! let ds = CompositeDataSource::new(
//!     DataSourceConfig::default().with_merge_strategy(MergeStrategy::ByValue),
//! );
//! let name = Predicate::new("http://xmlns.com/foaf/0.1/name")?;
//! let knows = Predicate::new("http://xmlns.com/foaf/0.1/knows")?;
//!
//! let bob = Arc::new(BasicEntity::new(Identity::local(2)).with(name.clone(), "Bob"));
//! let alice = Arc::new(
//!     BasicEntity::new(Identity::local(1))
//!         .with(name.clone(), "Alice")
//!         .with(knows.clone(), bob),
//! );
//!
//! let stored = ds.merge(alice)?;
//! assert_eq!(ds.len()?, 2);
//! assert!(stored.get_property(&knows).references(&Identity::local(2)));
//! # Ok::<(), entigraph::DataError>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod composite;
pub mod datasource;
pub mod entity;
pub mod error;
pub mod identity;
pub mod property;
pub mod value;

// Re-export primary types at crate root for convenience
pub use composite::{AggregationBuilder, CompositeManagedEntity, EntityAggregation};
pub use datasource::{
    CompositeDataSource, DataSourceConfig, DataSourceStats, DeletionStrategy, MergeStrategy,
    Snapshot,
};
pub use entity::{
    Attachment, BackoffConfig, BasicEntity, Entity, ManagedEntity, ManagedEntityAdapter,
    NativeEntity,
};
pub use error::{DataError, DataResult};
pub use identity::{
    Identity, IdentityFactory, IdentityKey, IdentityKind, ManagedKey, UriSynthesizer,
    UrnSynthesizer,
};
pub use property::Property;
pub use value::{EntityRef, Literal, Predicate, Value};
