//! Composite entities and their aggregated views.
//!
//! A [`CompositeManagedEntity`] is the handle callers hold. It owns one part
//! and links to other composites that describe the same identity; reads go
//! through a cached [`EntityAggregation`] over all of them.

pub mod aggregation;
pub mod entity;

pub use aggregation::{AggregationBuilder, EntityAggregation};
pub use entity::CompositeManagedEntity;
