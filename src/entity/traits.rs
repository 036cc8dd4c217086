//! Entity contracts.
//!
//! [`Entity`] is the minimal shape every participant of the graph has: an
//! identity and a predicate-keyed property bag. [`ManagedEntity`] adds the
//! store-local id and attach/detach lifecycle a datasource needs.
//!
//! Entities are shared behind `Arc`, so every method takes `&self` and
//! implementations guard their state internally.

use std::fmt;
use std::sync::Arc;

use uuid::Uuid;

use crate::composite::CompositeManagedEntity;
use crate::datasource::CompositeDataSource;
use crate::error::DataResult;
use crate::identity::Identity;
use crate::property::Property;
use crate::value::{Predicate, Value};

/// A mutable predicate→values bag with an identity.
pub trait Entity: Send + Sync + fmt::Debug {
    /// Returns the identity of this entity.
    fn identity(&self) -> &Identity;

    /// Returns a snapshot of every non-empty property.
    fn properties(&self) -> Vec<Property>;

    /// Returns the property for `predicate`, empty if the entity has no values for it.
    fn get_property(&self, predicate: &Predicate) -> Property;

    /// Adds `value` to the property for `predicate`. Adding a present value is a no-op.
    fn add_property(&self, predicate: Predicate, value: Value) -> DataResult<()>;

    /// Removes `value` from the property for `predicate`. Removing an absent value is a no-op.
    fn remove_property(&self, predicate: &Predicate, value: &Value) -> DataResult<()>;

    /// Removes every value of `predicate`.
    fn remove_predicate(&self, predicate: &Predicate) -> DataResult<()>;

    /// Returns this entity as a composite handle, if it is one.
    ///
    /// This is the single capability check datasources use to tell their own
    /// handles apart from foreign entities.
    fn as_composite(&self) -> Option<Arc<CompositeManagedEntity>> {
        None
    }
}

/// An entity that can be owned by a [`CompositeDataSource`].
///
/// A managed entity starts detached. A datasource attaches it exactly once when
/// it becomes a member, which assigns its store-local id, and detaches it on
/// removal. It is attached to at most one datasource at a time.
pub trait ManagedEntity: Entity {
    /// Returns the store-local id, or `None` while detached.
    fn id(&self) -> Option<Uuid>;

    /// Returns the owning datasource, or `None` while detached.
    fn data_source(&self) -> Option<Arc<CompositeDataSource>>;

    /// Attaches this entity to `data_source` under `id`.
    ///
    /// Fails with `AlreadyAttached` if it is attached anywhere.
    fn attach(&self, id: Uuid, data_source: &Arc<CompositeDataSource>) -> DataResult<()>;

    /// Detaches this entity from `data_source`.
    ///
    /// Fails with `NotAttached` if it is not attached to that datasource.
    fn detach(&self, data_source: &CompositeDataSource) -> DataResult<()>;

    /// Removes every entity value referencing `identity`. Returns the number removed.
    fn remove_references(&self, identity: &Identity) -> usize;

    /// Returns the foreign entity this one wraps, if it is an adapter.
    fn wrapped(&self) -> Option<&Arc<dyn Entity>> {
        None
    }

    /// Returns true if this entity is attached to some datasource.
    fn is_attached(&self) -> bool {
        self.id().is_some()
    }
}
