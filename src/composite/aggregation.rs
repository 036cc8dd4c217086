//! Read-only merged view over the parts of one identity.

use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::entity::{Entity, ManagedEntity};
use crate::error::{DataError, DataResult};
use crate::identity::Identity;
use crate::property::Property;
use crate::value::{Predicate, Value};

fn part_addr(part: &Arc<dyn ManagedEntity>) -> *const () {
    Arc::as_ptr(part).cast::<()>()
}

/// Union view over every part that describes one identity.
///
/// Parts are ordered by breadth-first discovery from the owning composite, its
/// own part first. Values of a merged property appear in that part order, then
/// in each part's own value order, without duplicates.
///
/// Aggregations are built and cached by
/// [`CompositeManagedEntity`](crate::CompositeManagedEntity) and discarded when
/// any part changes. Every mutating [`Entity`] method fails with
/// [`DataError::UnsupportedOperation`].
///
/// Equality and hashing follow the ordered part list: the same parts in a
/// different order compare unequal.
pub struct EntityAggregation {
    owner: Identity,
    parts: Vec<Arc<dyn ManagedEntity>>,
}

impl EntityAggregation {
    /// Starts building an aggregation.
    #[must_use]
    pub fn builder() -> AggregationBuilder {
        AggregationBuilder::default()
    }

    pub(crate) fn from_parts(
        owner: Identity,
        first: Arc<dyn ManagedEntity>,
        rest: impl IntoIterator<Item = Arc<dyn ManagedEntity>>,
    ) -> Self {
        let mut parts = vec![first];
        parts.extend(rest);
        Self { owner, parts }
    }

    /// Returns the identity every part shares.
    #[must_use]
    pub const fn owner(&self) -> &Identity {
        &self.owner
    }

    /// Returns the parts in discovery order.
    #[must_use]
    pub fn parts(&self) -> &[Arc<dyn ManagedEntity>] {
        &self.parts
    }

    /// Returns the number of parts. Never zero.
    #[must_use]
    pub fn len(&self) -> usize {
        self.parts.len()
    }

    /// Always false; kept for API symmetry with `len`.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// Merges every part's properties into one predicate-keyed map.
    #[must_use]
    pub fn property_map(&self) -> BTreeMap<Predicate, Property> {
        let mut merged: BTreeMap<Predicate, Property> = BTreeMap::new();
        for part in &self.parts {
            for property in part.properties() {
                merged
                    .entry(property.predicate().clone())
                    .or_insert_with(|| Property::empty(property.predicate().clone()))
                    .absorb(property.values());
            }
        }
        merged
    }

    fn unsupported(operation: &'static str) -> DataError {
        DataError::UnsupportedOperation { operation }
    }
}

impl Entity for EntityAggregation {
    fn identity(&self) -> &Identity {
        &self.owner
    }

    fn properties(&self) -> Vec<Property> {
        self.property_map().into_values().collect()
    }

    fn get_property(&self, predicate: &Predicate) -> Property {
        let mut merged = Property::empty(predicate.clone());
        for part in &self.parts {
            merged.absorb(part.get_property(predicate).values());
        }
        merged
    }

    fn add_property(&self, _predicate: Predicate, _value: Value) -> DataResult<()> {
        Err(Self::unsupported("add_property"))
    }

    fn remove_property(&self, _predicate: &Predicate, _value: &Value) -> DataResult<()> {
        Err(Self::unsupported("remove_property"))
    }

    fn remove_predicate(&self, _predicate: &Predicate) -> DataResult<()> {
        Err(Self::unsupported("remove_predicate"))
    }
}

impl PartialEq for EntityAggregation {
    fn eq(&self, other: &Self) -> bool {
        self.owner == other.owner
            && self.parts.len() == other.parts.len()
            && self
                .parts
                .iter()
                .zip(&other.parts)
                .all(|(a, b)| part_addr(a) == part_addr(b))
    }
}

impl Eq for EntityAggregation {}

impl Hash for EntityAggregation {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.owner.hash(state);
        for part in &self.parts {
            part_addr(part).hash(state);
        }
    }
}

impl fmt::Debug for EntityAggregation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityAggregation")
            .field("owner", &self.owner)
            .field("parts", &self.parts.len())
            .finish()
    }
}

/// Builder for [`EntityAggregation`].
///
/// Requires an owner and at least one part; every part must carry the owner's
/// identity.
#[derive(Default)]
pub struct AggregationBuilder {
    owner: Option<Identity>,
    parts: Vec<Arc<dyn ManagedEntity>>,
}

impl AggregationBuilder {
    /// Set the shared identity (required).
    #[must_use]
    pub fn owner(mut self, owner: Identity) -> Self {
        self.owner = Some(owner);
        self
    }

    /// Append a part (at least one required).
    #[must_use]
    pub fn part(mut self, part: Arc<dyn ManagedEntity>) -> Self {
        self.parts.push(part);
        self
    }

    /// Append several parts in order.
    #[must_use]
    pub fn parts(mut self, parts: impl IntoIterator<Item = Arc<dyn ManagedEntity>>) -> Self {
        self.parts.extend(parts);
        self
    }

    /// Build the aggregation.
    ///
    /// Returns `MissingField` without an owner or a part, and
    /// `IdentityMismatch` if a part has another identity.
    pub fn build(self) -> DataResult<EntityAggregation> {
        let owner = self
            .owner
            .ok_or(DataError::MissingField { field: "owner" })?;
        if self.parts.is_empty() {
            return Err(DataError::MissingField { field: "parts" });
        }
        if let Some(stranger) = self.parts.iter().find(|p| p.identity() != &owner) {
            return Err(DataError::IdentityMismatch {
                expected: owner,
                actual: stranger.identity().clone(),
            });
        }
        Ok(EntityAggregation {
            owner,
            parts: self.parts,
        })
    }
}

impl fmt::Debug for AggregationBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AggregationBuilder")
            .field("owner", &self.owner)
            .field("parts", &self.parts.len())
            .finish()
    }
}
