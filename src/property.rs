//! Properties and the shared property bag.

use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock};

use crate::identity::Identity;
use crate::value::{EntityRef, Literal, Predicate, Value};

/// The set of values one entity holds for one predicate.
///
/// Values are kept in insertion order without duplicates. A property with no
/// values is valid and is what lookups of unknown predicates return.
#[derive(Debug, Clone, PartialEq)]
pub struct Property {
    predicate: Predicate,
    values: Vec<Value>,
}

impl Property {
    /// Creates an empty property.
    #[must_use]
    pub const fn empty(predicate: Predicate) -> Self {
        Self {
            predicate,
            values: Vec::new(),
        }
    }

    pub(crate) fn with_values(predicate: Predicate, values: Vec<Value>) -> Self {
        Self { predicate, values }
    }

    /// The predicate this property is for.
    #[must_use]
    pub const fn predicate(&self) -> &Predicate {
        &self.predicate
    }

    /// The values in insertion order.
    #[must_use]
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Number of values.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns true if there are no values.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Returns true if `value` is one of this property's values.
    #[must_use]
    pub fn contains(&self, value: &Value) -> bool {
        self.values.contains(value)
    }

    /// Returns true if the property holds `literal`.
    #[must_use]
    pub fn contains_literal(&self, literal: impl Into<Literal>) -> bool {
        self.contains(&Value::Literal(literal.into()))
    }

    /// Returns true if the property holds an entity value for `identity`.
    #[must_use]
    pub fn references(&self, identity: &Identity) -> bool {
        self.values.iter().any(|v| v.references(identity))
    }

    /// Iterates over the literal values.
    pub fn literals(&self) -> impl Iterator<Item = &Literal> {
        self.values.iter().filter_map(Value::as_literal)
    }

    /// Iterates over the entity values.
    pub fn entities(&self) -> impl Iterator<Item = &EntityRef> {
        self.values.iter().filter_map(Value::as_entity)
    }

    /// Appends every value of `other` not already present.
    pub(crate) fn absorb(&mut self, other: &[Value]) {
        for value in other {
            if !self.values.contains(value) {
                self.values.push(value.clone());
            }
        }
    }
}

/// Lock-guarded predicate→values map backing the concrete entity types.
///
/// Every mutation is a single map edit, so a guard recovered from a poisoned
/// lock still sees a consistent map.
#[derive(Debug, Default)]
pub(crate) struct PropertyBag {
    values: RwLock<BTreeMap<Predicate, Vec<Value>>>,
}

impl PropertyBag {
    pub(crate) fn properties(&self) -> Vec<Property> {
        let values = self.values.read().unwrap_or_else(PoisonError::into_inner);
        values
            .iter()
            .map(|(predicate, vs)| Property::with_values(predicate.clone(), vs.clone()))
            .collect()
    }

    pub(crate) fn get(&self, predicate: &Predicate) -> Property {
        let values = self.values.read().unwrap_or_else(PoisonError::into_inner);
        values.get(predicate).map_or_else(
            || Property::empty(predicate.clone()),
            |vs| Property::with_values(predicate.clone(), vs.clone()),
        )
    }

    /// Adds `value`; returns false if it was already present.
    pub(crate) fn add(&self, predicate: Predicate, value: Value) -> bool {
        let mut values = self.values.write().unwrap_or_else(PoisonError::into_inner);
        let slot = values.entry(predicate).or_default();
        if slot.contains(&value) {
            return false;
        }
        slot.push(value);
        true
    }

    /// Removes `value`; returns false if it was absent.
    pub(crate) fn remove(&self, predicate: &Predicate, value: &Value) -> bool {
        let mut values = self.values.write().unwrap_or_else(PoisonError::into_inner);
        let Some(slot) = values.get_mut(predicate) else {
            return false;
        };
        let before = slot.len();
        slot.retain(|v| v != value);
        let removed = slot.len() != before;
        if slot.is_empty() {
            values.remove(predicate);
        }
        removed
    }

    /// Drops every value of `predicate`; returns false if there were none.
    pub(crate) fn remove_predicate(&self, predicate: &Predicate) -> bool {
        let mut values = self.values.write().unwrap_or_else(PoisonError::into_inner);
        values.remove(predicate).is_some()
    }

    /// Removes every entity value referencing `identity`; returns how many went.
    pub(crate) fn remove_references(&self, identity: &Identity) -> usize {
        let mut values = self.values.write().unwrap_or_else(PoisonError::into_inner);
        let mut removed = 0;
        values.retain(|_, slot| {
            let before = slot.len();
            slot.retain(|v| !v.references(identity));
            removed += before - slot.len();
            !slot.is_empty()
        });
        removed
    }
}
