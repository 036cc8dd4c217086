//! Plain entities.

use crate::entity::Entity;
use crate::error::DataResult;
use crate::identity::Identity;
use crate::property::{Property, PropertyBag};
use crate::value::{Predicate, Value};

/// A plain entity that belongs to no datasource.
///
/// Callers use it to describe foreign graphs that are then handed to
/// [`CompositeDataSource::merge`](crate::CompositeDataSource::merge).
///
/// # Examples
///
/// ```
/// use entigraph::{BasicEntity, Entity, Identity, Predicate, Value};
///
/// let person = BasicEntity::new(Identity::managed("Person", "1").unwrap());
/// let name = Predicate::new("http://xmlns.com/foaf/0.1/name").unwrap();
/// person.add_property(name.clone(), Value::from("Ada")).unwrap();
/// assert!(person.get_property(&name).contains_literal("Ada"));
/// ```
#[derive(Debug)]
pub struct BasicEntity {
    identity: Identity,
    properties: PropertyBag,
}

impl BasicEntity {
    /// Creates an entity with no properties.
    #[must_use]
    pub fn new(identity: Identity) -> Self {
        Self {
            identity,
            properties: PropertyBag::default(),
        }
    }

    /// Adds a value, returning `self` for chaining during construction.
    #[must_use]
    pub fn with(self, predicate: Predicate, value: impl Into<Value>) -> Self {
        self.properties.add(predicate, value.into());
        self
    }
}

impl Entity for BasicEntity {
    fn identity(&self) -> &Identity {
        &self.identity
    }

    fn properties(&self) -> Vec<Property> {
        self.properties.properties()
    }

    fn get_property(&self, predicate: &Predicate) -> Property {
        self.properties.get(predicate)
    }

    fn add_property(&self, predicate: Predicate, value: Value) -> DataResult<()> {
        self.properties.add(predicate, value);
        Ok(())
    }

    fn remove_property(&self, predicate: &Predicate, value: &Value) -> DataResult<()> {
        self.properties.remove(predicate, value);
        Ok(())
    }

    fn remove_predicate(&self, predicate: &Predicate) -> DataResult<()> {
        self.properties.remove_predicate(predicate);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_entity_properties() {
        let p = Predicate::new("urn:p:name").unwrap();
        let q = Predicate::new("urn:p:age").unwrap();
        let e = BasicEntity::new(Identity::local(1))
            .with(p.clone(), "Ada")
            .with(q.clone(), 36i64);
        assert_eq!(e.properties().len(), 2);
        e.remove_predicate(&q).unwrap();
        assert_eq!(e.properties().len(), 1);
        e.remove_property(&p, &Value::from("Ada")).unwrap();
        assert!(e.properties().is_empty());
    }
}
