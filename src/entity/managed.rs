//! Native managed entities and attachment bookkeeping.

use std::sync::{Arc, Mutex, PoisonError, Weak};

use uuid::Uuid;

use crate::datasource::CompositeDataSource;
use crate::entity::{Entity, ManagedEntity};
use crate::error::{DataError, DataResult};
use crate::identity::Identity;
use crate::property::{Property, PropertyBag};
use crate::value::{Predicate, Value};

/// The `(id, datasource)` pair of an attached entity.
#[derive(Debug, Clone)]
pub struct Attachment {
    id: Uuid,
    data_source: Weak<CompositeDataSource>,
}

impl Attachment {
    /// Returns the store-local id.
    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.id
    }

    /// Returns the datasource, if it is still alive.
    #[must_use]
    pub fn data_source(&self) -> Option<Arc<CompositeDataSource>> {
        self.data_source.upgrade()
    }

    fn belongs_to(&self, data_source: &CompositeDataSource) -> bool {
        std::ptr::eq(self.data_source.as_ptr(), data_source)
    }
}

/// Holds the attachment of a managed entity.
///
/// The pair is replaced as a whole under a mutex, so readers never observe an
/// id from one attachment with the datasource of another.
#[derive(Debug, Default)]
pub(crate) struct AttachmentSlot {
    current: Mutex<Option<Attachment>>,
}

impl AttachmentSlot {
    pub(crate) fn get(&self) -> Option<Attachment> {
        self.current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub(crate) fn attach(
        &self,
        identity: &Identity,
        id: Uuid,
        data_source: &Arc<CompositeDataSource>,
    ) -> DataResult<()> {
        let mut current = self.current.lock().unwrap_or_else(PoisonError::into_inner);
        if current.is_some() {
            return Err(DataError::AlreadyAttached {
                identity: identity.clone(),
            });
        }
        *current = Some(Attachment {
            id,
            data_source: Arc::downgrade(data_source),
        });
        Ok(())
    }

    pub(crate) fn detach(
        &self,
        identity: &Identity,
        data_source: &CompositeDataSource,
    ) -> DataResult<()> {
        let mut current = self.current.lock().unwrap_or_else(PoisonError::into_inner);
        match current.as_ref() {
            Some(attachment) if attachment.belongs_to(data_source) => {
                *current = None;
                Ok(())
            }
            _ => Err(DataError::NotAttached {
                identity: identity.clone(),
            }),
        }
    }
}

/// The entity type datasources create for identities they mint themselves.
#[derive(Debug)]
pub struct NativeEntity {
    identity: Identity,
    properties: PropertyBag,
    attachment: AttachmentSlot,
}

impl NativeEntity {
    /// Creates a detached entity with no properties.
    #[must_use]
    pub fn new(identity: Identity) -> Self {
        Self {
            identity,
            properties: PropertyBag::default(),
            attachment: AttachmentSlot::default(),
        }
    }

    /// Returns the current attachment, if any.
    #[must_use]
    pub fn attachment(&self) -> Option<Attachment> {
        self.attachment.get()
    }
}

impl Entity for NativeEntity {
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

impl ManagedEntity for NativeEntity {
    fn id(&self) -> Option<Uuid> {
        self.attachment.get().map(|a| a.id())
    }

    fn data_source(&self) -> Option<Arc<CompositeDataSource>> {
        self.attachment.get().and_then(|a| a.data_source())
    }

    fn attach(&self, id: Uuid, data_source: &Arc<CompositeDataSource>) -> DataResult<()> {
        self.attachment.attach(&self.identity, id, data_source)
    }

    fn detach(&self, data_source: &CompositeDataSource) -> DataResult<()> {
        self.attachment.detach(&self.identity, data_source)
    }

    fn remove_references(&self, identity: &Identity) -> usize {
        self.properties.remove_references(identity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datasource::DataSourceConfig;

    #[test]
    fn test_attach_detach_lifecycle() {
        let ds = CompositeDataSource::new(DataSourceConfig::default());
        let entity = NativeEntity::new(Identity::local(1));
        assert!(!entity.is_attached());
        assert!(entity.data_source().is_none());

        let id = Uuid::new_v4();
        entity.attach(id, &ds).unwrap();
        assert_eq!(entity.id(), Some(id));
        assert!(Arc::ptr_eq(&entity.data_source().unwrap(), &ds));

        entity.detach(&ds).unwrap();
        assert!(entity.id().is_none());
    }

    #[test]
    fn test_attach_twice_fails() {
        let ds = CompositeDataSource::new(DataSourceConfig::default());
        let other = CompositeDataSource::new(DataSourceConfig::default());
        let entity = NativeEntity::new(Identity::local(1));
        entity.attach(Uuid::new_v4(), &ds).unwrap();
        assert!(matches!(
            entity.attach(Uuid::new_v4(), &other),
            Err(DataError::AlreadyAttached { .. })
        ));
    }

    #[test]
    fn test_detach_from_wrong_datasource_fails() {
        let ds = CompositeDataSource::new(DataSourceConfig::default());
        let other = CompositeDataSource::new(DataSourceConfig::default());
        let entity = NativeEntity::new(Identity::local(1));
        assert!(entity.detach(&ds).is_err());
        entity.attach(Uuid::new_v4(), &ds).unwrap();
        assert!(matches!(
            entity.detach(&other),
            Err(DataError::NotAttached { .. })
        ));
        assert!(entity.is_attached());
    }

    #[test]
    fn test_remove_references() {
        let target = Arc::new(crate::entity::BasicEntity::new(Identity::local(2)));
        let p = Predicate::new("urn:p:knows").unwrap();
        let entity = NativeEntity::new(Identity::local(1));
        entity.add_property(p.clone(), Value::from(target)).unwrap();
        entity.add_property(p.clone(), Value::from("note")).unwrap();
        assert_eq!(entity.remove_references(&Identity::local(2)), 1);
        let prop = entity.get_property(&p);
        assert_eq!(prop.len(), 1);
        assert!(prop.contains_literal("note"));
    }
}
