//! Point-in-time views of a datasource.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::composite::CompositeManagedEntity;

/// Immutable list of the entities a datasource held at one instant.
///
/// Entities are ordered by identity. Later mutation of the datasource does not
/// affect the snapshot; the entities themselves stay live handles.
#[derive(Debug, Clone)]
pub struct Snapshot {
    taken_at: DateTime<Utc>,
    entities: Vec<Arc<CompositeManagedEntity>>,
}

impl Snapshot {
    pub(crate) fn new(entities: Vec<Arc<CompositeManagedEntity>>) -> Self {
        Self {
            taken_at: Utc::now(),
            entities,
        }
    }

    /// When the snapshot was taken.
    #[must_use]
    pub const fn taken_at(&self) -> DateTime<Utc> {
        self.taken_at
    }

    /// Number of entities in the snapshot.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Returns true if the snapshot holds no entities.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Iterates over the entities in identity order.
    pub fn iter(&self) -> std::slice::Iter<'_, Arc<CompositeManagedEntity>> {
        self.entities.iter()
    }
}

impl IntoIterator for Snapshot {
    type Item = Arc<CompositeManagedEntity>;
    type IntoIter = std::vec::IntoIter<Arc<CompositeManagedEntity>>;

    fn into_iter(self) -> Self::IntoIter {
        self.entities.into_iter()
    }
}

impl<'a> IntoIterator for &'a Snapshot {
    type Item = &'a Arc<CompositeManagedEntity>;
    type IntoIter = std::slice::Iter<'a, Arc<CompositeManagedEntity>>;

    fn into_iter(self) -> Self::IntoIter {
        self.entities.iter()
    }
}
