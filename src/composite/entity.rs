//! The caller-facing composite entity.
//!
//! Joining another composite links it as an external part and subscribes this
//! composite to its changes. Changes propagate along listener links breadth
//! first, so chains and cycles of joins invalidate every dependent cache
//! exactly once.

use std::collections::{HashSet, VecDeque};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use uuid::Uuid;

use crate::datasource::{CompositeDataSource, DeletionStrategy};
use crate::entity::{BackoffConfig, Entity, ManagedEntity, ManagedEntityAdapter, NativeEntity};
use crate::error::{DataError, DataResult};
use crate::identity::Identity;
use crate::property::Property;
use crate::value::{EntityRef, Predicate, Value};

use super::aggregation::EntityAggregation;

/// Compares two objects by address, ignoring vtables.
pub(crate) fn same_object<A: ?Sized, B: ?Sized>(a: &A, b: &B) -> bool {
    std::ptr::eq((a as *const A).cast::<()>(), (b as *const B).cast::<()>())
}

#[derive(Default)]
struct CompositeState {
    externals: Vec<Weak<CompositeManagedEntity>>,
    aggregation: Option<Arc<EntityAggregation>>,
    generation: u64,
}

impl CompositeState {
    fn invalidate(&mut self) {
        self.aggregation = None;
        self.generation = self.generation.wrapping_add(1);
    }

    fn position(&self, other: &CompositeManagedEntity) -> Option<usize> {
        self.externals
            .iter()
            .position(|w| std::ptr::eq(w.as_ptr(), other))
    }
}

/// Caller-facing entity combining one own part with joined external parts.
///
/// - Reads see the aggregation of the own part and every part reachable
///   through joins.
/// - Literal writes go to the own part only.
/// - Entity-valued writes first merge the value into the owning datasource, so
///   stored references always point at local surrogates.
/// - Removals follow the [`DeletionStrategy`]: `Deep` touches the own part
///   alone, `Shallow` every constituent part.
///
/// Externals and listeners are weak links; the datasource that joined them
/// owns the parts.
pub struct CompositeManagedEntity {
    this: Weak<CompositeManagedEntity>,
    part: Arc<dyn ManagedEntity>,
    deletion: DeletionStrategy,
    state: Mutex<CompositeState>,
    listeners: Mutex<Vec<Weak<CompositeManagedEntity>>>,
}

impl CompositeManagedEntity {
    /// Creates a composite whose own part is `part`.
    pub fn new(part: Arc<dyn ManagedEntity>, deletion: DeletionStrategy) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            this: this.clone(),
            part,
            deletion,
            state: Mutex::new(CompositeState::default()),
            listeners: Mutex::new(Vec::new()),
        })
    }

    /// Creates a detached composite over a fresh [`NativeEntity`].
    pub fn native(identity: Identity, deletion: DeletionStrategy) -> Arc<Self> {
        Self::new(Arc::new(NativeEntity::new(identity)), deletion)
    }

    /// Returns `entity` as a composite, wrapping foreign entities in a
    /// [`ManagedEntityAdapter`].
    pub fn from_entity(
        entity: Arc<dyn Entity>,
        deletion: DeletionStrategy,
        backoff: BackoffConfig,
    ) -> Arc<Self> {
        match entity.as_composite() {
            Some(composite) => composite,
            None => Self::new(
                Arc::new(ManagedEntityAdapter::with_backoff(entity, backoff)),
                deletion,
            ),
        }
    }

    /// Returns the own part.
    #[must_use]
    pub fn part(&self) -> &Arc<dyn ManagedEntity> {
        &self.part
    }

    /// Returns the store-local id of the own part, or `None` while detached.
    #[must_use]
    pub fn id(&self) -> Option<Uuid> {
        self.part.id()
    }

    /// Returns the datasource owning the own part.
    #[must_use]
    pub fn data_source(&self) -> Option<Arc<CompositeDataSource>> {
        self.part.data_source()
    }

    /// Returns the strategy removals are dispatched with.
    #[must_use]
    pub const fn deletion_strategy(&self) -> DeletionStrategy {
        self.deletion
    }

    /// Returns true if this composite stands for `entity`: it is `entity`, its
    /// own part is `entity`, or its own part adapts `entity`.
    #[must_use]
    pub fn represents(&self, entity: &dyn Entity) -> bool {
        same_object(self, entity)
            || same_object(self.part.as_ref(), entity)
            || self
                .part
                .wrapped()
                .is_some_and(|wrapped| same_object(wrapped.as_ref(), entity))
    }

    fn state(&self) -> MutexGuard<'_, CompositeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn listeners(&self) -> MutexGuard<'_, Vec<Weak<CompositeManagedEntity>>> {
        self.listeners.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Links `other` as an external part of this composite.
    ///
    /// `other` must be a different composite with the same identity. Joining an
    /// already joined composite is a no-op. After joining, any change to
    /// `other`, including changes reaching it through its own joins,
    /// invalidates this composite's aggregation.
    pub fn join(&self, other: &Arc<CompositeManagedEntity>) -> DataResult<()> {
        self.check_peer(other)?;
        {
            let mut state = self.state();
            if state.position(other).is_some() {
                return Ok(());
            }
            state.externals.retain(|w| w.strong_count() > 0);
            state.externals.push(Arc::downgrade(other));
            state.invalidate();
        }
        other.subscribe(&self.this);
        tracing::debug!(identity = %self.identity(), "joined external part");
        self.changed();
        Ok(())
    }

    /// Unlinks `other`. Leaving a composite that is not joined is a no-op.
    pub fn leave(&self, other: &Arc<CompositeManagedEntity>) -> DataResult<()> {
        self.check_peer(other)?;
        {
            let mut state = self.state();
            let Some(index) = state.position(other) else {
                return Ok(());
            };
            state.externals.remove(index);
            state.invalidate();
        }
        other.unsubscribe(self);
        tracing::debug!(identity = %self.identity(), "left external part");
        self.changed();
        Ok(())
    }

    fn check_peer(&self, other: &CompositeManagedEntity) -> DataResult<()> {
        if std::ptr::eq(self, other) {
            return Err(DataError::SelfJoin {
                identity: self.identity().clone(),
            });
        }
        if self.identity() != other.identity() {
            return Err(DataError::IdentityMismatch {
                expected: self.identity().clone(),
                actual: other.identity().clone(),
            });
        }
        Ok(())
    }

    /// Returns true if `other` is a direct external of this composite.
    #[must_use]
    pub fn is_joined(&self, other: &CompositeManagedEntity) -> bool {
        self.state().position(other).is_some()
    }

    /// Returns the live direct externals in join order.
    #[must_use]
    pub fn externals(&self) -> Vec<Arc<CompositeManagedEntity>> {
        self.state()
            .externals
            .iter()
            .filter_map(Weak::upgrade)
            .collect()
    }

    fn subscribe(&self, listener: &Weak<CompositeManagedEntity>) {
        let mut listeners = self.listeners();
        listeners.retain(|w| w.strong_count() > 0);
        if !listeners.iter().any(|w| w.ptr_eq(listener)) {
            listeners.push(listener.clone());
        }
    }

    fn unsubscribe(&self, listener: &CompositeManagedEntity) {
        self.listeners()
            .retain(|w| w.strong_count() > 0 && !std::ptr::eq(w.as_ptr(), listener));
    }

    fn invalidate(&self) {
        self.state().invalidate();
    }

    /// Invalidates this composite and every composite listening to it,
    /// directly or transitively.
    pub(crate) fn changed(&self) {
        self.invalidate();
        let mut visited: HashSet<*const CompositeManagedEntity> = HashSet::new();
        visited.insert(self);
        let mut queue: VecDeque<Arc<CompositeManagedEntity>> = VecDeque::new();
        queue.extend(self.listeners().iter().filter_map(Weak::upgrade));
        while let Some(listener) = queue.pop_front() {
            if !visited.insert(Arc::as_ptr(&listener)) {
                continue;
            }
            listener.invalidate();
            queue.extend(listener.listeners().iter().filter_map(Weak::upgrade));
        }
        tracing::trace!(
            identity = %self.identity(),
            invalidated = visited.len(),
            "aggregations invalidated"
        );
    }

    /// Composites reachable through externals, breadth first, excluding this one.
    ///
    /// Each composite's lock is held only while its externals are copied, so
    /// traversals from different ends of a join cycle cannot deadlock.
    fn reachable(&self) -> Vec<Arc<CompositeManagedEntity>> {
        let mut visited: HashSet<*const CompositeManagedEntity> = HashSet::new();
        visited.insert(self);
        let mut queue: VecDeque<Arc<CompositeManagedEntity>> = VecDeque::new();
        for external in self.externals() {
            if visited.insert(Arc::as_ptr(&external)) {
                queue.push_back(external);
            }
        }
        let mut found = Vec::new();
        while let Some(next) = queue.pop_front() {
            for external in next.externals() {
                if visited.insert(Arc::as_ptr(&external)) {
                    queue.push_back(external);
                }
            }
            found.push(next);
        }
        found
    }

    /// Returns the aggregation over every part, computing it if invalidated.
    ///
    /// A result computed while a concurrent change invalidated the cache is
    /// returned to the caller but not cached.
    pub fn aggregation(&self) -> Arc<EntityAggregation> {
        let generation = {
            let state = self.state();
            if let Some(aggregation) = &state.aggregation {
                return Arc::clone(aggregation);
            }
            state.generation
        };

        let others = self.reachable();
        let aggregation = Arc::new(EntityAggregation::from_parts(
            self.identity().clone(),
            Arc::clone(&self.part),
            others.iter().map(|c| Arc::clone(&c.part)),
        ));

        let mut state = self.state();
        if state.generation == generation {
            state.aggregation = Some(Arc::clone(&aggregation));
        }
        tracing::trace!(
            identity = %self.identity(),
            parts = aggregation.len(),
            "aggregation computed"
        );
        aggregation
    }

    /// Maps an entity value onto its surrogate in the owning datasource.
    fn localize(&self, value: Value) -> DataResult<Value> {
        let Value::Entity(reference) = value else {
            return Ok(value);
        };
        let Some(data_source) = self.data_source() else {
            return Ok(Value::Entity(reference));
        };
        let target = reference.try_resolve()?;
        let local: Arc<dyn Entity> = data_source.merge(target)?;
        Ok(Value::Entity(EntityRef::linked(&local)))
    }

    /// Applies `op` to the parts selected by the deletion strategy.
    fn remove_with(&self, op: impl Fn(&dyn ManagedEntity) -> DataResult<()>) -> DataResult<()> {
        match self.deletion {
            DeletionStrategy::Deep => {
                op(self.part.as_ref())?;
                self.changed();
            }
            DeletionStrategy::Shallow => {
                let others = self.reachable();
                op(self.part.as_ref())?;
                for other in &others {
                    op(other.part.as_ref())?;
                }
                self.changed();
                for other in &others {
                    other.changed();
                }
            }
        }
        Ok(())
    }
}

impl Entity for CompositeManagedEntity {
    fn identity(&self) -> &Identity {
        self.part.identity()
    }

    fn properties(&self) -> Vec<Property> {
        self.aggregation().properties()
    }

    fn get_property(&self, predicate: &Predicate) -> Property {
        self.aggregation().get_property(predicate)
    }

    fn add_property(&self, predicate: Predicate, value: Value) -> DataResult<()> {
        let value = self.localize(value)?;
        self.part.add_property(predicate, value)?;
        self.changed();
        Ok(())
    }

    fn remove_property(&self, predicate: &Predicate, value: &Value) -> DataResult<()> {
        self.remove_with(|part| part.remove_property(predicate, value))
    }

    fn remove_predicate(&self, predicate: &Predicate) -> DataResult<()> {
        self.remove_with(|part| part.remove_predicate(predicate))
    }

    fn as_composite(&self) -> Option<Arc<CompositeManagedEntity>> {
        self.this.upgrade()
    }
}

impl fmt::Debug for CompositeManagedEntity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompositeManagedEntity")
            .field("identity", self.identity())
            .field("id", &self.id())
            .field("deletion", &self.deletion)
            .field("externals", &self.state().externals.len())
            .finish()
    }
}
