//! In-memory composite datasource.
//!
//! Every public method holds exactly one of the read or write lock for its
//! whole duration. Multi-step mutations (`new_entity`, `merge`, `remove`) run
//! as one write critical section; the helpers they call take the already locked
//! state and never lock again.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};

use serde::Serialize;
use uuid::Uuid;

use crate::composite::entity::same_object;
use crate::composite::CompositeManagedEntity;
use crate::entity::Entity;
use crate::error::{DataError, DataResult};
use crate::identity::Identity;
use crate::value::{EntityRef, Value};

use super::config::{DataSourceConfig, MergeStrategy};
use super::snapshot::Snapshot;

fn lock_err(context: &'static str) -> DataError {
    DataError::PoisonedLock { context }
}

#[derive(Debug, Default)]
struct DataSourceState {
    entities: HashMap<Identity, Arc<CompositeManagedEntity>>,
    entity_identifiers: HashMap<Uuid, Identity>,
    /// External parts joined to members by reference merges, owned here.
    joined: HashMap<Identity, Vec<Arc<CompositeManagedEntity>>>,
}

impl DataSourceState {
    fn contains(&self, entity: &CompositeManagedEntity) -> bool {
        self.entities
            .get(entity.identity())
            .is_some_and(|member| std::ptr::eq(member.as_ref(), entity))
    }

    fn fresh_id(&self) -> Uuid {
        loop {
            let id = Uuid::new_v4();
            if !self.entity_identifiers.contains_key(&id) {
                return id;
            }
        }
    }

    fn keep_joined(&mut self, identity: &Identity, part: Arc<CompositeManagedEntity>) {
        let parts = self.joined.entry(identity.clone()).or_default();
        if !parts.iter().any(|p| Arc::ptr_eq(p, &part)) {
            parts.push(part);
        }
    }
}

/// Counts describing a datasource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DataSourceStats {
    /// Registered entities.
    pub entities: usize,
    /// Entries in the id index.
    pub identifiers: usize,
    /// External parts joined to members.
    pub joined_parts: usize,
}

/// Thread-safe in-memory store of composite entities.
///
/// # Examples
///
/// ```
/// use entigraph::{CompositeDataSource, DataSourceConfig, Entity, Identity, Predicate, Value};
///
/// let ds = CompositeDataSource::new(DataSourceConfig::default());
/// let id = Identity::managed("Person", "1").unwrap();
/// let person = ds.new_entity(id.clone()).unwrap();
/// assert!(ds.new_entity(id.clone()).is_err());
///
/// let name = Predicate::new("http://xmlns.com/foaf/0.1/name").unwrap();
/// person.add_property(name.clone(), Value::from("Ada")).unwrap();
/// assert!(person.get_property(&name).contains_literal("Ada"));
/// ```
#[derive(Debug)]
pub struct CompositeDataSource {
    id: Uuid,
    this: Weak<CompositeDataSource>,
    config: DataSourceConfig,
    state: RwLock<DataSourceState>,
}

impl CompositeDataSource {
    /// Creates an empty datasource.
    #[must_use]
    pub fn new(config: DataSourceConfig) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            id: Uuid::new_v4(),
            this: this.clone(),
            config,
            state: RwLock::new(DataSourceState::default()),
        })
    }

    /// Creates an empty datasource with the default configuration and `merge_strategy`.
    #[must_use]
    pub fn with_merge_strategy(merge_strategy: MergeStrategy) -> Arc<Self> {
        Self::new(DataSourceConfig::default().with_merge_strategy(merge_strategy))
    }

    /// Returns the datasource id, stable for its lifetime.
    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.id
    }

    /// Returns the configuration fixed at construction.
    #[must_use]
    pub const fn config(&self) -> &DataSourceConfig {
        &self.config
    }

    /// Returns the merge strategy fixed at construction.
    #[must_use]
    pub const fn merge_strategy(&self) -> MergeStrategy {
        self.config.merge_strategy
    }

    fn read(&self, context: &'static str) -> DataResult<RwLockReadGuard<'_, DataSourceState>> {
        self.state.read().map_err(|_| lock_err(context))
    }

    fn write(&self, context: &'static str) -> DataResult<RwLockWriteGuard<'_, DataSourceState>> {
        self.state.write().map_err(|_| lock_err(context))
    }

    fn arc(&self) -> DataResult<Arc<Self>> {
        self.this
            .upgrade()
            .ok_or_else(|| DataError::illegal_state("datasource is being dropped"))
    }

    /// Creates and registers an empty entity for `identity`.
    ///
    /// Fails with `AlreadyManaged` if the identity is present; the store is
    /// unchanged on failure.
    pub fn new_entity(&self, identity: Identity) -> DataResult<Arc<CompositeManagedEntity>> {
        let mut state = self.write("datasource.new_entity")?;
        if state.entities.contains_key(&identity) {
            return Err(DataError::AlreadyManaged { identity });
        }
        self.create(&mut state, identity)
    }

    /// Looks up an entity by store-local id.
    pub fn find_by_id(&self, id: Uuid) -> DataResult<Option<Arc<CompositeManagedEntity>>> {
        let state = self.read("datasource.find_by_id")?;
        Ok(state
            .entity_identifiers
            .get(&id)
            .and_then(|identity| state.entities.get(identity))
            .cloned())
    }

    /// Looks up an entity by identity.
    pub fn find_by_identity(
        &self,
        identity: &Identity,
    ) -> DataResult<Option<Arc<CompositeManagedEntity>>> {
        let state = self.read("datasource.find_by_identity")?;
        Ok(state.entities.get(identity).cloned())
    }

    /// Returns true if `entity` itself is the member registered for its identity.
    ///
    /// Another object with the same identity is not a member.
    pub fn contains(&self, entity: &CompositeManagedEntity) -> DataResult<bool> {
        Ok(self.read("datasource.contains")?.contains(entity))
    }

    /// Reconciles `entity` with the store according to the merge strategy.
    ///
    /// Returns the member that now stands for `entity`'s identity. A member of
    /// this datasource is returned unchanged under every strategy.
    pub fn merge(&self, entity: Arc<dyn Entity>) -> DataResult<Arc<CompositeManagedEntity>> {
        let mut state = self.write("datasource.merge")?;
        if let Some(composite) = entity.as_composite() {
            if state.contains(&composite) {
                return Ok(composite);
            }
        }
        tracing::debug!(
            identity = %entity.identity(),
            strategy = %self.config.merge_strategy,
            "merging entity"
        );
        match self.config.merge_strategy {
            MergeStrategy::ByIdentity => self.merge_by_identity(&mut state, entity.identity()),
            MergeStrategy::ByReference => self.merge_by_reference(&mut state, entity),
            MergeStrategy::ByValue => self.merge_by_value(&mut state, entity),
        }
    }

    /// Removes `entity` if it is a member; otherwise does nothing.
    ///
    /// The entity is detached, both index entries are dropped, parts joined to
    /// it are released, and every entity value referencing it is removed from
    /// the remaining members and from the external parts joined to them.
    pub fn remove(&self, entity: &CompositeManagedEntity) -> DataResult<()> {
        let mut state = self.write("datasource.remove")?;
        if !state.contains(entity) {
            tracing::debug!(identity = %entity.identity(), "remove skipped, not a member");
            return Ok(());
        }
        let identity = entity.identity().clone();
        let id = entity
            .id()
            .ok_or_else(|| DataError::illegal_state(format!("member {identity} has no id")))?;
        entity.part().detach(self)?;

        state.entity_identifiers.remove(&id);
        let removed = state.entities.remove(&identity);
        for part in state.joined.remove(&identity).unwrap_or_default() {
            entity.leave(&part)?;
        }

        let mut scrubbed = 0;
        for member in state.entities.values() {
            let count = member.part().remove_references(&identity);
            if count > 0 {
                member.changed();
                scrubbed += count;
            }
        }
        // parts attached to another datasource belong to that store
        let held_here = state
            .joined
            .values()
            .flatten()
            .filter(|part| !part.part().is_attached());
        for part in held_here {
            let count = part.part().remove_references(&identity);
            if count > 0 {
                part.changed();
                scrubbed += count;
            }
        }
        tracing::debug!(%identity, scrubbed, "entity removed");
        drop(state);
        drop(removed);
        Ok(())
    }

    /// Returns a point-in-time snapshot of the members, ordered by identity.
    pub fn iter(&self) -> DataResult<Snapshot> {
        let state = self.read("datasource.iter")?;
        let mut entities: Vec<_> = state.entities.values().cloned().collect();
        drop(state);
        entities.sort_by(|a, b| a.identity().cmp(b.identity()));
        Ok(Snapshot::new(entities))
    }

    /// Returns the number of members.
    pub fn len(&self) -> DataResult<usize> {
        Ok(self.read("datasource.len")?.entities.len())
    }

    /// Returns true if the datasource has no members.
    pub fn is_empty(&self) -> DataResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Returns index counts.
    pub fn stats(&self) -> DataResult<DataSourceStats> {
        let state = self.read("datasource.stats")?;
        Ok(DataSourceStats {
            entities: state.entities.len(),
            identifiers: state.entity_identifiers.len(),
            joined_parts: state.joined.values().map(Vec::len).sum(),
        })
    }

    /// Checks that both indexes are exact inverses and every member is attached here.
    pub fn verify(&self) -> DataResult<()> {
        let state = self.read("datasource.verify")?;
        if state.entities.len() != state.entity_identifiers.len() {
            return Err(DataError::illegal_state(format!(
                "index sizes differ: entities={} identifiers={}",
                state.entities.len(),
                state.entity_identifiers.len()
            )));
        }
        for (id, identity) in &state.entity_identifiers {
            let member = state.entities.get(identity).ok_or_else(|| {
                DataError::illegal_state(format!("id {id} maps to unknown identity {identity}"))
            })?;
            if member.id() != Some(*id) {
                return Err(DataError::illegal_state(format!(
                    "member {identity} carries id {:?}, index says {id}",
                    member.id()
                )));
            }
            let owned_here = member
                .data_source()
                .is_some_and(|ds| std::ptr::eq(ds.as_ref(), self));
            if !owned_here {
                return Err(DataError::illegal_state(format!(
                    "member {identity} is not attached to this datasource"
                )));
            }
        }
        Ok(())
    }

    // ---- helpers: callers hold the write lock ----

    fn create(
        &self,
        state: &mut DataSourceState,
        identity: Identity,
    ) -> DataResult<Arc<CompositeManagedEntity>> {
        let composite = CompositeManagedEntity::native(identity, self.config.deletion_strategy);
        self.register(state, Arc::clone(&composite))?;
        Ok(composite)
    }

    fn register(
        &self,
        state: &mut DataSourceState,
        composite: Arc<CompositeManagedEntity>,
    ) -> DataResult<()> {
        let this = self.arc()?;
        let id = state.fresh_id();
        composite.part().attach(id, &this)?;
        let identity = composite.identity().clone();
        tracing::debug!(%identity, %id, "entity registered");
        state.entity_identifiers.insert(id, identity.clone());
        state.entities.insert(identity, composite);
        Ok(())
    }

    fn surrogate(
        &self,
        state: &mut DataSourceState,
        identity: &Identity,
    ) -> DataResult<Arc<CompositeManagedEntity>> {
        match state.entities.get(identity) {
            Some(existing) => Ok(Arc::clone(existing)),
            None => self.create(state, identity.clone()),
        }
    }

    fn merge_by_identity(
        &self,
        state: &mut DataSourceState,
        identity: &Identity,
    ) -> DataResult<Arc<CompositeManagedEntity>> {
        self.surrogate(state, identity)
    }

    fn merge_by_reference(
        &self,
        state: &mut DataSourceState,
        entity: Arc<dyn Entity>,
    ) -> DataResult<Arc<CompositeManagedEntity>> {
        let identity = entity.identity().clone();

        if let Some(existing) = state.entities.get(&identity).cloned() {
            let known = existing.represents(entity.as_ref())
                || state
                    .joined
                    .get(&identity)
                    .is_some_and(|parts| parts.iter().any(|p| p.represents(entity.as_ref())));
            if !known {
                let foreign = self.wrap(entity);
                existing.join(&foreign)?;
                state.keep_joined(&identity, foreign);
            }
            return Ok(existing);
        }

        let foreign = self.wrap(entity);
        if foreign.part().is_attached() {
            // owned by another datasource: a local surrogate joins it instead
            let local = CompositeManagedEntity::native(identity.clone(), self.config.deletion_strategy);
            local.join(&foreign)?;
            self.register(state, Arc::clone(&local))?;
            state.keep_joined(&identity, foreign);
            Ok(local)
        } else {
            self.register(state, Arc::clone(&foreign))?;
            Ok(foreign)
        }
    }

    /// Breadth-first deep copy of the graph reachable from `root`.
    fn merge_by_value(
        &self,
        state: &mut DataSourceState,
        root: Arc<dyn Entity>,
    ) -> DataResult<Arc<CompositeManagedEntity>> {
        let result = self.surrogate(state, root.identity())?;
        let mut collected: HashSet<Identity> = HashSet::new();
        collected.insert(root.identity().clone());
        let mut pending: VecDeque<Arc<dyn Entity>> = VecDeque::new();
        pending.push_back(root);

        while let Some(node) = pending.pop_front() {
            let surrogate = self.surrogate(state, node.identity())?;
            if same_object(surrogate.as_ref(), node.as_ref()) {
                continue;
            }
            for property in node.properties() {
                for value in property.values() {
                    let local = match value {
                        Value::Literal(_) => value.clone(),
                        Value::Entity(reference) => {
                            let Some(target) = reference.resolve() else {
                                tracing::trace!(
                                    target_identity = %reference.identity(),
                                    "skipping dangling reference"
                                );
                                continue;
                            };
                            let target_surrogate = self.surrogate(state, target.identity())?;
                            if collected.insert(target.identity().clone()) {
                                pending.push_back(target);
                            }
                            let link: Arc<dyn Entity> = target_surrogate;
                            Value::Entity(EntityRef::linked(&link))
                        }
                    };
                    surrogate
                        .part()
                        .add_property(property.predicate().clone(), local)?;
                }
            }
            surrogate.changed();
        }
        Ok(result)
    }

    fn wrap(&self, entity: Arc<dyn Entity>) -> Arc<CompositeManagedEntity> {
        CompositeManagedEntity::from_entity(
            entity,
            self.config.deletion_strategy,
            self.config.backoff,
        )
    }
}
