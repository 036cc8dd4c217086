//! Adapter that lets a foreign entity act as a managed entity.
//!
//! The adapter owns its own reader-writer lock, independent of any datasource
//! lock: reading a wrapped entity never waits on datasource state and vice
//! versa. Its view of its own attachment may briefly lag the owning
//! datasource's bookkeeping.

use std::sync::{Arc, RwLock, TryLockError};
use std::thread;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::datasource::CompositeDataSource;
use crate::entity::managed::AttachmentSlot;
use crate::entity::{Entity, ManagedEntity};
use crate::error::DataResult;
use crate::identity::Identity;
use crate::property::Property;
use crate::value::{Predicate, Value};

/// Truncated exponential back-off used by [`ManagedEntityAdapter::safe_properties`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackoffConfig {
    /// Wait before the first retry, in microseconds.
    pub initial_micros: u64,
    /// Upper bound of a single wait, in microseconds.
    pub max_micros: u64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial_micros: 1,
            max_micros: 1_000_000,
        }
    }
}

impl BackoffConfig {
    fn first_wait(&self) -> u64 {
        self.initial_micros.max(1).min(self.cap())
    }

    fn cap(&self) -> u64 {
        self.max_micros.max(1)
    }

    fn next_wait(&self, current: u64) -> u64 {
        current.saturating_mul(2).min(self.cap())
    }
}

/// Wraps any [`Entity`] so a datasource can own it as a [`ManagedEntity`].
///
/// Mutations take the adapter's write lock around a direct call into the
/// delegate; reads take the read lock.
#[derive(Debug)]
pub struct ManagedEntityAdapter {
    delegate: Arc<dyn Entity>,
    lock: RwLock<()>,
    attachment: AttachmentSlot,
    backoff: BackoffConfig,
}

impl ManagedEntityAdapter {
    /// Wraps `delegate` with the default back-off.
    pub fn new(delegate: Arc<dyn Entity>) -> Self {
        Self::with_backoff(delegate, BackoffConfig::default())
    }

    /// Wraps `delegate` with a custom back-off.
    pub fn with_backoff(delegate: Arc<dyn Entity>, backoff: BackoffConfig) -> Self {
        Self {
            delegate,
            lock: RwLock::new(()),
            attachment: AttachmentSlot::default(),
            backoff,
        }
    }

    /// Returns the wrapped entity.
    #[must_use]
    pub fn delegate(&self) -> &Arc<dyn Entity> {
        &self.delegate
    }

    /// Reads a snapshot of the delegate's properties without blocking on the lock.
    ///
    /// Each failed attempt sleeps, starting at `initial_micros` and doubling up
    /// to `max_micros`. There is no overall deadline: under sustained write
    /// contention this keeps retrying at the capped interval.
    pub fn safe_properties(&self) -> Vec<Property> {
        let mut wait = self.backoff.first_wait();
        let mut warned = false;
        loop {
            match self.lock.try_read() {
                Ok(_guard) => return self.delegate.properties(),
                Err(TryLockError::Poisoned(poisoned)) => {
                    let _guard = poisoned.into_inner();
                    return self.delegate.properties();
                }
                Err(TryLockError::WouldBlock) => {
                    thread::sleep(Duration::from_micros(wait));
                    wait = self.backoff.next_wait(wait);
                    if wait == self.backoff.cap() && !warned {
                        warned = true;
                        tracing::warn!(
                            identity = %self.delegate.identity(),
                            wait_micros = wait,
                            "adapter read back-off reached its cap"
                        );
                    }
                }
            }
        }
    }

    fn read<T>(&self, f: impl FnOnce(&dyn Entity) -> T) -> T {
        let _guard = self.lock.read().unwrap_or_else(std::sync::PoisonError::into_inner);
        f(self.delegate.as_ref())
    }

    fn write<T>(&self, f: impl FnOnce(&dyn Entity) -> T) -> T {
        let _guard = self.lock.write().unwrap_or_else(std::sync::PoisonError::into_inner);
        f(self.delegate.as_ref())
    }
}

impl Entity for ManagedEntityAdapter {
    fn identity(&self) -> &Identity {
        self.delegate.identity()
    }

    fn properties(&self) -> Vec<Property> {
        self.safe_properties()
    }

    fn get_property(&self, predicate: &Predicate) -> Property {
        self.read(|delegate| delegate.get_property(predicate))
    }

    fn add_property(&self, predicate: Predicate, value: Value) -> DataResult<()> {
        self.write(|delegate| delegate.add_property(predicate, value))
    }

    fn remove_property(&self, predicate: &Predicate, value: &Value) -> DataResult<()> {
        self.write(|delegate| delegate.remove_property(predicate, value))
    }

    fn remove_predicate(&self, predicate: &Predicate) -> DataResult<()> {
        self.write(|delegate| delegate.remove_predicate(predicate))
    }
}

impl ManagedEntity for ManagedEntityAdapter {
    fn id(&self) -> Option<Uuid> {
        self.attachment.get().map(|a| a.id())
    }

    fn data_source(&self) -> Option<Arc<CompositeDataSource>> {
        self.attachment.get().and_then(|a| a.data_source())
    }

    fn attach(&self, id: Uuid, data_source: &Arc<CompositeDataSource>) -> DataResult<()> {
        self.attachment.attach(self.identity(), id, data_source)
    }

    fn detach(&self, data_source: &CompositeDataSource) -> DataResult<()> {
        self.attachment.detach(self.identity(), data_source)
    }

    fn wrapped(&self) -> Option<&Arc<dyn Entity>> {
        Some(&self.delegate)
    }

    /// Asks the delegate to drop every entity value referencing `identity`.
    ///
    /// Removal failures reported by the delegate are not counted.
    fn remove_references(&self, identity: &Identity) -> usize {
        self.write(|delegate| {
            let mut removed = 0;
            for property in delegate.properties() {
                let targets: Vec<&Value> = property
                    .values()
                    .iter()
                    .filter(|v| v.references(identity))
                    .collect();
                for value in targets {
                    if delegate.remove_property(property.predicate(), value).is_ok() {
                        removed += 1;
                    }
                }
            }
            removed
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::BasicEntity;

    fn p(uri: &str) -> Predicate {
        Predicate::new(uri).unwrap()
    }

    #[test]
    fn test_adapter_delegates_reads_and_writes() {
        let inner = Arc::new(BasicEntity::new(Identity::local(1)));
        let adapter = ManagedEntityAdapter::new(inner.clone());
        adapter.add_property(p("urn:p:a"), Value::from("x")).unwrap();
        assert!(inner.get_property(&p("urn:p:a")).contains_literal("x"));
        assert_eq!(adapter.identity(), inner.identity());
        assert_eq!(adapter.safe_properties().len(), 1);
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let cfg = BackoffConfig {
            initial_micros: 1,
            max_micros: 8,
        };
        let mut wait = cfg.first_wait();
        let mut seen = vec![wait];
        for _ in 0..5 {
            wait = cfg.next_wait(wait);
            seen.push(wait);
        }
        assert_eq!(seen, [1, 2, 4, 8, 8, 8]);
    }

    #[test]
    fn test_backoff_defaults() {
        let cfg = BackoffConfig::default();
        assert_eq!(cfg.initial_micros, 1);
        assert_eq!(cfg.max_micros, 1_000_000);
    }

    #[test]
    fn test_safe_properties_waits_for_writer() {
        let inner = Arc::new(BasicEntity::new(Identity::local(1)));
        let adapter = Arc::new(ManagedEntityAdapter::new(inner));
        adapter.add_property(p("urn:p:a"), Value::from("x")).unwrap();

        let guard = adapter.lock.write().unwrap();
        let reader = {
            let adapter = Arc::clone(&adapter);
            thread::spawn(move || adapter.safe_properties().len())
        };
        thread::sleep(Duration::from_millis(20));
        drop(guard);
        assert_eq!(reader.join().unwrap(), 1);
    }

    #[test]
    fn test_remove_references_scrubs_delegate() {
        let target = Arc::new(BasicEntity::new(Identity::local(2)));
        let inner = Arc::new(
            BasicEntity::new(Identity::local(1))
                .with(p("urn:p:knows"), target)
                .with(p("urn:p:name"), "a"),
        );
        let adapter = ManagedEntityAdapter::new(inner.clone());
        assert_eq!(adapter.remove_references(&Identity::local(2)), 1);
        assert!(inner.get_property(&p("urn:p:knows")).is_empty());
        assert!(inner.get_property(&p("urn:p:name")).contains_literal("a"));
    }
}
