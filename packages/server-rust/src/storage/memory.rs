//! In-memory [`Store`] implementation backed by [`DashMap`].
//!
//! Provides concurrent read/write access without external locking. Used by
//! the services when no external database is configured, and by tests.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use rally_core::{Entity, RecordKey};
use tracing::debug;

use super::store::{Scope, Store};
use crate::failure::Failure;

/// In-memory store for one record family.
///
/// Uniqueness is enforced on two levels: the primary key, and the optional
/// secondary key reported by [`Entity::unique_key`]. Records created without
/// a stamped key get one from the store's sequence.
pub struct MemoryStore<E: Entity> {
    entries: DashMap<E::Key, E>,
    unique: DashMap<String, E::Key>,
    sequence: AtomicU64,
}

impl<E: Entity> MemoryStore<E> {
    /// Creates a new, empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
            unique: DashMap::new(),
            sequence: AtomicU64::new(0),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn next_key(&self) -> E::Key {
        E::Key::generate(self.sequence.fetch_add(1, Ordering::Relaxed) + 1)
    }

    fn claim_unique(&self, record: &E) -> Result<Option<String>, Failure> {
        let Some(unique) = record.unique_key() else {
            return Ok(None);
        };
        match self.unique.entry(unique.clone()) {
            Entry::Occupied(_) => Err(Failure::duplicate::<E>(E::UNIQUE_FIELD, unique)),
            Entry::Vacant(slot) => {
                slot.insert(record.key().clone());
                Ok(Some(unique))
            }
        }
    }
}

impl<E: Entity> Default for MemoryStore<E> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<E: Entity> Store<E> for MemoryStore<E> {
    async fn create(&self, draft: E::Draft) -> Result<E, Failure> {
        let key = E::draft_key(&draft).unwrap_or_else(|| self.next_key());
        let record = E::materialize(key.clone(), draft);

        let claimed = self.claim_unique(&record)?;
        match self.entries.entry(key) {
            Entry::Occupied(existing) => {
                if let Some(unique) = claimed {
                    self.unique.remove(&unique);
                }
                Err(Failure::duplicate::<E>(E::KEY_FIELD, existing.key().to_string()))
            }
            Entry::Vacant(slot) => {
                debug!(entity = E::KIND, key = %record.key(), "record created");
                slot.insert(record.clone());
                Ok(record)
            }
        }
    }

    async fn read(&self, key: &E::Key) -> Result<E, Failure> {
        self.entries
            .get(key)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| Failure::not_found::<E>(key))
    }

    async fn update(&self, key: &E::Key, patch: E::Patch, scope: &Scope) -> Result<E, Failure> {
        let mut entry = self
            .entries
            .get_mut(key)
            .ok_or_else(|| Failure::not_found::<E>(key))?;
        if !scope.permits(entry.owner().as_deref()) {
            return Err(Failure::forbidden::<E>(key));
        }
        let mut updated = entry.value().clone();
        updated.apply(patch).map_err(Failure::Invalid)?;
        *entry = updated.clone();
        Ok(updated)
    }

    async fn delete(&self, key: &E::Key, scope: &Scope) -> Result<(), Failure> {
        let removed = self
            .entries
            .remove_if(key, |_, record| scope.permits(record.owner().as_deref()));
        match removed {
            Some((_, record)) => {
                if let Some(unique) = record.unique_key() {
                    self.unique.remove(&unique);
                }
                Ok(())
            }
            None if self.entries.contains_key(key) => Err(Failure::forbidden::<E>(key)),
            None => Err(Failure::not_found::<E>(key)),
        }
    }

    async fn list(&self, filter: &E::Filter) -> Result<Vec<E>, Failure> {
        let mut records: Vec<E> = self
            .entries
            .iter()
            .filter(|entry| entry.value().matches(filter))
            .map(|entry| entry.value().clone())
            .collect();
        records.sort_by(|a, b| a.key().cmp(b.key()));
        Ok(records)
    }
}
