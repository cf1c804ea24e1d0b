//! Keyed entity storage used by the world
//!
//! A pool owns intersections, roads or cars by id. Hydrating from a snapshot
//! always goes through a factory so the pool never aliases the snapshot data.

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;

use crate::error::SimError;

/// An entity that can live in a [`Pool`]
pub trait PoolEntity {
    type Id: Copy + Eq + Ord + Hash + fmt::Display;

    /// The id is stable for the entity's whole lifetime
    fn id(&self) -> Self::Id;
}

/// Mapping from id to entity with unique, stable ids
#[derive(Debug)]
pub struct Pool<T: PoolEntity> {
    items: HashMap<T::Id, T>,
}

impl<T: PoolEntity> Default for Pool<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: PoolEntity> Pool<T> {
    pub fn new() -> Self {
        Self {
            items: HashMap::new(),
        }
    }

    /// Build a pool from a prior snapshot, constructing every entity through `factory`
    ///
    /// Fails on the first factory error or duplicate id.
    pub fn hydrate<S, I, F>(snapshot: I, mut factory: F) -> anyhow::Result<Self>
    where
        I: IntoIterator<Item = S>,
        F: FnMut(S) -> anyhow::Result<T>,
    {
        let mut pool = Self::new();
        for item in snapshot {
            pool.put(factory(item)?)?;
        }
        Ok(pool)
    }

    pub fn get(&self, id: &T::Id) -> Option<&T> {
        self.items.get(id)
    }

    pub fn get_mut(&mut self, id: &T::Id) -> Option<&mut T> {
        self.items.get_mut(id)
    }

    pub fn contains(&self, id: &T::Id) -> bool {
        self.items.contains_key(id)
    }

    /// Insert a new entity. A duplicate id is a caller bug and is rejected
    pub fn put(&mut self, entity: T) -> Result<(), SimError> {
        let id = entity.id();
        if self.items.contains_key(&id) {
            return Err(SimError::DuplicateId(id.to_string()));
        }
        self.items.insert(id, entity);
        Ok(())
    }

    /// Remove an entity without a release hook
    pub fn pop(&mut self, id: &T::Id) -> Option<T> {
        self.items.remove(id)
    }

    /// Remove an entity, running `release` on it exactly once before handing it back
    ///
    /// The entity is gone from the pool even when `release` fails.
    pub fn pop_with<E>(
        &mut self,
        id: &T::Id,
        release: impl FnOnce(&mut T) -> Result<(), E>,
    ) -> Result<Option<T>, E> {
        match self.items.remove(id) {
            Some(mut entity) => {
                release(&mut entity)?;
                Ok(Some(entity))
            }
            None => Ok(None),
        }
    }

    pub fn all(&self) -> &HashMap<T::Id, T> {
        &self.items
    }

    /// Ids in ascending order, so callers never depend on hash iteration order
    pub fn ids(&self) -> Vec<T::Id> {
        let mut ids: Vec<T::Id> = self.items.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Entities in ascending id order
    pub fn iter_sorted(&self) -> impl Iterator<Item = &T> {
        self.ids().into_iter().filter_map(move |id| self.items.get(&id))
    }

    pub fn values(&self) -> impl Iterator<Item = &T> {
        self.items.values()
    }

    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut T> {
        self.items.values_mut()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
