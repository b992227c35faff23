use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::models::entity::{Entity, EntityId};

/// Locks a std mutex, recovering the data if a previous holder panicked.
/// None of the guarded sections leave the data half-written.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// The in-memory rows of one list view, in server order.
///
/// `revision` moves forward on every change and is the memo key for derived
/// views: equal revisions mean identical contents.
#[derive(Debug, Default)]
pub struct Collection {
    entities: Vec<Entity>,
    revision: u64,
}

impl Collection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fails with the first repeated id.
    pub fn check_unique(entities: &[Entity]) -> Result<(), EntityId> {
        let mut seen = HashSet::with_capacity(entities.len());
        for entity in entities {
            if !seen.insert(&entity.id) {
                return Err(entity.id.clone());
            }
        }
        Ok(())
    }

    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn position(&self, id: &EntityId) -> Option<usize> {
        self.entities.iter().position(|e| &e.id == id)
    }

    pub fn get(&self, id: &EntityId) -> Option<&Entity> {
        self.entities.iter().find(|e| &e.id == id)
    }

    /// Wholesale replacement after a load.
    pub fn replace_all(&mut self, entities: Vec<Entity>) {
        self.entities = entities;
        self.bump();
    }

    /// Swaps the entity with the same id in place; returns the previous value.
    pub fn replace(&mut self, entity: Entity) -> Option<Entity> {
        let index = self.position(&entity.id)?;
        let previous = std::mem::replace(&mut self.entities[index], entity);
        self.bump();
        Some(previous)
    }

    /// Removes by id; returns where the entity was and its value.
    pub fn remove(&mut self, id: &EntityId) -> Option<(usize, Entity)> {
        let index = self.position(id)?;
        let entity = self.entities.remove(index);
        self.bump();
        Some((index, entity))
    }

    /// Inserts at `index`, clamped to the current length.
    pub fn insert_at(&mut self, index: usize, entity: Entity) {
        let index = index.min(self.entities.len());
        self.entities.insert(index, entity);
        self.bump();
    }

    /// Replaces an entity with the same id, or appends it.
    pub fn upsert(&mut self, entity: Entity) {
        match self.position(&entity.id) {
            Some(index) => self.entities[index] = entity,
            None => self.entities.push(entity),
        }
        self.bump();
    }

    fn bump(&mut self) {
        self.revision += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entity(id: &str) -> Entity {
        Entity::from_value(json!({ "id": id })).unwrap()
    }

    #[test]
    fn test_check_unique_reports_duplicate() {
        let entities = vec![entity("1"), entity("2"), entity("1")];
        assert_eq!(Collection::check_unique(&entities), Err(EntityId::from("1")));
        assert!(Collection::check_unique(&entities[..2]).is_ok());
    }

    #[test]
    fn test_every_change_bumps_revision() {
        let mut collection = Collection::new();
        collection.replace_all(vec![entity("1"), entity("2")]);
        let r1 = collection.revision();
        collection.upsert(entity("3"));
        assert!(collection.revision() > r1);
        let r2 = collection.revision();
        collection.remove(&EntityId::from("1"));
        assert!(collection.revision() > r2);
    }

    #[test]
    fn test_remove_then_insert_restores_position() {
        let mut collection = Collection::new();
        collection.replace_all(vec![entity("1"), entity("2"), entity("3")]);
        let (index, removed) = collection.remove(&EntityId::from("2")).unwrap();
        assert_eq!(index, 1);
        collection.insert_at(index, removed);
        let ids: Vec<_> = collection.entities().iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, ["1", "2", "3"]);
    }

    #[test]
    fn test_insert_at_clamps_index() {
        let mut collection = Collection::new();
        collection.insert_at(10, entity("1"));
        assert_eq!(collection.len(), 1);
    }

    #[test]
    fn test_missing_id_is_a_no_op() {
        let mut collection = Collection::new();
        collection.replace_all(vec![entity("1")]);
        let revision = collection.revision();
        assert!(collection.replace(entity("9")).is_none());
        assert!(collection.remove(&EntityId::from("9")).is_none());
        assert_eq!(collection.revision(), revision);
    }
}
