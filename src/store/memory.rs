//! In-memory graph store.

use std::collections::{BTreeMap, HashSet};

use tracing::debug;

use super::{GraphStore, SnapshotVersion, StoreError};
use crate::graph::{Entity, EntityId, EntityKind, Relationship, RelationshipKey};

/// A relationship with the snapshots it was published in.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredRelationship {
    pub relationship: Relationship,
    /// Ascending; empty unless history is kept.
    pub snapshots: Vec<SnapshotVersion>,
}

/// Graph store held in memory, keyed like a graph database would be.
///
/// API entities merge field by field with the first non-null value winning;
/// other entities are replaced by their latest version. Relationships whose
/// endpoints are unknown are rejected, and the whole batch with them.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entities: BTreeMap<EntityId, Entity>,
    relationships: BTreeMap<RelationshipKey, StoredRelationship>,
    keep_history: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the snapshot versions each relationship was published in.
    pub fn with_history() -> Self {
        Self {
            keep_history: true,
            ..Self::default()
        }
    }

    pub fn entity(&self, id: &str) -> Option<&Entity> {
        self.entities.get(id)
    }

    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values()
    }

    pub fn relationships(&self) -> impl Iterator<Item = &Relationship> {
        self.relationships.values().map(|r| &r.relationship)
    }

    pub fn relationship(&self, key: &RelationshipKey) -> Option<&StoredRelationship> {
        self.relationships.get(key)
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    pub fn relationship_count(&self) -> usize {
        self.relationships.len()
    }
}

impl GraphStore for MemoryStore {
    fn upsert_entities(
        &mut self,
        entities: &[Entity],
        _snapshot: Option<SnapshotVersion>,
    ) -> Result<usize, StoreError> {
        for entity in entities {
            match self.entities.get_mut(&entity.id) {
                Some(existing) if existing.kind() == EntityKind::Api => {
                    existing.merge(entity.clone())
                }
                _ => {
                    self.entities.insert(entity.id.clone(), entity.clone());
                }
            }
        }
        Ok(entities.len())
    }

    fn upsert_relationships(
        &mut self,
        relationships: &[Relationship],
        snapshot: Option<SnapshotVersion>,
    ) -> Result<usize, StoreError> {
        if let Some(dangling) = relationships.iter().find(|r| {
            !self.entities.contains_key(&r.from) || !self.entities.contains_key(&r.to)
        }) {
            return Err(StoreError::DanglingReference {
                from: dangling.from.clone(),
                kind: dangling.kind,
                to: dangling.to.clone(),
            });
        }

        for relationship in relationships {
            let stored = self
                .relationships
                .entry(relationship.key())
                .or_insert_with(|| StoredRelationship {
                    relationship: relationship.clone(),
                    snapshots: Vec::new(),
                });
            stored.relationship.properties = relationship.properties.clone();
            if let (true, Some(version)) = (self.keep_history, snapshot) {
                if stored.snapshots.last() != Some(&version) {
                    stored.snapshots.push(version);
                }
            }
        }
        Ok(relationships.len())
    }

    fn prune_stale(&mut self, repo_root: &str, live: &HashSet<EntityId>) -> Result<usize, StoreError> {
        let stale: HashSet<EntityId> = self
            .entities
            .values()
            .filter(|e| e.repo_root == repo_root && !live.contains(&e.id))
            .map(|e| e.id.clone())
            .collect();
        self.entities.retain(|id, _| !stale.contains(id));
        self.relationships
            .retain(|(from, _, to), _| !stale.contains(from) && !stale.contains(to));
        debug!(repo_root, removed = stale.len(), "pruned stale entities");
        Ok(stale.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{EntityDetails, RelationshipType};

    fn file(id: &str, lines: usize) -> Entity {
        Entity::new(
            id.to_string(),
            id,
            "/repo",
            EntityDetails::File { line_count: lines },
        )
    }

    #[test]
    fn test_upsert_is_idempotent() {
        let mut store = MemoryStore::new();
        let entities = vec![file("a", 1), file("b", 2)];
        let rels = vec![Relationship::new("a", RelationshipType::Contains, "b")];
        for _ in 0..2 {
            store.upsert_entities(&entities, None).unwrap();
            store.upsert_relationships(&rels, None).unwrap();
        }
        assert_eq!(store.entity_count(), 2);
        assert_eq!(store.relationship_count(), 1);
    }

    #[test]
    fn test_non_api_entities_are_replaced() {
        let mut store = MemoryStore::new();
        store.upsert_entities(&[file("a", 1)], None).unwrap();
        store.upsert_entities(&[file("a", 7)], None).unwrap();
        assert_eq!(
            store.entity("a").unwrap().details,
            EntityDetails::File { line_count: 7 }
        );
    }

    #[test]
    fn test_rejects_dangling_relationship() {
        let mut store = MemoryStore::new();
        store.upsert_entities(&[file("a", 1)], None).unwrap();
        let err = store
            .upsert_relationships(
                &[
                    Relationship::new("a", RelationshipType::Contains, "a"),
                    Relationship::new("a", RelationshipType::Contains, "zzz"),
                ],
                None,
            )
            .unwrap_err();
        assert!(matches!(err, StoreError::DanglingReference { .. }));
        // the batch is rejected as a whole
        assert_eq!(store.relationship_count(), 0);
    }

    #[test]
    fn test_history_records_snapshots() {
        let mut store = MemoryStore::with_history();
        store.upsert_entities(&[file("a", 1), file("b", 1)], Some(1)).unwrap();
        let rel = Relationship::new("a", RelationshipType::Contains, "b");
        store.upsert_relationships(&[rel.clone()], Some(1)).unwrap();
        store.upsert_relationships(&[rel.clone()], Some(1)).unwrap();
        store.upsert_relationships(&[rel.clone()], Some(2)).unwrap();
        assert_eq!(store.relationship(&rel.key()).unwrap().snapshots, vec![1, 2]);
    }

    #[test]
    fn test_prune_stale() {
        let mut store = MemoryStore::new();
        store
            .upsert_entities(&[file("a", 1), file("b", 1)], None)
            .unwrap();
        store
            .upsert_relationships(&[Relationship::new("a", RelationshipType::Contains, "b")], None)
            .unwrap();
        let live: HashSet<EntityId> = ["a".to_string()].into_iter().collect();
        assert_eq!(store.prune_stale("/repo", &live).unwrap(), 1);
        assert_eq!(store.entity_count(), 1);
        assert_eq!(store.relationship_count(), 0);
        assert_eq!(store.prune_stale("/other", &HashSet::new()).unwrap(), 0);
    }
}
