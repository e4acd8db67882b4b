//! Graph store adapters.
//!
//! A store receives two batch operations, entities then relationships, and
//! applies them as create-or-merge keyed by entity id and by
//! `(from, type, to)`. Re-publishing the same batch is a no-op.
//!
//! Stores are explicit values owned by the caller; there is no process-wide
//! connection. Publishing performs no retries: when the relationship batch
//! fails after the entity batch succeeded, re-running the relationship
//! batch is safe.

mod jsonl;
mod memory;

pub use jsonl::JsonlStore;
pub use memory::{MemoryStore, StoredRelationship};

use std::collections::HashSet;
use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;
use thiserror::Error;
use tracing::debug;

use crate::graph::{Entity, EntityId, Graph, Relationship, RelationshipType};

/// Opaque monotonic tag attached to a published batch.
pub type SnapshotVersion = u64;

/// Errors raised by a graph store.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("{kind} relationship references unknown entity: {from} -> {to}")]
    DanglingReference {
        from: EntityId,
        kind: RelationshipType,
        to: EntityId,
    },
}

/// Destination for entity and relationship batches.
pub trait GraphStore {
    /// Create or merge entities by id. Returns the number applied.
    fn upsert_entities(
        &mut self,
        entities: &[Entity],
        snapshot: Option<SnapshotVersion>,
    ) -> Result<usize, StoreError>;

    /// Create or merge relationships by `(from, type, to)`. Returns the
    /// number applied.
    fn upsert_relationships(
        &mut self,
        relationships: &[Relationship],
        snapshot: Option<SnapshotVersion>,
    ) -> Result<usize, StoreError>;

    /// Remove entities of `repo_root` that are not in `live`, with their
    /// relationships. Returns the number of entities removed.
    ///
    /// Stores that cannot prune keep the default, which removes nothing.
    fn prune_stale(
        &mut self,
        _repo_root: &str,
        _live: &HashSet<EntityId>,
    ) -> Result<usize, StoreError> {
        Ok(0)
    }
}

/// Issues strictly increasing snapshot versions based on wall-clock
/// milliseconds.
#[derive(Debug, Default)]
pub struct SnapshotClock {
    last: Mutex<SnapshotVersion>,
}

impl SnapshotClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next(&self) -> SnapshotVersion {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as SnapshotVersion)
            .unwrap_or(0);
        let mut last = self.last.lock();
        let version = now.max(*last + 1);
        *last = version;
        version
    }
}

/// Counts applied by [`publish`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PublishReport {
    pub entities: usize,
    pub relationships: usize,
    pub snapshot: Option<SnapshotVersion>,
}

/// Publish a graph: entities first, then relationships.
pub fn publish(
    store: &mut dyn GraphStore,
    graph: &Graph,
    snapshot: Option<SnapshotVersion>,
) -> Result<PublishReport, StoreError> {
    let entities = store.upsert_entities(&graph.entities, snapshot)?;
    let relationships = store.upsert_relationships(&graph.relationships, snapshot)?;
    debug!(entities, relationships, ?snapshot, "published graph");
    Ok(PublishReport {
        entities,
        relationships,
        snapshot,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_clock_is_strictly_increasing() {
        let clock = SnapshotClock::new();
        let mut previous = clock.next();
        for _ in 0..100 {
            let next = clock.next();
            assert!(next > previous);
            previous = next;
        }
    }

    #[test]
    fn test_dangling_reference_message() {
        let err = StoreError::DanglingReference {
            from: "a".to_string(),
            kind: RelationshipType::Calls,
            to: "b".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Calls relationship references unknown entity: a -> b"
        );
    }
}
