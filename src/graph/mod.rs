//! Code knowledge graph construction.
//!
//! Per-file findings are turned into entities, then a linking pass adds the
//! structural, cross-repository and package relationships.
//!
//! # Pipeline
//!
//! ```text
//! RepositoryAnalysis ──▶ synth (per file, parallel) ──▶ merge by id
//!                                                          │
//!                  ┌───────────────────────────────────────┘
//!                  ▼
//!   relations (per repository) + matching (per repository pair, parallel)
//!   + packages ──▶ dedup by (from, type, to) ──▶ dangling filter ──▶ Graph
//! ```
//!
//! Cross-repository matching needs the complete entity set, so linking runs
//! only after every file is synthesized.

pub mod ids;
mod matching;
mod model;
mod normalize;
mod packages;
mod relations;
mod synth;

pub use matching::{confidence, match_apis, MatchOptions};
pub use model::{
    dedup_relationships, merge_entities, Entity, EntityDetails, EntityId, EntityKind,
    Relationship, RelationshipKey, RelationshipType,
};
pub use normalize::{match_paths, normalize_method, normalize_path, path_template, PathMatch};
pub use packages::package_relationships;
pub use relations::{filter_dangling, structural_relationships, Linked};
pub use synth::{api_entity_id, declaration_entity_id, synthesize_file};

use std::collections::{BTreeMap, HashSet};

use rayon::prelude::*;
use tracing::debug;

use crate::analysis::{Findings, Language};
use crate::manifest::Manifest;

/// Analysis result for one file.
#[derive(Debug, Clone)]
pub struct FileAnalysis {
    /// Repository-relative path with `/` separators.
    pub path: String,
    pub language: Language,
    pub line_count: usize,
    /// None when the file could not be analyzed.
    pub findings: Option<Findings>,
}

/// Analysis results for one repository.
#[derive(Debug, Clone, Default)]
pub struct RepositoryAnalysis {
    pub repo_root: String,
    pub files: Vec<FileAnalysis>,
    pub manifests: Vec<Manifest>,
}

impl RepositoryAnalysis {
    pub fn new(repo_root: impl Into<String>) -> Self {
        Self {
            repo_root: repo_root.into(),
            ..Self::default()
        }
    }
}

/// Entities and relationships ready to publish.
#[derive(Debug, Clone, Default)]
pub struct Graph {
    /// Sorted by id, one entity per id.
    pub entities: Vec<Entity>,
    /// Sorted by key, one relationship per key.
    pub relationships: Vec<Relationship>,
}

impl Graph {
    pub fn entity(&self, id: &str) -> Option<&Entity> {
        self.entities
            .binary_search_by(|e| e.id.as_str().cmp(id))
            .ok()
            .map(|i| &self.entities[i])
    }

    pub fn entities_of(&self, kind: EntityKind) -> impl Iterator<Item = &Entity> {
        self.entities.iter().filter(move |e| e.kind() == kind)
    }

    pub fn relationships_of(
        &self,
        kind: RelationshipType,
    ) -> impl Iterator<Item = &Relationship> {
        self.relationships.iter().filter(move |r| r.kind == kind)
    }

    /// Entity counts per kind.
    pub fn entity_counts(&self) -> BTreeMap<EntityKind, usize> {
        let mut counts = BTreeMap::new();
        for entity in &self.entities {
            *counts.entry(entity.kind()).or_insert(0) += 1;
        }
        counts
    }

    /// Relationship counts per type.
    pub fn relationship_counts(&self) -> BTreeMap<RelationshipType, usize> {
        let mut counts = BTreeMap::new();
        for relationship in &self.relationships {
            *counts.entry(relationship.kind).or_insert(0) += 1;
        }
        counts
    }
}

/// Build the graph for a set of repositories.
pub fn build_graph(repositories: &[RepositoryAnalysis], options: &MatchOptions) -> Graph {
    let mut entities: Vec<Entity> = repositories
        .par_iter()
        .flat_map_iter(|repo| {
            repo.files
                .par_iter()
                .flat_map_iter(|file| synthesize_file(&repo.repo_root, file))
                .collect::<Vec<_>>()
        })
        .collect();

    let mut relationships = Vec::new();
    for repo in repositories {
        let linked = structural_relationships(repo);
        entities.extend(linked.entities);
        relationships.extend(linked.relationships);
    }

    let (package_entities, package_edges) = package_relationships(repositories);
    entities.extend(package_entities);
    relationships.extend(package_edges);

    let entities = merge_entities(entities);
    relationships.extend(match_apis(&entities, options));

    let relationships = dedup_relationships(relationships);
    let known: HashSet<&str> = entities.iter().map(|e| e.id.as_str()).collect();
    let relationships = filter_dangling(relationships, &known);
    debug!(
        entities = entities.len(),
        relationships = relationships.len(),
        "graph built"
    );

    Graph {
        entities,
        relationships,
    }
}
