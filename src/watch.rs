//! Incremental recomputation driven by file change events.
//!
//! Event delivery belongs to the caller (a file watcher, an editor hook).
//! [`ChangeCoalescer`] debounces the raw events; [`IncrementalSession`]
//! re-analyzes the files that settled and produces a publishable delta.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::graph::{Entity, EntityId, FileAnalysis, Graph, Relationship, RepositoryAnalysis};
use crate::manifest::Manifest;
use crate::pipeline::Scanner;
use crate::source::{read_source_file, RepositoryGroup};

/// Kind of a file change event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    Created,
    Modified,
    Deleted,
}

/// A change to one file of a repository.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FileChange {
    pub repo_root: String,
    /// Repository-relative path with `/` separators.
    pub rel_path: String,
    pub kind: ChangeKind,
}

impl FileChange {
    pub fn new(repo_root: impl Into<String>, rel_path: impl Into<String>, kind: ChangeKind) -> Self {
        Self {
            repo_root: repo_root.into(),
            rel_path: rel_path.into(),
            kind,
        }
    }
}

type ChangeKey = (String, String);

#[derive(Debug)]
struct Pending {
    kind: ChangeKind,
    last_seen: Instant,
}

/// Collapses rapid events for the same file.
///
/// A file is ready once no event for it arrived within the window. The
/// latest event kind wins.
#[derive(Debug)]
pub struct ChangeCoalescer {
    window: Duration,
    pending: Mutex<HashMap<ChangeKey, Pending>>,
}

impl ChangeCoalescer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            pending: Mutex::new(HashMap::new()),
        }
    }

    pub fn record(&self, change: FileChange) {
        self.record_at(change, Instant::now());
    }

    pub fn record_at(&self, change: FileChange, at: Instant) {
        let mut pending = self.pending.lock();
        let key = (change.repo_root, change.rel_path);
        if pending.contains_key(&key) {
            debug!(path = %key.1, kind = ?change.kind, "coalesced change");
        }
        pending.insert(
            key,
            Pending {
                kind: change.kind,
                last_seen: at,
            },
        );
    }

    /// Number of files with unsettled changes.
    pub fn pending(&self) -> usize {
        self.pending.lock().len()
    }

    /// Remove and return the changes that settled by `now`, sorted by
    /// repository and path.
    pub fn drain_ready(&self, now: Instant) -> Vec<FileChange> {
        let window = self.window;
        self.drain_where(|p| now.saturating_duration_since(p.last_seen) >= window)
    }

    /// Remove and return every pending change.
    pub fn flush_all(&self) -> Vec<FileChange> {
        self.drain_where(|_| true)
    }

    fn drain_where(&self, ready: impl Fn(&Pending) -> bool) -> Vec<FileChange> {
        let mut pending = self.pending.lock();
        let keys: Vec<ChangeKey> = pending
            .iter()
            .filter(|(_, p)| ready(p))
            .map(|(k, _)| k.clone())
            .collect();
        let mut changes: Vec<FileChange> = keys
            .into_iter()
            .filter_map(|key| {
                let entry = pending.remove(&key)?;
                Some(FileChange::new(key.0, key.1, entry.kind))
            })
            .collect();
        changes.sort_by(|a, b| (&a.repo_root, &a.rel_path).cmp(&(&b.repo_root, &b.rel_path)));
        changes
    }
}

/// Result of applying a set of changes.
#[derive(Debug, Clone, Default)]
pub struct Delta {
    /// Entities that are new or differ from the previous graph.
    pub entities: Vec<Entity>,
    /// The full relationship set; publishing it again is idempotent.
    pub relationships: Vec<Relationship>,
    /// Entities of the previous graph that no longer exist. They are not
    /// removed from any store here.
    pub stale: Vec<EntityId>,
    pub reanalyzed: Vec<String>,
    pub deleted: Vec<String>,
}

impl Delta {
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty() && self.stale.is_empty()
    }

    /// The delta as a graph, for publishing.
    pub fn as_graph(&self) -> Graph {
        Graph {
            entities: self.entities.clone(),
            relationships: self.relationships.clone(),
        }
    }
}

#[derive(Debug, Default)]
struct RepositoryState {
    root: PathBuf,
    files: BTreeMap<String, FileAnalysis>,
    manifests: BTreeMap<String, Manifest>,
}

impl RepositoryState {
    fn to_analysis(&self) -> RepositoryAnalysis {
        RepositoryAnalysis {
            repo_root: self.root.to_string_lossy().to_string(),
            files: self.files.values().cloned().collect(),
            manifests: self.manifests.values().cloned().collect(),
        }
    }

    fn forget(&mut self, rel_path: &str) {
        self.files.remove(rel_path);
        self.manifests.remove(rel_path);
    }
}

/// Keeps per-file analyses so that single changes re-analyze one file.
pub struct IncrementalSession {
    scanner: Scanner,
    repositories: BTreeMap<String, RepositoryState>,
    graph: Graph,
}

impl IncrementalSession {
    pub fn new(scanner: Scanner) -> Self {
        Self {
            scanner,
            repositories: BTreeMap::new(),
            graph: Graph::default(),
        }
    }

    /// The graph as of the last load or apply.
    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    /// Full scan of `groups`, replacing any previous state.
    pub fn load(&mut self, groups: &[RepositoryGroup]) -> &Graph {
        let output = self.scanner.scan(groups);
        self.repositories.clear();
        for (group, repo) in groups.iter().zip(output.repositories) {
            let mut state = RepositoryState {
                root: PathBuf::from(&repo.repo_root),
                ..RepositoryState::default()
            };
            for file in repo.files {
                state.files.insert(file.path.clone(), file);
            }
            for manifest in repo.manifests {
                state.manifests.insert(manifest.path.clone(), manifest);
            }
            self.repositories.insert(group.repo_root.clone(), state);
        }
        self.graph = output.graph;
        &self.graph
    }

    /// Re-analyze changed files from disk and re-link.
    ///
    /// Changes for repositories that were never loaded are ignored.
    pub fn apply(&mut self, changes: &[FileChange]) -> Delta {
        let mut delta = Delta::default();
        // the last event per file wins inside one batch
        let mut latest: BTreeMap<(&str, &str), ChangeKind> = BTreeMap::new();
        for change in changes {
            latest.insert((&change.repo_root, &change.rel_path), change.kind);
        }

        for ((repo_root, rel_path), kind) in latest {
            let Some(state) = self.repositories.get_mut(repo_root) else {
                warn!(repo = repo_root, path = rel_path, "change for unknown repository");
                continue;
            };
            match kind {
                ChangeKind::Deleted => {
                    state.forget(rel_path);
                    info!(path = rel_path, "file deleted; stored entities are left for pruning");
                    delta.deleted.push(rel_path.to_string());
                }
                ChangeKind::Created | ChangeKind::Modified => {
                    let root = state.root.clone();
                    reanalyze(&self.scanner, state, &root, rel_path);
                    delta.reanalyzed.push(rel_path.to_string());
                }
            }
        }

        let repositories: Vec<RepositoryAnalysis> =
            self.repositories.values().map(RepositoryState::to_analysis).collect();
        let graph = self.scanner.link(&repositories);

        let live: BTreeSet<&str> = graph.entities.iter().map(|e| e.id.as_str()).collect();
        delta.stale = self
            .graph
            .entities
            .iter()
            .filter(|e| !live.contains(e.id.as_str()))
            .map(|e| e.id.clone())
            .collect();
        delta.entities = graph
            .entities
            .iter()
            .filter(|&e| self.graph.entity(&e.id) != Some(e))
            .cloned()
            .collect();
        delta.relationships = graph.relationships.clone();
        debug!(
            changed = delta.entities.len(),
            stale = delta.stale.len(),
            "applied changes"
        );
        self.graph = graph;
        delta
    }
}

fn reanalyze(scanner: &Scanner, state: &mut RepositoryState, root: &Path, rel_path: &str) {
    state.forget(rel_path);
    let Some(file) = read_source_file(root, &root.join(rel_path)) else {
        debug!(path = rel_path, "changed file is not analyzable");
        return;
    };
    if let Some(manifest) = scanner.read_manifest(&file) {
        state.manifests.insert(rel_path.to_string(), manifest);
    }
    if let Some(analysis) = scanner.analyze_file(&file) {
        state.files.insert(rel_path.to_string(), analysis);
    }
}
