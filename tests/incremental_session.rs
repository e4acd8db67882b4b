//! Incremental recomputation against repositories on disk.

use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::time::Duration;

use repograph::graph::{EntityKind, RelationshipType};
use repograph::store::{publish, GraphStore, MemoryStore};
use repograph::{
    collect_repository, ChangeCoalescer, ChangeKind, Config, FileChange, IncrementalSession,
    RepositoryGroup, Scanner,
};
use tempfile::TempDir;

const SERVER: &str = r#"const express = require('express');
const app = express();
app.get('/api/health', health);
function health(req, res) { res.send('ok'); }
"#;

const CLIENT: &str = r#"const axios = require('axios');
function ping() {
  return axios.get('http://svc/api/health');
}
"#;

struct Workspace {
    provider: TempDir,
    consumer: TempDir,
    groups: Vec<RepositoryGroup>,
}

impl Workspace {
    fn new() -> Self {
        let provider = TempDir::new().unwrap();
        let consumer = TempDir::new().unwrap();
        fs::write(provider.path().join("server.js"), SERVER).unwrap();
        fs::write(consumer.path().join("client.js"), CLIENT).unwrap();
        let config = Config::default();
        let groups = vec![
            collect_repository(provider.path(), &config).unwrap(),
            collect_repository(consumer.path(), &config).unwrap(),
        ];
        Self {
            provider,
            consumer,
            groups,
        }
    }

    fn provider_root(&self) -> &str {
        &self.groups[0].repo_root
    }

    fn consumer_root(&self) -> &str {
        &self.groups[1].repo_root
    }
}

fn append(path: &Path, text: &str) {
    let mut content = fs::read_to_string(path).unwrap();
    content.push_str(text);
    fs::write(path, content).unwrap();
}

#[test]
fn test_modified_file_yields_only_changed_entities() {
    let ws = Workspace::new();
    let mut session = IncrementalSession::new(Scanner::default());
    let initial = session.load(&ws.groups).clone();
    assert_eq!(
        initial
            .relationships_of(RelationshipType::ConsumesApiFrom)
            .count(),
        1
    );

    let mut store = MemoryStore::new();
    publish(&mut store, &initial, Some(1)).unwrap();

    append(
        &ws.provider.path().join("server.js"),
        "app.post('/api/orders', create);\nfunction create(req, res) { res.send('created'); }\n",
    );
    let delta = session.apply(&[FileChange::new(
        ws.provider_root(),
        "server.js",
        ChangeKind::Modified,
    )]);

    assert_eq!(delta.reanalyzed, vec!["server.js"]);
    assert!(delta.stale.is_empty());
    let names: HashSet<&str> = delta.entities.iter().map(|e| e.name.as_str()).collect();
    assert!(names.contains("POST /api/orders"));
    assert!(names.contains("create"));
    assert!(names.contains("server.js"));
    // nothing in the untouched repository changed
    assert!(!names.contains("ping"));
    assert!(!names.contains("client.js"));

    // the delta publishes cleanly on top of the earlier snapshot
    let report = publish(&mut store, &delta.as_graph(), Some(2)).unwrap();
    assert_eq!(report.relationships, delta.relationships.len());
    assert_eq!(store.entity_count(), session.graph().entities.len());
}

#[test]
fn test_deleted_file_is_reported_stale_not_removed() {
    let ws = Workspace::new();
    let mut session = IncrementalSession::new(Scanner::default());
    let initial = session.load(&ws.groups).clone();
    let mut store = MemoryStore::new();
    publish(&mut store, &initial, Some(1)).unwrap();
    let before = store.entity_count();

    fs::remove_file(ws.consumer.path().join("client.js")).unwrap();
    let delta = session.apply(&[FileChange::new(
        ws.consumer_root(),
        "client.js",
        ChangeKind::Deleted,
    )]);

    assert_eq!(delta.deleted, vec!["client.js"]);
    assert!(!delta.stale.is_empty());
    assert_eq!(
        session
            .graph()
            .relationships_of(RelationshipType::ConsumesApiFrom)
            .count(),
        0
    );

    publish(&mut store, &delta.as_graph(), Some(2)).unwrap();
    assert_eq!(store.entity_count(), before);

    // pruning is the store's decision
    let live: HashSet<String> = session
        .graph()
        .entities
        .iter()
        .filter(|e| e.repo_root == ws.consumer_root())
        .map(|e| e.id.clone())
        .collect();
    let removed = store.prune_stale(ws.consumer_root(), &live).unwrap();
    assert_eq!(removed, delta.stale.len());
    assert!(store
        .entities()
        .all(|e| e.kind() != EntityKind::File || e.name != "client.js"));
}

#[test]
fn test_coalesced_events_reanalyze_once() {
    let ws = Workspace::new();
    let mut session = IncrementalSession::new(Scanner::default());
    session.load(&ws.groups);

    fs::write(
        ws.consumer.path().join("orders.js"),
        "const axios = require('axios');\nfunction list() { return axios.get('http://svc/api/orders'); }\n",
    )
    .unwrap();

    let coalescer = ChangeCoalescer::new(Duration::from_millis(100));
    coalescer.record(FileChange::new(
        ws.consumer_root(),
        "orders.js",
        ChangeKind::Created,
    ));
    for _ in 0..5 {
        coalescer.record(FileChange::new(
            ws.consumer_root(),
            "orders.js",
            ChangeKind::Modified,
        ));
    }
    let changes = coalescer.flush_all();
    assert_eq!(changes.len(), 1);

    let delta = session.apply(&changes);
    assert_eq!(delta.reanalyzed, vec!["orders.js"]);
    assert!(delta
        .entities
        .iter()
        .any(|e| e.kind() == EntityKind::Api && e.name == "GET /api/orders"));
}

#[test]
fn test_unchanged_apply_is_empty() {
    let ws = Workspace::new();
    let mut session = IncrementalSession::new(Scanner::default());
    session.load(&ws.groups);

    let delta = session.apply(&[FileChange::new(
        ws.provider_root(),
        "server.js",
        ChangeKind::Modified,
    )]);
    assert!(delta.is_empty());
    assert!(!delta.relationships.is_empty());

    // events for repositories that were never loaded are ignored
    let delta = session.apply(&[FileChange::new("/elsewhere", "a.js", ChangeKind::Modified)]);
    assert!(delta.is_empty());
}
