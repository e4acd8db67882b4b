//! Properties that must hold for every scan.

use std::collections::BTreeSet;

use repograph::analysis::Language;
use repograph::graph::{confidence, normalize_path, EntityKind, MatchOptions, RelationshipType};
use repograph::{AnalysisOptions, RepositoryGroup, Scanner, SourceFile};

fn provider() -> RepositoryGroup {
    RepositoryGroup::new("/work/orders-service")
        .with_file(SourceFile::new(
            "src/routes.js",
            Language::JavaScript,
            r#"
const express = require('express');
const router = express.Router();

router.get('/api/orders/:orderId/items', listItems);
router.post('/api/orders', createOrder);

function listItems(req, res) {
  res.json([]);
}

function createOrder(req, res) {
  validate(req.body);
  res.status(201).json({});
}

function validate(body) {
  if (!body) {
    throw new Error("missing body");
  }
}
"#,
        ))
        .with_file(SourceFile::new(
            "package.json",
            Language::Unknown,
            r#"{"dependencies": {"express": "^4.18.0", "lodash": "^4.17.21"}}"#,
        ))
}

fn consumer() -> RepositoryGroup {
    RepositoryGroup::new("/work/storefront")
        .with_file(SourceFile::new(
            "app/orders.py",
            Language::Python,
            r#"
import requests

def order_items(order_id):
    return requests.get("https://orders.internal/api/orders/17/items")

def place_order(payload):
    return requests.post("https://orders.internal/api/orders", json=payload)
"#,
        ))
        .with_file(SourceFile::new(
            "package.json",
            Language::Unknown,
            r#"{"devDependencies": {"lodash": "^4.17.21"}}"#,
        ))
}

fn key_sets(scanner: &Scanner) -> (BTreeSet<String>, BTreeSet<(String, RelationshipType, String)>) {
    let output = scanner.scan(&[provider(), consumer()]);
    let ids = output.graph.entities.iter().map(|e| e.id.clone()).collect();
    let keys = output.graph.relationships.iter().map(|r| r.key()).collect();
    (ids, keys)
}

#[test]
fn test_extraction_is_idempotent() {
    let scanner = Scanner::default();
    let first = key_sets(&scanner);
    let second = key_sets(&scanner);
    assert_eq!(first, second);
    assert!(!first.0.is_empty());
    assert!(!first.1.is_empty());
}

#[test]
fn test_graph_output_is_byte_identical_across_runs() {
    let scanner = Scanner::default();
    let render = || {
        let output = scanner.scan(&[consumer(), provider()]);
        serde_json::to_string(&(&output.graph.entities, &output.graph.relationships)).unwrap()
    };
    assert_eq!(render(), render());
}

#[test]
fn test_cross_repository_match_and_bounds() {
    let output = Scanner::default().scan(&[provider(), consumer()]);
    let graph = &output.graph;
    let edges: Vec<_> = graph
        .relationships_of(RelationshipType::ConsumesApiFrom)
        .collect();
    assert_eq!(edges.len(), 1);
    assert_eq!(graph.entity(&edges[0].from).unwrap().name, "storefront");
    assert_eq!(graph.entity(&edges[0].to).unwrap().name, "orders-service");
    assert_eq!(edges[0].properties["matchCount"], 2);

    for edge in &edges {
        let c = edge.property_f64("confidence").unwrap();
        assert!((0.0..=1.0).contains(&c));
        for m in edge.properties["matches"].as_array().unwrap() {
            let c = m["confidence"].as_f64().unwrap();
            assert!((0.0..=1.0).contains(&c));
        }
    }
}

#[test]
fn test_shared_packages_link_repositories() {
    let output = Scanner::default().scan(&[provider(), consumer()]);
    let graph = &output.graph;
    let shares: Vec<_> = graph
        .relationships_of(RelationshipType::SharesPackageWith)
        .collect();
    assert_eq!(shares.len(), 1);
    assert_eq!(shares[0].properties["sharedCount"], 1);
    // lodash is declared by both and exists once
    assert_eq!(
        graph
            .entities_of(EntityKind::Package)
            .filter(|p| p.name == "lodash")
            .count(),
        1
    );
}

#[test]
fn test_same_repository_scores_lower() {
    let cross = confidence(("GET", "/api/users/42"), ("GET", "/api/users/:id"), false).unwrap();
    let same = confidence(("GET", "/api/users/42"), ("GET", "/api/users/:id"), true).unwrap();
    assert!(same < cross);

    // the same holds for a scanned repository that calls itself
    let group = RepositoryGroup::new("/work/monolith").with_file(SourceFile::new(
        "server.js",
        Language::JavaScript,
        r#"
const express = require('express');
const axios = require('axios');
const app = express();
app.get('/api/users/:id', getUser);
function getUser(req, res) {
  return axios.get("http://localhost/api/users/42");
}
"#,
    ));
    let within = Scanner::new(
        AnalysisOptions::default(),
        MatchOptions {
            within_repository: true,
            min_confidence: 0.0,
        },
    );
    let output = within.scan(&[group.clone()]);
    let edge = output
        .graph
        .relationships_of(RelationshipType::ConsumesApiFrom)
        .next()
        .unwrap();
    assert_eq!(edge.from, edge.to);
    assert_eq!(edge.property_f64("confidence"), Some(same));

    // without the option no self edge is produced
    let output = Scanner::default().scan(&[group]);
    assert_eq!(
        output
            .graph
            .relationships_of(RelationshipType::ConsumesApiFrom)
            .count(),
        0
    );
}

#[test]
fn test_unrecognized_receiver_emits_no_api() {
    let group = RepositoryGroup::new("/work/tools").with_file(SourceFile::new(
        "cache.js",
        Language::JavaScript,
        r#"
function lookup(obj) {
  obj.get("/x");
  obj.get("x");
  return store.post("items", {});
}
"#,
    ));
    let output = Scanner::default().scan(&[group]);
    assert_eq!(output.graph.entities_of(EntityKind::Api).count(), 0);
}

#[test]
fn test_normalization_is_idempotent() {
    let inputs = [
        "https://api.example.com/users?active=true#top",
        "//cdn.example.com/assets/",
        "/v1//orders///${id}/items/",
        "${BASE_URL}/users/${userId}",
        "http://localhost:8080",
        "",
        "/",
        "orders/42?x=1",
        "/users/:id",
        "/items/{itemId}",
    ];
    for input in inputs {
        let once = normalize_path(input);
        assert_eq!(normalize_path(&once), once, "input {:?}", input);
        assert!(once.starts_with('/'));
        assert!(once == "/" || !once.ends_with('/'));
    }
}

#[test]
fn test_deeply_nested_source_is_truncated_not_fatal() {
    let depth = 2_000;
    let source = format!("x = {}1{}\n", "[".repeat(depth), "]".repeat(depth));
    let group = RepositoryGroup::new("/work/deep").with_file(SourceFile::new(
        "deep.py",
        Language::Python,
        source,
    ));
    let output = Scanner::default().scan(&[group]);
    assert_eq!(output.stats.files, 1);
    assert_eq!(output.stats.truncated, 1);
    let file = output.graph.entities_of(EntityKind::File).next().unwrap();
    assert_eq!(file.metadata["truncated"], true);
}
