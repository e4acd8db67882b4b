//! Cross-repository API matching.
//!
//! Consumed APIs of one repository are matched against provided APIs of
//! another. Every matching pair contributes to a single `ConsumesApiFrom`
//! edge between the two repository entities.
//!
//! # Confidence
//!
//! Scored in tenths so the result is exact and bounded:
//!
//! | condition                          | tenths |
//! |------------------------------------|--------|
//! | exact normalized path              | +5     |
//! | containment or template match      | +3     |
//! | methods agree (required)           | +3     |
//! | both APIs in the same repository   | -2     |
//! | provided path longer than 10 / 20  | +1 / +1|
//!
//! The sum is clamped to `[0, 10]`.

use std::collections::BTreeMap;

use rayon::prelude::*;
use serde_json::json;
use tracing::debug;

use super::ids::repository_id;
use super::normalize::{match_paths, PathMatch};
use super::{Entity, EntityDetails, EntityId, Relationship, RelationshipType};
use crate::analysis::Direction;

/// Matching options.
#[derive(Debug, Clone, Default)]
pub struct MatchOptions {
    /// Also match a repository's consumed APIs against its own provided APIs.
    pub within_repository: bool,
    /// Matches scoring below this are dropped.
    pub min_confidence: f64,
}

/// An API entity reduced to what matching needs.
#[derive(Debug, Clone)]
struct ApiRef<'a> {
    id: &'a str,
    method: &'a str,
    path: &'a str,
}

/// Consumed and provided APIs of one repository.
#[derive(Debug, Default)]
struct RepoApis<'a> {
    consumed: Vec<ApiRef<'a>>,
    provided: Vec<ApiRef<'a>>,
}

#[derive(Debug, Clone)]
struct ApiMatch {
    consumed: EntityId,
    provided: EntityId,
    kind: PathMatch,
    tenths: i32,
}

/// Confidence in tenths for a consumed/provided pair, or None on no match.
fn score(consumed: &ApiRef, provided: &ApiRef, same_repository: bool) -> Option<(PathMatch, i32)> {
    if consumed.method != provided.method {
        return None;
    }
    let kind = match_paths(consumed.path, provided.path)?;
    let mut tenths = match kind {
        PathMatch::Exact => 5,
        PathMatch::Contains | PathMatch::Template => 3,
    };
    tenths += 3;
    if same_repository {
        tenths -= 2;
    }
    if provided.path.len() > 10 {
        tenths += 1;
    }
    if provided.path.len() > 20 {
        tenths += 1;
    }
    Some((kind, tenths.clamp(0, 10)))
}

/// Confidence for a pair of API paths and methods, in `[0, 1]`.
///
/// Exposed for reporting; matching itself works on entities.
pub fn confidence(
    consumed: (&str, &str),
    provided: (&str, &str),
    same_repository: bool,
) -> Option<f64> {
    let consumed = ApiRef {
        id: "",
        method: consumed.0,
        path: consumed.1,
    };
    let provided = ApiRef {
        id: "",
        method: provided.0,
        path: provided.1,
    };
    score(&consumed, &provided, same_repository).map(|(_, tenths)| tenths as f64 / 10.0)
}

fn match_pair(consumer: &RepoApis, provider: &RepoApis, same_repository: bool) -> Vec<ApiMatch> {
    let mut matches = Vec::new();
    for c in &consumer.consumed {
        for p in &provider.provided {
            if let Some((kind, tenths)) = score(c, p, same_repository) {
                matches.push(ApiMatch {
                    consumed: c.id.to_string(),
                    provided: p.id.to_string(),
                    kind,
                    tenths,
                });
            }
        }
    }
    matches
}

/// `ConsumesApiFrom` edges between repositories.
///
/// Each ordered pair of repositories is matched independently and in
/// parallel. An edge carries every matched pair, the highest confidence and
/// the match count.
pub fn match_apis(entities: &[Entity], options: &MatchOptions) -> Vec<Relationship> {
    let mut repos: BTreeMap<&str, RepoApis> = BTreeMap::new();
    for entity in entities {
        let EntityDetails::Api {
            method,
            path,
            direction,
            ..
        } = &entity.details
        else {
            continue;
        };
        let api = ApiRef {
            id: &entity.id,
            method,
            path,
        };
        let apis = repos.entry(entity.repo_root.as_str()).or_default();
        match direction {
            Direction::Consumed => apis.consumed.push(api),
            Direction::Provided => apis.provided.push(api),
        }
    }

    let pairs: Vec<(&str, &str)> = repos
        .iter()
        .filter(|(_, apis)| !apis.consumed.is_empty())
        .flat_map(|(consumer, _)| {
            repos
                .iter()
                .filter(|(_, apis)| !apis.provided.is_empty())
                .map(move |(provider, _)| (*consumer, *provider))
        })
        .filter(|(consumer, provider)| options.within_repository || consumer != provider)
        .collect();

    pairs
        .par_iter()
        .filter_map(|(consumer, provider)| {
            let same = consumer == provider;
            // tolerate float noise such as 0.7 * 10.0
            let min_tenths = (options.min_confidence * 10.0 - 1e-9).ceil() as i32;
            let mut matches: Vec<ApiMatch> = match_pair(&repos[consumer], &repos[provider], same)
                .into_iter()
                .filter(|m| m.tenths >= min_tenths)
                .collect();
            if matches.is_empty() {
                return None;
            }
            matches.sort_by(|a, b| (&a.consumed, &a.provided).cmp(&(&b.consumed, &b.provided)));
            let best = matches.iter().map(|m| m.tenths).max().unwrap_or(0);
            debug!(
                consumer = %consumer,
                provider = %provider,
                matches = matches.len(),
                "matched APIs across repositories"
            );

            let details: Vec<_> = matches
                .iter()
                .map(|m| {
                    json!({
                        "consumed": m.consumed,
                        "provided": m.provided,
                        "matchType": m.kind.as_str(),
                        "confidence": m.tenths as f64 / 10.0,
                    })
                })
                .collect();
            Some(
                Relationship::new(
                    repository_id(consumer),
                    RelationshipType::ConsumesApiFrom,
                    repository_id(provider),
                )
                .with_property("matches", details)
                .with_property("confidence", best as f64 / 10.0)
                .with_property("matchCount", matches.len()),
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::ids::api_id;

    fn api(repo: &str, direction: Direction, method: &str, path: &str) -> Entity {
        Entity::new(
            api_id(repo, direction, method, path),
            format!("{} {}", method, path),
            repo,
            EntityDetails::Api {
                method: method.to_string(),
                path: path.to_string(),
                raw: path.to_string(),
                direction,
                framework: None,
            },
        )
    }

    #[test]
    fn test_templated_match_scores_point_six() {
        let entities = vec![
            api("/r1", Direction::Provided, "GET", "/users/:id"),
            api("/r2", Direction::Consumed, "GET", "/users/42"),
        ];
        let edges = match_apis(&entities, &MatchOptions::default());
        assert_eq!(edges.len(), 1);
        let edge = &edges[0];
        assert_eq!(edge.from, repository_id("/r2"));
        assert_eq!(edge.to, repository_id("/r1"));
        assert!(edge.property_f64("confidence").unwrap() >= 0.6);
        assert_eq!(edge.properties["matchCount"], json!(1));
        assert_eq!(edge.properties["matches"][0]["matchType"], json!("template"));
    }

    #[test]
    fn test_method_mismatch_does_not_match() {
        let entities = vec![
            api("/r1", Direction::Provided, "POST", "/orders"),
            api("/r2", Direction::Consumed, "GET", "/orders"),
        ];
        assert!(match_apis(&entities, &MatchOptions::default()).is_empty());
    }

    #[test]
    fn test_same_repository_needs_option_and_scores_lower() {
        let entities = vec![
            api("/r1", Direction::Provided, "GET", "/users"),
            api("/r1", Direction::Consumed, "GET", "/users"),
        ];
        assert!(match_apis(&entities, &MatchOptions::default()).is_empty());

        let options = MatchOptions {
            within_repository: true,
            ..MatchOptions::default()
        };
        let edges = match_apis(&entities, &options);
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].from, edges[0].to);

        let same = confidence(("GET", "/users"), ("GET", "/users"), true).unwrap();
        let cross = confidence(("GET", "/users"), ("GET", "/users"), false).unwrap();
        assert!(same < cross);
    }

    #[test]
    fn test_confidence_bounds() {
        let long = "/api/v1/organizations/members/settings";
        let cases = [
            (("GET", long), ("GET", long), false),
            (("GET", long), ("GET", long), true),
            (("GET", "/a/users"), ("GET", "/users"), true),
            (("GET", "/users/1"), ("GET", "/users/:id"), false),
        ];
        for (consumed, provided, same) in cases {
            let value = confidence(consumed, provided, same).unwrap();
            assert!((0.0..=1.0).contains(&value), "{} out of bounds", value);
        }
        assert_eq!(confidence(("GET", long), ("GET", long), false), Some(1.0));
    }

    #[test]
    fn test_min_confidence_filters() {
        let entities = vec![
            api("/r1", Direction::Provided, "GET", "/users/:id"),
            api("/r2", Direction::Consumed, "GET", "/users/42"),
        ];
        let options = MatchOptions {
            min_confidence: 0.7,
            ..MatchOptions::default()
        };
        assert!(match_apis(&entities, &options).is_empty());
    }

    #[test]
    fn test_multiple_matches_aggregate_per_pair() {
        let entities = vec![
            api("/r1", Direction::Provided, "GET", "/users"),
            api("/r1", Direction::Provided, "POST", "/orders"),
            api("/r2", Direction::Consumed, "GET", "/users"),
            api("/r2", Direction::Consumed, "POST", "/v1/orders"),
        ];
        let edges = match_apis(&entities, &MatchOptions::default());
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].properties["matchCount"], json!(2));
        assert_eq!(edges[0].property_f64("confidence"), Some(0.8));
    }
}
