//! Package dependency relationships.
//!
//! Package entities are global: their id depends only on the manager and
//! the name, so every repository declaring a package points at the same
//! entity. Global entities carry an empty `repo_root`.

use std::collections::{BTreeMap, BTreeSet};

use serde_json::json;

use super::ids::{package_id, repository_id};
use super::{Entity, EntityDetails, EntityId, Relationship, RelationshipType, RepositoryAnalysis};

/// Shared packages listed on a `SharesPackageWith` edge.
const SHARED_SAMPLE_SIZE: usize = 5;

/// Package entities, `RepoDependsOnPackage` and `SharesPackageWith` edges.
pub fn package_relationships(
    repositories: &[RepositoryAnalysis],
) -> (Vec<Entity>, Vec<Relationship>) {
    let mut entities = Vec::new();
    let mut relationships = Vec::new();
    let mut declared: BTreeMap<&str, BTreeSet<EntityId>> = BTreeMap::new();

    for repo in repositories {
        let repo_id = repository_id(&repo.repo_root);
        let packages = declared.entry(repo.repo_root.as_str()).or_default();
        for manifest in &repo.manifests {
            let manager = manifest.manager.as_str();
            for package in &manifest.packages {
                let id = package_id(manager, &package.name);
                entities.push(
                    Entity::new(
                        id.clone(),
                        package.name.as_str(),
                        "",
                        EntityDetails::Package {
                            manager: manager.to_string(),
                            version: package.version.clone(),
                        },
                    )
                    .with_metadata("declaredBy", json!([repo.repo_root])),
                );

                let mut edge = Relationship::new(
                    repo_id.clone(),
                    RelationshipType::RepoDependsOnPackage,
                    id.clone(),
                )
                .with_property("manager", manager)
                .with_property("scope", package.scope.as_str())
                .with_property("manifest", manifest.path.as_str());
                if let Some(version) = &package.version {
                    edge = edge.with_property("version", version.as_str());
                }
                relationships.push(edge);
                packages.insert(id);
            }
        }
    }

    // BTreeMap order puts the lower repository root first in each pair
    let repos: Vec<(&str, &BTreeSet<EntityId>)> =
        declared.iter().map(|(root, ids)| (*root, ids)).collect();
    for (i, (left, left_ids)) in repos.iter().enumerate() {
        for (right, right_ids) in &repos[i + 1..] {
            let shared: Vec<&EntityId> = left_ids.intersection(right_ids).collect();
            if shared.is_empty() {
                continue;
            }
            let sample: Vec<&EntityId> = shared.iter().take(SHARED_SAMPLE_SIZE).copied().collect();
            relationships.push(
                Relationship::new(
                    repository_id(left),
                    RelationshipType::SharesPackageWith,
                    repository_id(right),
                )
                .with_property("sharedCount", shared.len())
                .with_property("samplePackages", json!(sample)),
            );
        }
    }

    (entities, relationships)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::{DeclaredPackage, Manifest, PackageManager};

    fn repo(root: &str, packages: &[&str]) -> RepositoryAnalysis {
        let mut repo = RepositoryAnalysis::new(root);
        repo.manifests.push(Manifest {
            path: "package.json".to_string(),
            manager: PackageManager::Npm,
            packages: packages
                .iter()
                .map(|p| DeclaredPackage::new(*p, Some("1.0.0".to_string()), "runtime"))
                .collect(),
        });
        repo
    }

    #[test]
    fn test_depends_on_package_edges() {
        let (entities, relationships) = package_relationships(&[repo("/a", &["axios", "lodash"])]);
        assert_eq!(entities.len(), 2);
        let depends: Vec<&Relationship> = relationships
            .iter()
            .filter(|r| r.kind == RelationshipType::RepoDependsOnPackage)
            .collect();
        assert_eq!(depends.len(), 2);
        assert_eq!(depends[0].properties["manager"], json!("npm"));
        assert_eq!(depends[0].properties["version"], json!("1.0.0"));
    }

    #[test]
    fn test_shares_package_once_per_unordered_pair() {
        let repos = [
            repo("/b", &["axios", "lodash", "react"]),
            repo("/a", &["axios", "lodash"]),
            repo("/c", &["vue"]),
        ];
        let (_, relationships) = package_relationships(&repos);
        let shares: Vec<&Relationship> = relationships
            .iter()
            .filter(|r| r.kind == RelationshipType::SharesPackageWith)
            .collect();
        assert_eq!(shares.len(), 1);
        assert_eq!(shares[0].from, repository_id("/a"));
        assert_eq!(shares[0].to, repository_id("/b"));
        assert_eq!(shares[0].properties["sharedCount"], json!(2));
        assert_eq!(
            shares[0].properties["samplePackages"].as_array().unwrap().len(),
            2
        );
    }

    #[test]
    fn test_package_ids_are_shared_across_repositories() {
        let (entities, _) =
            package_relationships(&[repo("/a", &["axios"]), repo("/b", &["axios"])]);
        let merged = crate::graph::merge_entities(entities);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].metadata["declaredBy"].as_array().unwrap().len(), 2);
    }
}
