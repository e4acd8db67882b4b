//! Structural relationships within one repository.

use std::collections::{HashMap, HashSet};

use serde_json::json;
use tracing::{debug, warn};

use super::ids::{column_id, config_id, declaration_id, error_id, file_id, repository_id, table_id};
use super::normalize::normalize_path;
use super::synth::{api_entity_id, declaration_entity_id, repository_entity};
use super::{
    Entity, EntityDetails, EntityId, EntityKind, Relationship, RelationshipType,
    RepositoryAnalysis,
};
use crate::analysis::heuristics::to_snake_case;
use crate::analysis::{ant_match, Direction, Findings, RepositoryInterface};

/// Entities and relationships produced by linking one repository.
#[derive(Debug, Clone, Default)]
pub struct Linked {
    /// Repository entity plus tables and columns implied by data repositories.
    pub entities: Vec<Entity>,
    pub relationships: Vec<Relationship>,
}

/// Repository-wide lookups built before linking files.
struct RepoIndex<'a> {
    /// Function and method ids by simple name.
    functions: HashMap<&'a str, Vec<EntityId>>,
    /// Mapped table of each `@Entity` class, by class name.
    entity_tables: HashMap<&'a str, &'a str>,
    /// Provided API ids with their normalized paths.
    provided: Vec<(EntityId, String)>,
}

impl<'a> RepoIndex<'a> {
    fn build(repo: &'a RepositoryAnalysis) -> Self {
        let root = repo.repo_root.as_str();
        let mut functions: HashMap<&str, Vec<EntityId>> = HashMap::new();
        let mut entity_tables = HashMap::new();
        let mut provided = Vec::new();

        for file in &repo.files {
            let Some(findings) = &file.findings else {
                continue;
            };
            for decl in findings.callables() {
                functions
                    .entry(decl.name.as_str())
                    .or_default()
                    .push(declaration_entity_id(root, &file.path, decl));
            }
            for class in findings.classes() {
                let table = findings.tables.iter().find(|t| {
                    t.operation.as_deref() == Some("entity") && class.span.contains_line(t.line)
                });
                if let Some(table) = table {
                    entity_tables.insert(class.name.as_str(), table.table.as_str());
                }
            }
            for api in &findings.apis {
                if api.direction == Direction::Provided {
                    provided.push((api_entity_id(root, api), normalize_path(&api.target)));
                }
            }
        }

        Self {
            functions,
            entity_tables,
            provided,
        }
    }
}

/// Structural relationships of one repository.
///
/// Call resolution is by simple name across the whole repository: two
/// unrelated functions sharing a name both receive the `Calls` edge.
pub fn structural_relationships(repo: &RepositoryAnalysis) -> Linked {
    let root = repo.repo_root.as_str();
    let repo_id = repository_id(root);
    let index = RepoIndex::build(repo);
    let mut linked = Linked {
        entities: vec![repository_entity(root)],
        relationships: Vec::new(),
    };

    for file in &repo.files {
        let file_id = file_id(root, &file.path);
        linked.relationships.push(Relationship::new(
            repo_id.clone(),
            RelationshipType::Contains,
            file_id.clone(),
        ));
        let Some(findings) = &file.findings else {
            continue;
        };
        let mut ctx = FileLinker {
            root,
            path: &file.path,
            file_id,
            findings,
            index: &index,
            out: &mut linked,
        };
        ctx.declarations();
        ctx.calls();
        ctx.apis(&repo_id);
        ctx.data_access();
        ctx.errors_and_tests();
        ctx.framework_components();
    }

    linked
}

struct FileLinker<'a, 'o> {
    root: &'a str,
    path: &'a str,
    file_id: EntityId,
    findings: &'a Findings,
    index: &'a RepoIndex<'a>,
    out: &'o mut Linked,
}

impl FileLinker<'_, '_> {
    fn edge(&mut self, from: EntityId, kind: RelationshipType, to: EntityId) -> &mut Relationship {
        self.out.relationships.push(Relationship::new(from, kind, to));
        let last = self.out.relationships.len() - 1;
        &mut self.out.relationships[last]
    }

    /// Id of the innermost function enclosing `line`.
    fn caller(&self, line: usize) -> Option<EntityId> {
        self.findings
            .enclosing_callable(line)
            .map(|decl| declaration_entity_id(self.root, self.path, decl))
    }

    fn declarations(&mut self) {
        let findings = self.findings;
        for decl in &findings.declarations {
            let id = declaration_entity_id(self.root, self.path, decl);
            let kind = if decl.kind.is_type_definition() {
                RelationshipType::Contains
            } else {
                RelationshipType::Declares
            };
            self.edge(self.file_id.clone(), kind, id.clone());

            if !decl.kind.is_callable() {
                continue;
            }
            // every enclosing class, not only the declaring one
            let classes = findings
                .classes()
                .filter(|c| c.span.contains(&decl.span) && c.span != decl.span);
            for class in classes {
                let class_id = declaration_entity_id(self.root, self.path, class);
                self.edge(class_id, RelationshipType::HasFunction, id.clone());
            }
        }
    }

    fn calls(&mut self) {
        let (findings, index) = (self.findings, self.index);
        for call in &findings.calls {
            let Some(caller) = self.caller(call.line) else {
                continue;
            };
            let Some(targets) = index.functions.get(call.simple_name()) else {
                continue;
            };
            for target in targets {
                self.edge(caller.clone(), RelationshipType::Calls, target.clone())
                    .properties
                    .insert("line".to_string(), json!(call.line));
            }
        }
    }

    fn apis(&mut self, repo_id: &EntityId) {
        let findings = self.findings;
        for api in &findings.apis {
            let id = api_entity_id(self.root, api);
            self.edge(self.file_id.clone(), RelationshipType::Contains, id.clone());
            let (function_edge, repo_edge) = match api.direction {
                Direction::Provided => (
                    RelationshipType::ProvidesApi,
                    RelationshipType::RepoProvidesApi,
                ),
                Direction::Consumed => (RelationshipType::UsesApi, RelationshipType::RepoUsesApi),
            };
            self.edge(repo_id.clone(), repo_edge, id.clone());
            if let Some(caller) = self.caller(api.line) {
                self.edge(caller, function_edge, id)
                    .properties
                    .insert("line".to_string(), json!(api.line));
            }
        }
    }

    fn data_access(&mut self) {
        let findings = self.findings;
        for read in &findings.config_reads {
            let id = config_id(self.root, &read.key);
            self.edge(self.file_id.clone(), RelationshipType::Contains, id.clone());
            if let Some(caller) = self.caller(read.line) {
                self.edge(caller, RelationshipType::UsesConfig, id);
            }
        }

        for table in &findings.tables {
            if table.operation.as_deref() == Some("entity") {
                continue;
            }
            let Some(caller) = self.caller(table.line) else {
                continue;
            };
            let id = table_id(self.root, &table.table);
            let edge = self.edge(caller, RelationshipType::Queries, id);
            if let Some(operation) = &table.operation {
                edge.properties
                    .insert("operation".to_string(), json!(operation));
            }
        }

        for column in &findings.columns {
            self.edge(
                table_id(self.root, &column.table),
                RelationshipType::HasColumn,
                column_id(self.root, &column.table, &column.column),
            );
        }
    }

    fn errors_and_tests(&mut self) {
        let findings = self.findings;
        for error in &findings.errors {
            let id = error_id(self.root, self.path, &error.message, error.line);
            self.edge(self.file_id.clone(), RelationshipType::Contains, id.clone());
            if let Some(caller) = self.caller(error.line) {
                self.edge(caller, RelationshipType::EmitsError, id);
            }
        }

        for test in &findings.tests {
            let id = declaration_id(
                self.root,
                EntityKind::Test.as_str(),
                self.path,
                &test.name,
                test.span,
            );
            self.edge(self.file_id.clone(), RelationshipType::Contains, id);
        }
    }

    fn framework_components(&mut self) {
        let (findings, index) = (self.findings, self.index);
        for repository in &findings.repositories {
            let id = declaration_id(
                self.root,
                EntityKind::FrameworkRepository.as_str(),
                self.path,
                &repository.name,
                repository.span,
            );
            self.edge(self.file_id.clone(), RelationshipType::Contains, id.clone());
            self.managed_entity(&id, repository);
        }

        for component in &findings.security {
            let id = declaration_id(
                self.root,
                EntityKind::SecurityComponent.as_str(),
                self.path,
                &component.name,
                component.span,
            );
            self.edge(self.file_id.clone(), RelationshipType::Contains, id.clone());

            for matcher in &component.matchers {
                let secured = index
                    .provided
                    .iter()
                    .filter(|(_, path)| ant_match(&matcher.pattern, path));
                for (api, _) in secured {
                    let edge = self.edge(id.clone(), RelationshipType::Secures, api.clone());
                    edge.properties
                        .insert("pattern".to_string(), json!(matcher.pattern));
                    if let Some(access) = &matcher.access {
                        edge.properties.insert("access".to_string(), json!(access));
                    }
                }
            }
        }
    }

    /// Link a data repository to the table of its entity type.
    ///
    /// The table is the one mapped by the entity class when known in this
    /// repository, otherwise the snake_case entity name. Derived query
    /// fields become columns of that table.
    fn managed_entity(&mut self, repository_id: &EntityId, repository: &RepositoryInterface) {
        let Some(entity_type) = &repository.entity_type else {
            return;
        };
        let simple = entity_type.rsplit('.').next().unwrap_or(entity_type);
        let table = self
            .index
            .entity_tables
            .get(simple)
            .map(|t| t.to_string())
            .unwrap_or_else(|| to_snake_case(simple));
        let table_id = table_id(self.root, &table);

        self.out.entities.push(
            Entity::new(
                table_id.clone(),
                table.as_str(),
                self.root,
                EntityDetails::DatabaseTable,
            )
            .with_metadata("impliedBy", json!([repository.name])),
        );
        self.edge(repository_id.clone(), RelationshipType::ManagesEntity, table_id.clone())
            .properties
            .insert("entityType".to_string(), json!(entity_type));

        for field in repository.derived_fields() {
            let column = to_snake_case(&field);
            let column_id = column_id(self.root, &table, &column);
            self.out.entities.push(
                Entity::new(
                    column_id.clone(),
                    column.as_str(),
                    self.root,
                    EntityDetails::DatabaseColumn {
                        table: table.clone(),
                    },
                )
                .with_metadata("derivedFrom", json!([field])),
            );
            self.edge(table_id.clone(), RelationshipType::HasColumn, column_id);
        }
    }
}

/// Drop relationships with an endpoint outside `known`.
pub fn filter_dangling(
    relationships: Vec<Relationship>,
    known: &HashSet<&str>,
) -> Vec<Relationship> {
    let before = relationships.len();
    let kept: Vec<Relationship> = relationships
        .into_iter()
        .filter(|r| {
            let ok = known.contains(r.from.as_str()) && known.contains(r.to.as_str());
            if !ok {
                debug!(from = %r.from, kind = %r.kind, to = %r.to, "dropping dangling relationship");
            }
            ok
        })
        .collect();
    let dropped = before - kept.len();
    if dropped > 0 {
        warn!(dropped, "dropped relationships with unknown endpoints");
    }
    kept
}
