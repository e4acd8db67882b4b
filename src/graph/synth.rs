//! Entity synthesis from per-file findings.

use serde_json::{json, Value};

use super::ids::{
    api_id, column_id, config_id, declaration_id, error_id, file_id, repository_id, table_id,
};
use super::normalize::{normalize_method, normalize_path};
use super::{Entity, EntityDetails, EntityId, EntityKind, FileAnalysis};
use crate::analysis::{ApiCall, Declaration, DeclarationKind, Findings, Span};

/// Framework reported for security components.
const SECURITY_FRAMEWORK: &str = "spring-security";

/// Entity kind a declaration maps to.
fn declaration_kind(kind: DeclarationKind) -> EntityKind {
    if kind.is_callable() {
        EntityKind::Function
    } else if kind.is_class_like() {
        EntityKind::Class
    } else if kind.is_type_definition() {
        EntityKind::TypeDefinition
    } else {
        EntityKind::Variable
    }
}

pub fn declaration_entity_id(repo_root: &str, file: &str, decl: &Declaration) -> EntityId {
    declaration_id(
        repo_root,
        declaration_kind(decl.kind).as_str(),
        file,
        &decl.name,
        decl.span,
    )
}

pub fn api_entity_id(repo_root: &str, api: &ApiCall) -> EntityId {
    api_id(
        repo_root,
        api.direction,
        &normalize_method(api.method.as_deref()),
        &normalize_path(&api.target),
    )
}

pub(crate) fn repository_entity(repo_root: &str) -> Entity {
    Entity::new(
        repository_id(repo_root),
        repo_name(repo_root),
        repo_root,
        EntityDetails::Repository,
    )
}

fn repo_name(repo_root: &str) -> &str {
    repo_root
        .trim_end_matches(|c| c == '/' || c == '\\')
        .rsplit(|c| c == '/' || c == '\\')
        .next()
        .filter(|n| !n.is_empty())
        .unwrap_or(repo_root)
}

fn source(file: &str, line: usize) -> Value {
    json!([{ "file": file, "line": line }])
}

/// Table an `@Entity` class maps to, recorded on the class.
fn mapped_table<'f>(findings: &'f Findings, decl: &Declaration) -> Option<&'f str> {
    findings
        .tables
        .iter()
        .find(|t| t.operation.as_deref() == Some("entity") && decl.span.contains_line(t.line))
        .map(|t| t.table.as_str())
}

/// Entities for one file.
///
/// Always emits the File entity, even when the file has no findings.
/// Entities that share an id (same API from two call sites, same table
/// referenced twice) are left for [`super::merge_entities`].
pub fn synthesize_file(repo_root: &str, file: &FileAnalysis) -> Vec<Entity> {
    let path = file.path.as_str();
    let language = Some(file.language.as_str());
    let mut entities = Vec::new();

    let mut file_entity = Entity::new(
        file_id(repo_root, path),
        path,
        repo_root,
        EntityDetails::File {
            line_count: file.line_count,
        },
    )
    .with_file(path, language);
    if file.findings.is_none() {
        file_entity = file_entity.with_metadata("analyzed", false);
    }

    let Some(findings) = &file.findings else {
        entities.push(file_entity);
        return entities;
    };
    if let Some(framework) = &findings.test_framework {
        file_entity = file_entity.with_metadata("testFramework", framework.as_str());
    }
    if findings.walk.is_truncated() {
        file_entity = file_entity.with_metadata("truncated", true);
    }
    entities.push(file_entity);

    for decl in &findings.declarations {
        let details = match declaration_kind(decl.kind) {
            EntityKind::Function => EntityDetails::Function {
                container: decl.container.clone(),
                return_type: decl.return_type.clone(),
                parameters: decl.parameters.clone(),
                is_async: decl.is_async,
            },
            EntityKind::Class => EntityDetails::Class {
                bases: decl.bases.clone(),
            },
            EntityKind::TypeDefinition => EntityDetails::TypeDefinition {
                type_kind: decl.kind.as_str().to_string(),
            },
            _ => EntityDetails::Variable {
                value_type: decl.value_type.clone(),
            },
        };
        let mut entity = Entity::new(
            declaration_entity_id(repo_root, path, decl),
            decl.name.as_str(),
            repo_root,
            details,
        )
        .with_file(path, language)
        .with_span(decl.span)
        .with_metadata("declarationKind", decl.kind.as_str());
        if !decl.annotations.is_empty() {
            entity = entity.with_metadata("annotations", decl.annotations.clone());
        }
        if decl.kind.is_class_like() {
            if let Some(table) = mapped_table(findings, decl) {
                entity = entity.with_metadata("table", table);
            }
        }
        entities.push(entity);
    }

    for api in &findings.apis {
        let method = normalize_method(api.method.as_deref());
        let normalized = normalize_path(&api.target);
        entities.push(
            Entity::new(
                api_entity_id(repo_root, api),
                format!("{} {}", method, normalized),
                repo_root,
                EntityDetails::Api {
                    method,
                    path: normalized,
                    raw: api.target.clone(),
                    direction: api.direction,
                    framework: api.framework.clone(),
                },
            )
            .with_file(path, language)
            .with_span(Span::new(api.line, api.line))
            .with_metadata("sources", source(path, api.line)),
        );
    }

    for read in &findings.config_reads {
        entities.push(
            Entity::new(
                config_id(repo_root, &read.key),
                read.key.as_str(),
                repo_root,
                EntityDetails::Config {
                    key: read.key.clone(),
                },
            )
            .with_file(path, language)
            .with_metadata(
                "sources",
                json!([{ "file": path, "line": read.line, "via": read.source }]),
            ),
        );
    }

    for table in &findings.tables {
        let mut entity = Entity::new(
            table_id(repo_root, &table.table),
            table.table.as_str(),
            repo_root,
            EntityDetails::DatabaseTable,
        )
        .with_metadata("sources", source(path, table.line));
        if let Some(operation) = &table.operation {
            entity = entity.with_metadata("operations", json!([operation]));
        }
        entities.push(entity);
    }

    for column in &findings.columns {
        entities.push(
            Entity::new(
                table_id(repo_root, &column.table),
                column.table.as_str(),
                repo_root,
                EntityDetails::DatabaseTable,
            )
            .with_metadata("sources", source(path, column.line)),
        );
        entities.push(
            Entity::new(
                column_id(repo_root, &column.table, &column.column),
                column.column.as_str(),
                repo_root,
                EntityDetails::DatabaseColumn {
                    table: column.table.clone(),
                },
            )
            .with_file(path, language)
            .with_span(Span::new(column.line, column.line)),
        );
    }

    for error in &findings.errors {
        entities.push(
            Entity::new(
                error_id(repo_root, path, &error.message, error.line),
                error.message.as_str(),
                repo_root,
                EntityDetails::ErrorMessage {
                    message: error.message.clone(),
                    line: error.line,
                    error_kind: error.kind.as_str().to_string(),
                    error_type: error.error_type.clone(),
                },
            )
            .with_file(path, language)
            .with_span(Span::new(error.line, error.line)),
        );
    }

    for test in &findings.tests {
        entities.push(
            Entity::new(
                declaration_id(repo_root, EntityKind::Test.as_str(), path, &test.name, test.span),
                test.name.as_str(),
                repo_root,
                EntityDetails::Test {
                    framework: findings.test_framework.clone(),
                },
            )
            .with_file(path, language)
            .with_span(test.span),
        );
    }

    for repository in &findings.repositories {
        entities.push(
            Entity::new(
                declaration_id(
                    repo_root,
                    EntityKind::FrameworkRepository.as_str(),
                    path,
                    &repository.name,
                    repository.span,
                ),
                repository.name.as_str(),
                repo_root,
                EntityDetails::FrameworkRepository {
                    framework: repository.framework.to_string(),
                    base_interface: repository.base_interface.clone(),
                    entity_type: repository.entity_type.clone(),
                    id_type: repository.id_type.clone(),
                    derived_queries: repository.derived_queries.clone(),
                    derived_fields: repository.derived_fields(),
                },
            )
            .with_file(path, language)
            .with_span(repository.span),
        );
    }

    for component in &findings.security {
        entities.push(
            Entity::new(
                declaration_id(
                    repo_root,
                    EntityKind::SecurityComponent.as_str(),
                    path,
                    &component.name,
                    component.span,
                ),
                component.name.as_str(),
                repo_root,
                EntityDetails::SecurityComponent {
                    framework: SECURITY_FRAMEWORK.to_string(),
                    component_type: component.component_type.to_string(),
                    markers: component.markers.clone(),
                    url_matchers: component.matchers.clone(),
                },
            )
            .with_file(path, language)
            .with_span(component.span),
        );
    }

    entities
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{ConfigRead, Direction, Language, TableRef};

    fn analysis(findings: Option<Findings>) -> FileAnalysis {
        FileAnalysis {
            path: "src/app.js".to_string(),
            language: Language::JavaScript,
            line_count: 40,
            findings,
        }
    }

    #[test]
    fn test_file_entity_without_findings() {
        let entities = synthesize_file("/repo", &analysis(None));
        assert_eq!(entities.len(), 1);
        assert_eq!(entities[0].kind(), EntityKind::File);
        assert_eq!(entities[0].metadata["analyzed"], json!(false));
    }

    #[test]
    fn test_declarations_and_apis() {
        let mut findings = Findings::empty("src/app.js", "javascript");
        let mut decl = Declaration::new("listUsers", DeclarationKind::Function, Span::new(3, 9));
        decl.return_type = Some("Promise".to_string());
        findings.declarations.push(decl);
        findings.declarations.push(Declaration::new(
            "UserService",
            DeclarationKind::Class,
            Span::new(10, 30),
        ));
        findings.declarations.push(Declaration::new(
            "Props",
            DeclarationKind::Interface,
            Span::new(31, 33),
        ));
        findings.apis.push(ApiCall {
            method: None,
            target: "https://api.example.com/users?page=1".to_string(),
            direction: Direction::Consumed,
            line: 5,
            framework: Some("axios".to_string()),
        });

        let entities = synthesize_file("/repo", &analysis(Some(findings)));
        let kinds: Vec<EntityKind> = entities.iter().map(Entity::kind).collect();
        assert_eq!(
            kinds,
            vec![
                EntityKind::File,
                EntityKind::Function,
                EntityKind::Class,
                EntityKind::TypeDefinition,
                EntityKind::Api
            ]
        );
        let api = entities.last().unwrap();
        assert_eq!(api.name, "GET /users");
        match &api.details {
            EntityDetails::Api { method, path, raw, .. } => {
                assert_eq!(method, "GET");
                assert_eq!(path, "/users");
                assert_eq!(raw, "https://api.example.com/users?page=1");
            }
            other => panic!("unexpected details {:?}", other),
        }
    }

    #[test]
    fn test_same_api_twice_shares_id() {
        let mut findings = Findings::empty("src/app.js", "javascript");
        for line in [3, 8] {
            findings.apis.push(ApiCall {
                method: Some("GET".to_string()),
                target: "/users/".to_string(),
                direction: Direction::Provided,
                line,
                framework: None,
            });
        }
        let entities = synthesize_file("/repo", &analysis(Some(findings)));
        let merged = crate::graph::merge_entities(entities);
        let apis: Vec<&Entity> = merged.iter().filter(|e| e.kind() == EntityKind::Api).collect();
        assert_eq!(apis.len(), 1);
        assert_eq!(apis[0].metadata["sources"].as_array().unwrap().len(), 2);
        assert_eq!(apis[0].span, Some(Span::new(3, 3)));
    }

    #[test]
    fn test_entity_class_records_table() {
        let mut findings = Findings::empty("User.java", "java");
        findings.declarations.push(Declaration::new(
            "User",
            DeclarationKind::Class,
            Span::new(1, 20),
        ));
        findings.tables.push(TableRef {
            table: "app_users".to_string(),
            line: 1,
            operation: Some("entity".to_string()),
        });
        findings.config_reads.push(ConfigRead {
            key: "db.url".to_string(),
            line: 4,
            source: "property",
        });
        let file = FileAnalysis {
            path: "User.java".to_string(),
            language: Language::Java,
            line_count: 20,
            findings: Some(findings),
        };
        let entities = synthesize_file("/repo", &file);
        let class = entities.iter().find(|e| e.kind() == EntityKind::Class).unwrap();
        assert_eq!(class.metadata["table"], json!("app_users"));
        assert!(entities.iter().any(|e| e.kind() == EntityKind::DatabaseTable));
        assert!(entities.iter().any(|e| e.kind() == EntityKind::Config));
    }

    #[test]
    fn test_repo_name() {
        assert_eq!(repo_name("/work/orders-service"), "orders-service");
        assert_eq!(repo_name("/work/orders-service/"), "orders-service");
        assert_eq!(repo_name("orders"), "orders");
    }
}
