//! Graph entities and relationships.
//!
//! Entities are keyed by a stable id (see [`super::ids`]); relationships are
//! keyed by `(from, type, to)`. Both merge on duplicate keys so that batches
//! can be re-published idempotently.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::analysis::{DerivedQuery, Direction, Parameter, Span, UrlMatcher};

/// Stable entity identifier (hex SHA-256).
pub type EntityId = String;

/// Identity of a relationship.
pub type RelationshipKey = (EntityId, RelationshipType, EntityId);

/// Kind of an entity, without its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
pub enum EntityKind {
    Repository,
    File,
    Class,
    Function,
    Variable,
    #[serde(rename = "API")]
    Api,
    Package,
    DatabaseTable,
    DatabaseColumn,
    Config,
    Test,
    ErrorMessage,
    TypeDefinition,
    FrameworkRepository,
    SecurityComponent,
    Developer,
    Team,
    Commit,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Repository => "Repository",
            EntityKind::File => "File",
            EntityKind::Class => "Class",
            EntityKind::Function => "Function",
            EntityKind::Variable => "Variable",
            EntityKind::Api => "API",
            EntityKind::Package => "Package",
            EntityKind::DatabaseTable => "DatabaseTable",
            EntityKind::DatabaseColumn => "DatabaseColumn",
            EntityKind::Config => "Config",
            EntityKind::Test => "Test",
            EntityKind::ErrorMessage => "ErrorMessage",
            EntityKind::TypeDefinition => "TypeDefinition",
            EntityKind::FrameworkRepository => "FrameworkRepository",
            EntityKind::SecurityComponent => "SecurityComponent",
            EntityKind::Developer => "Developer",
            EntityKind::Team => "Team",
            EntityKind::Commit => "Commit",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Kind-specific entity payload.
///
/// Serialized inline with the entity, tagged by `kind`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "kind")]
pub enum EntityDetails {
    Repository,
    File {
        line_count: usize,
    },
    Class {
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        bases: Vec<String>,
    },
    Function {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        container: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        return_type: Option<String>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        parameters: Vec<Parameter>,
        #[serde(default)]
        is_async: bool,
    },
    Variable {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        value_type: Option<String>,
    },
    #[serde(rename = "API")]
    Api {
        method: String,
        /// Normalized path.
        path: String,
        /// First raw path or URL seen for this endpoint.
        raw: String,
        direction: Direction,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        framework: Option<String>,
    },
    Package {
        manager: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        version: Option<String>,
    },
    DatabaseTable,
    DatabaseColumn {
        table: String,
    },
    Config {
        key: String,
    },
    Test {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        framework: Option<String>,
    },
    ErrorMessage {
        message: String,
        line: usize,
        error_kind: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error_type: Option<String>,
    },
    TypeDefinition {
        type_kind: String,
    },
    FrameworkRepository {
        framework: String,
        base_interface: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        entity_type: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id_type: Option<String>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        derived_queries: Vec<DerivedQuery>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        derived_fields: Vec<String>,
    },
    SecurityComponent {
        framework: String,
        component_type: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        markers: Vec<String>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        url_matchers: Vec<UrlMatcher>,
    },
    Developer,
    Team,
    Commit,
}

impl EntityDetails {
    pub fn kind(&self) -> EntityKind {
        match self {
            EntityDetails::Repository => EntityKind::Repository,
            EntityDetails::File { .. } => EntityKind::File,
            EntityDetails::Class { .. } => EntityKind::Class,
            EntityDetails::Function { .. } => EntityKind::Function,
            EntityDetails::Variable { .. } => EntityKind::Variable,
            EntityDetails::Api { .. } => EntityKind::Api,
            EntityDetails::Package { .. } => EntityKind::Package,
            EntityDetails::DatabaseTable => EntityKind::DatabaseTable,
            EntityDetails::DatabaseColumn { .. } => EntityKind::DatabaseColumn,
            EntityDetails::Config { .. } => EntityKind::Config,
            EntityDetails::Test { .. } => EntityKind::Test,
            EntityDetails::ErrorMessage { .. } => EntityKind::ErrorMessage,
            EntityDetails::TypeDefinition { .. } => EntityKind::TypeDefinition,
            EntityDetails::FrameworkRepository { .. } => EntityKind::FrameworkRepository,
            EntityDetails::SecurityComponent { .. } => EntityKind::SecurityComponent,
            EntityDetails::Developer => EntityKind::Developer,
            EntityDetails::Team => EntityKind::Team,
            EntityDetails::Commit => EntityKind::Commit,
        }
    }

    /// Fill absent optional fields from `other` when both are the same kind.
    fn merge(&mut self, other: EntityDetails) {
        match (self, other) {
            (
                EntityDetails::Api { framework, .. },
                EntityDetails::Api {
                    framework: other, ..
                },
            ) => fill(framework, other),
            (
                EntityDetails::Function {
                    container,
                    return_type,
                    parameters,
                    ..
                },
                EntityDetails::Function {
                    container: c,
                    return_type: r,
                    parameters: p,
                    ..
                },
            ) => {
                fill(container, c);
                fill(return_type, r);
                if parameters.is_empty() {
                    *parameters = p;
                }
            }
            (
                EntityDetails::Package { version, .. },
                EntityDetails::Package { version: other, .. },
            ) => fill(version, other),
            (EntityDetails::Test { framework }, EntityDetails::Test { framework: other }) => {
                fill(framework, other)
            }
            _ => {}
        }
    }
}

fn fill<T>(slot: &mut Option<T>, value: Option<T>) {
    if slot.is_none() {
        *slot = value;
    }
}

/// A typed, stably identified node in the code graph.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Entity {
    pub id: EntityId,
    pub name: String,
    pub repo_root: String,
    /// Repository-relative file path; absent for repository-scoped entities.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub span: Option<Span>,
    #[serde(flatten)]
    pub details: EntityDetails,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, Value>,
}

impl Entity {
    pub fn new(
        id: EntityId,
        name: impl Into<String>,
        repo_root: impl Into<String>,
        details: EntityDetails,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            repo_root: repo_root.into(),
            file: None,
            language: None,
            span: None,
            details,
            metadata: BTreeMap::new(),
        }
    }

    pub fn kind(&self) -> EntityKind {
        self.details.kind()
    }

    pub fn with_file(mut self, file: impl Into<String>, language: Option<&str>) -> Self {
        self.file = Some(file.into());
        self.language = language.map(str::to_string);
        self
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = Some(span);
        self
    }

    pub fn with_metadata(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }

    /// Merge another entity with the same id into this one.
    ///
    /// The first non-null value wins per field. Metadata maps are unioned;
    /// when both sides hold an array under the same key the arrays are
    /// concatenated without duplicates.
    pub fn merge(&mut self, other: Entity) {
        fill(&mut self.file, other.file);
        fill(&mut self.language, other.language);
        fill(&mut self.span, other.span);
        self.details.merge(other.details);
        merge_metadata(&mut self.metadata, other.metadata);
    }
}

fn merge_metadata(target: &mut BTreeMap<String, Value>, source: BTreeMap<String, Value>) {
    for (key, value) in source {
        match target.get_mut(&key) {
            None => {
                target.insert(key, value);
            }
            Some(Value::Array(existing)) => {
                if let Value::Array(items) = value {
                    for item in items {
                        if !existing.contains(&item) {
                            existing.push(item);
                        }
                    }
                }
            }
            Some(Value::Null) => {
                target.insert(key, value);
            }
            Some(_) => {}
        }
    }
}

/// Closed vocabulary of relationship types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
pub enum RelationshipType {
    Contains,
    Declares,
    HasFunction,
    Calls,
    UsesApi,
    ProvidesApi,
    Queries,
    UsesConfig,
    EmitsError,
    RepoProvidesApi,
    RepoUsesApi,
    ConsumesApiFrom,
    RepoDependsOnPackage,
    SharesPackageWith,
    ManagesEntity,
    HasColumn,
    Secures,
}

impl RelationshipType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelationshipType::Contains => "Contains",
            RelationshipType::Declares => "Declares",
            RelationshipType::HasFunction => "HasFunction",
            RelationshipType::Calls => "Calls",
            RelationshipType::UsesApi => "UsesApi",
            RelationshipType::ProvidesApi => "ProvidesApi",
            RelationshipType::Queries => "Queries",
            RelationshipType::UsesConfig => "UsesConfig",
            RelationshipType::EmitsError => "EmitsError",
            RelationshipType::RepoProvidesApi => "RepoProvidesApi",
            RelationshipType::RepoUsesApi => "RepoUsesApi",
            RelationshipType::ConsumesApiFrom => "ConsumesApiFrom",
            RelationshipType::RepoDependsOnPackage => "RepoDependsOnPackage",
            RelationshipType::SharesPackageWith => "SharesPackageWith",
            RelationshipType::ManagesEntity => "ManagesEntity",
            RelationshipType::HasColumn => "HasColumn",
            RelationshipType::Secures => "Secures",
        }
    }
}

impl fmt::Display for RelationshipType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A typed, directed edge between two entity ids.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Relationship {
    pub from: EntityId,
    #[serde(rename = "type")]
    pub kind: RelationshipType,
    pub to: EntityId,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, Value>,
}

impl Relationship {
    pub fn new(from: impl Into<EntityId>, kind: RelationshipType, to: impl Into<EntityId>) -> Self {
        Self {
            from: from.into(),
            kind,
            to: to.into(),
            properties: BTreeMap::new(),
        }
    }

    pub fn with_property(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.properties.insert(key.to_string(), value.into());
        self
    }

    pub fn key(&self) -> RelationshipKey {
        (self.from.clone(), self.kind, self.to.clone())
    }

    pub fn property_f64(&self, key: &str) -> Option<f64> {
        self.properties.get(key).and_then(Value::as_f64)
    }
}

/// Merge entities sharing an id. Output is sorted by id.
pub fn merge_entities(entities: impl IntoIterator<Item = Entity>) -> Vec<Entity> {
    let mut merged: BTreeMap<EntityId, Entity> = BTreeMap::new();
    for entity in entities {
        match merged.get_mut(&entity.id) {
            Some(existing) => existing.merge(entity),
            None => {
                merged.insert(entity.id.clone(), entity);
            }
        }
    }
    merged.into_values().collect()
}

/// Deduplicate relationships by `(from, type, to)`.
///
/// The first occurrence keeps its properties; later duplicates only add
/// keys it does not have. Output is sorted by key.
pub fn dedup_relationships(
    relationships: impl IntoIterator<Item = Relationship>,
) -> Vec<Relationship> {
    let mut unique: BTreeMap<RelationshipKey, Relationship> = BTreeMap::new();
    for relationship in relationships {
        match unique.get_mut(&relationship.key()) {
            Some(existing) => {
                for (key, value) in relationship.properties {
                    existing.properties.entry(key).or_insert(value);
                }
            }
            None => {
                unique.insert(relationship.key(), relationship);
            }
        }
    }
    unique.into_values().collect()
}
