//! Findings extracted from a single file by a language analyzer.
//!
//! Findings are transient: the entity synthesizer turns them into graph
//! entities and the relationship builder reads their lines and call sites.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::syntax::WalkStats;

/// Line span of a declaration (1-indexed, inclusive).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Deserialize, Serialize,
)]
pub struct Span {
    pub start_line: usize,
    pub end_line: usize,
}

impl Span {
    pub fn new(start_line: usize, end_line: usize) -> Self {
        Self {
            start_line,
            end_line: end_line.max(start_line),
        }
    }

    /// Create a span from a tree-sitter node.
    pub fn from_node(node: tree_sitter::Node) -> Self {
        // tree-sitter rows are 0-indexed
        Self::new(node.start_position().row + 1, node.end_position().row + 1)
    }

    /// Whether `other` lies fully inside this span.
    pub fn contains(&self, other: &Span) -> bool {
        self.start_line <= other.start_line && other.end_line <= self.end_line
    }

    pub fn contains_line(&self, line: usize) -> bool {
        self.start_line <= line && line <= self.end_line
    }

    /// Number of lines covered.
    pub fn line_count(&self) -> usize {
        self.end_line - self.start_line + 1
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start_line, self.end_line)
    }
}

/// Kind of declaration found in source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DeclarationKind {
    Function,
    Method,
    Class,
    Struct,
    Record,
    Interface,
    Enum,
    TypeAlias,
    Variable,
}

impl DeclarationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeclarationKind::Function => "function",
            DeclarationKind::Method => "method",
            DeclarationKind::Class => "class",
            DeclarationKind::Struct => "struct",
            DeclarationKind::Record => "record",
            DeclarationKind::Interface => "interface",
            DeclarationKind::Enum => "enum",
            DeclarationKind::TypeAlias => "type_alias",
            DeclarationKind::Variable => "variable",
        }
    }

    /// Check if this is a callable (function or method).
    pub fn is_callable(&self) -> bool {
        matches!(self, DeclarationKind::Function | DeclarationKind::Method)
    }

    /// Declarations that become Class entities and can own methods.
    pub fn is_class_like(&self) -> bool {
        matches!(
            self,
            DeclarationKind::Class | DeclarationKind::Struct | DeclarationKind::Record
        )
    }

    /// Declarations that become TypeDefinition entities.
    pub fn is_type_definition(&self) -> bool {
        matches!(
            self,
            DeclarationKind::Interface | DeclarationKind::Enum | DeclarationKind::TypeAlias
        )
    }
}

impl fmt::Display for DeclarationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A function parameter.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Parameter {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub type_name: Option<String>,
}

/// A declaration extracted from source code.
#[derive(Debug, Clone, PartialEq)]
pub struct Declaration {
    pub name: String,
    pub kind: DeclarationKind,
    pub span: Span,
    /// Innermost class-like declaration whose span contains this one.
    pub container: Option<String>,
    /// Base classes and implemented interfaces, as written.
    pub bases: Vec<String>,
    pub return_type: Option<String>,
    pub parameters: Vec<Parameter>,
    /// Declared type of a variable.
    pub value_type: Option<String>,
    /// Annotation, attribute or decorator names without the sigil.
    pub annotations: Vec<String>,
    pub is_async: bool,
}

impl Declaration {
    pub fn new(name: impl Into<String>, kind: DeclarationKind, span: Span) -> Self {
        Self {
            name: name.into(),
            kind,
            span,
            container: None,
            bases: Vec::new(),
            return_type: None,
            parameters: Vec::new(),
            value_type: None,
            annotations: Vec::new(),
            is_async: false,
        }
    }

    /// Name qualified by the containing class, if any.
    pub fn qualified_name(&self) -> String {
        match &self.container {
            Some(container) => format!("{}.{}", container, self.name),
            None => self.name.clone(),
        }
    }
}

/// Literal callee text of a call expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallSite {
    pub callee: String,
    pub line: usize,
}

impl CallSite {
    /// Final segment of the callee, e.g. `save` for `this.repo.save`.
    pub fn simple_name(&self) -> &str {
        simple_name(&self.callee)
    }
}

/// Final identifier segment of a member chain.
pub fn simple_name(callee: &str) -> &str {
    let trimmed = callee.trim();
    let trimmed = trimmed.strip_prefix("new ").unwrap_or(trimmed).trim();
    let trimmed = trimmed.split('<').next().unwrap_or(trimmed);
    let start = trimmed
        .rfind(|c: char| c == '.' || c == ':' || c == '>' || c == '?')
        .map(|i| i + 1)
        .unwrap_or(0);
    trimmed[start..].trim()
}

/// Whether an API call site serves or calls an endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Provided,
    Consumed,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Provided => "provided",
            Direction::Consumed => "consumed",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A classified API call site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiCall {
    /// Upper-case HTTP method when known.
    pub method: Option<String>,
    /// Path (provided) or URL (consumed) with template placeholders stripped.
    pub target: String,
    pub direction: Direction,
    pub line: usize,
    /// Library or framework that produced the call site, e.g. `express`.
    pub framework: Option<String>,
}

/// A configuration key read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigRead {
    pub key: String,
    pub line: usize,
    /// `env` for environment variables, `property` for application properties.
    pub source: &'static str,
}

/// A database table reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRef {
    pub table: String,
    pub line: usize,
    /// SQL verb or `entity` for mapped classes.
    pub operation: Option<String>,
}

/// A database column reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnRef {
    pub table: String,
    pub column: String,
    pub line: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Thrown,
    Logged,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Thrown => "thrown",
            ErrorKind::Logged => "logged",
        }
    }
}

/// An error message raised or logged at error level.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorEmission {
    pub message: String,
    pub line: usize,
    pub kind: ErrorKind,
    /// Exception type for thrown errors.
    pub error_type: Option<String>,
}

/// A test case declared in source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestCase {
    pub name: String,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Import {
    pub source: String,
    pub line: usize,
}

/// A derived query method on a framework repository.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct DerivedQuery {
    pub method: String,
    pub fields: Vec<String>,
}

/// An interface extending a known ORM repository base.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryInterface {
    pub name: String,
    pub span: Span,
    pub framework: &'static str,
    pub base_interface: String,
    pub entity_type: Option<String>,
    pub id_type: Option<String>,
    pub derived_queries: Vec<DerivedQuery>,
}

impl RepositoryInterface {
    /// All fields referenced by derived queries, deduplicated in first-seen order.
    pub fn derived_fields(&self) -> Vec<String> {
        let mut fields: Vec<String> = Vec::new();
        for query in &self.derived_queries {
            for field in &query.fields {
                if !fields.contains(field) {
                    fields.push(field.clone());
                }
            }
        }
        fields
    }
}

/// A URL matcher configured on a security component.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct UrlMatcher {
    pub pattern: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access: Option<String>,
    pub line: usize,
}

/// A class acting as a security component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecurityComponent {
    pub name: String,
    pub span: Span,
    pub component_type: &'static str,
    /// Annotations and supertypes that identified the component.
    pub markers: Vec<String>,
    pub matchers: Vec<UrlMatcher>,
}

/// Everything an analyzer found in one file.
#[derive(Debug, Clone, Default)]
pub struct Findings {
    pub path: String,
    pub language: String,
    pub declarations: Vec<Declaration>,
    pub calls: Vec<CallSite>,
    pub apis: Vec<ApiCall>,
    pub config_reads: Vec<ConfigRead>,
    pub tables: Vec<TableRef>,
    pub columns: Vec<ColumnRef>,
    pub errors: Vec<ErrorEmission>,
    pub tests: Vec<TestCase>,
    pub imports: Vec<Import>,
    pub test_framework: Option<String>,
    pub repositories: Vec<RepositoryInterface>,
    pub security: Vec<SecurityComponent>,
    pub walk: WalkStats,
}

impl Findings {
    /// Create empty findings for a file.
    pub fn empty(path: &str, language: &str) -> Self {
        Self {
            path: path.to_string(),
            language: language.to_string(),
            ..Self::default()
        }
    }

    /// Get all functions and methods.
    pub fn callables(&self) -> impl Iterator<Item = &Declaration> {
        self.declarations.iter().filter(|d| d.kind.is_callable())
    }

    /// Get all class-like declarations.
    pub fn classes(&self) -> impl Iterator<Item = &Declaration> {
        self.declarations.iter().filter(|d| d.kind.is_class_like())
    }

    /// Find a declaration by name.
    pub fn find_declaration(&self, name: &str) -> Option<&Declaration> {
        self.declarations.iter().find(|d| d.name == name)
    }

    /// Innermost function or method whose span contains `line`.
    ///
    /// Ties on span length go to the later start, then the name.
    pub fn enclosing_callable(&self, line: usize) -> Option<&Declaration> {
        self.callables()
            .filter(|d| d.span.contains_line(line))
            .min_by(|a, b| {
                a.span
                    .line_count()
                    .cmp(&b.span.line_count())
                    .then(b.span.start_line.cmp(&a.span.start_line))
                    .then(a.name.cmp(&b.name))
            })
    }

    /// Sort and deduplicate collected items and resolve class containment.
    ///
    /// Analyzers call this once after their walk.
    pub fn finalize(&mut self) {
        self.declarations.sort_by(|a, b| {
            (a.span.start_line, a.span.end_line, a.kind, &a.name).cmp(&(
                b.span.start_line,
                b.span.end_line,
                b.kind,
                &b.name,
            ))
        });
        self.declarations
            .dedup_by(|a, b| a.kind == b.kind && a.name == b.name && a.span == b.span);
        self.assign_containers();

        self.calls.sort_by(|a, b| (a.line, &a.callee).cmp(&(b.line, &b.callee)));
        self.calls.dedup();
        self.apis.sort_by(|a, b| {
            (a.line, a.direction, &a.method, &a.target).cmp(&(
                b.line,
                b.direction,
                &b.method,
                &b.target,
            ))
        });
        self.apis.dedup();
        self.config_reads
            .sort_by(|a, b| (a.line, &a.key).cmp(&(b.line, &b.key)));
        self.config_reads.dedup();
        self.tables
            .sort_by(|a, b| (a.line, &a.table).cmp(&(b.line, &b.table)));
        self.tables.dedup();
        self.columns.sort_by(|a, b| {
            (a.line, &a.table, &a.column).cmp(&(b.line, &b.table, &b.column))
        });
        self.columns.dedup();
        self.errors
            .sort_by(|a, b| (a.line, &a.message).cmp(&(b.line, &b.message)));
        self.errors.dedup();
        self.tests
            .sort_by(|a, b| (a.span, &a.name).cmp(&(b.span, &b.name)));
        self.tests.dedup();
        self.imports
            .sort_by(|a, b| (a.line, &a.source).cmp(&(b.line, &b.source)));
        self.imports.dedup();
    }

    fn assign_containers(&mut self) {
        let classes: Vec<(String, Span)> = self
            .classes()
            .map(|d| (d.name.clone(), d.span))
            .collect();

        for decl in &mut self.declarations {
            let container = classes
                .iter()
                .filter(|(name, span)| {
                    span.contains(&decl.span) && !(span == &decl.span && name == &decl.name)
                })
                .min_by_key(|(_, span)| span.line_count())
                .map(|(name, _)| name.clone());
            decl.container = container;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn function(name: &str, start: usize, end: usize) -> Declaration {
        Declaration::new(name, DeclarationKind::Function, Span::new(start, end))
    }

    #[test]
    fn test_span_contains() {
        let outer = Span::new(10, 20);
        assert!(outer.contains(&Span::new(10, 20)));
        assert!(outer.contains(&Span::new(12, 15)));
        assert!(!outer.contains(&Span::new(9, 15)));
        assert!(outer.contains_line(20));
        assert!(!outer.contains_line(21));
        assert_eq!(outer.line_count(), 11);
    }

    #[test]
    fn test_simple_name() {
        assert_eq!(simple_name("foo"), "foo");
        assert_eq!(simple_name("this.repo.save"), "save");
        assert_eq!(simple_name("Foo::bar"), "bar");
        assert_eq!(simple_name("obj?.load"), "load");
        assert_eq!(simple_name("$obj->run"), "run");
        assert_eq!(simple_name("new Service"), "Service");
        assert_eq!(simple_name("List.of<String>"), "of");
    }

    #[test]
    fn test_enclosing_callable_prefers_innermost() {
        let mut findings = Findings::empty("a.js", "javascript");
        findings.declarations.push(function("outer", 1, 30));
        findings.declarations.push(function("inner", 10, 20));
        findings.finalize();

        assert_eq!(findings.enclosing_callable(15).unwrap().name, "inner");
        assert_eq!(findings.enclosing_callable(25).unwrap().name, "outer");
        assert!(findings.enclosing_callable(31).is_none());
    }

    #[test]
    fn test_finalize_assigns_containers_by_span() {
        let mut findings = Findings::empty("a.py", "python");
        findings.declarations.push(Declaration::new(
            "Outer",
            DeclarationKind::Class,
            Span::new(1, 40),
        ));
        findings.declarations.push(Declaration::new(
            "Inner",
            DeclarationKind::Class,
            Span::new(5, 20),
        ));
        findings.declarations.push(function("run", 6, 10));
        findings.declarations.push(function("stop", 25, 30));
        findings.declarations.push(function("free", 50, 55));
        findings.finalize();

        let container = |name: &str| findings.find_declaration(name).unwrap().container.clone();
        assert_eq!(container("run"), Some("Inner".to_string()));
        assert_eq!(container("stop"), Some("Outer".to_string()));
        assert_eq!(container("free"), None);
        assert_eq!(container("Inner"), Some("Outer".to_string()));
        assert_eq!(container("Outer"), None);
        assert_eq!(
            findings.find_declaration("run").unwrap().qualified_name(),
            "Inner.run"
        );
    }

    #[test]
    fn test_finalize_dedupes_declarations() {
        let mut findings = Findings::empty("a.ts", "typescript");
        findings.declarations.push(function("dup", 1, 3));
        findings.declarations.push(function("dup", 1, 3));
        findings.finalize();
        assert_eq!(findings.declarations.len(), 1);
    }
}
