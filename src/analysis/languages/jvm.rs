//! Java language analyzer using tree-sitter.
//!
//! Besides declarations and call sites this recognizes the annotation-driven
//! frameworks common in JVM services: Spring MVC and JAX-RS routes, JPA
//! entities, Spring Data repositories and Spring Security configuration.

use std::path::Path;

use lazy_static::lazy_static;
use regex::Regex;
use tracing::debug;
use tree_sitter::{Language, Node};

use super::common::{
    ancestor, field_text, first_string_argument, join_route, named_children, record_sql_tables,
    split_bases, string_value, type_text,
};
use super::spring::{
    derive_query_fields, generic_parts, is_access_rule, repository_framework,
    security_component_type, MATCHER_CALLS,
};
use crate::analysis::classify::{
    has_server_context, http_method, reconcile_directions, resolve_candidates, ApiCandidate,
};
use crate::analysis::heuristics::{detect_test_framework, to_snake_case, unquote};
use crate::analysis::{
    parse_with, AnalysisOptions, ApiCall, CallSite, ColumnRef, ConfigRead, Declaration,
    DeclarationKind, DerivedQuery, Direction, ErrorEmission, ErrorKind, Findings, Import,
    LanguageAnalyzer, Parameter, ParsedFile, RepositoryInterface, SecurityComponent, Span,
    TableRef, TestCase, UrlMatcher,
};
use crate::syntax::{self, Visit};

const STRING_KINDS: &[&str] = &["string_literal", "text_block"];

const TYPE_KINDS: &[&str] = &[
    "class_declaration",
    "interface_declaration",
    "enum_declaration",
    "record_declaration",
];

const TEST_ANNOTATIONS: &[&str] = &["Test", "ParameterizedTest", "RepeatedTest", "TestFactory"];

const LOGGER_NAMES: &[&str] = &["log", "logger", "LOG", "LOGGER", "Log"];

/// Spring mapping annotations and their fixed HTTP method.
const SPRING_MAPPINGS: &[(&str, &str)] = &[
    ("GetMapping", "GET"),
    ("PostMapping", "POST"),
    ("PutMapping", "PUT"),
    ("DeleteMapping", "DELETE"),
    ("PatchMapping", "PATCH"),
];

const JAX_RS_METHODS: &[&str] = &["GET", "POST", "PUT", "DELETE", "PATCH"];

/// RestTemplate convenience methods and the HTTP method each one issues.
const REST_TEMPLATE_METHODS: &[(&str, &str)] = &[
    ("getForObject", "get"),
    ("getForEntity", "get"),
    ("postForObject", "post"),
    ("postForEntity", "post"),
    ("postForLocation", "post"),
    ("patchForObject", "patch"),
];

lazy_static! {
    static ref REQUEST_METHOD: Regex = Regex::new(r"RequestMethod\.([A-Z]+)").unwrap();
    static ref HTTP_METHOD_ARG: Regex = Regex::new(r"HttpMethod\.([A-Z]+)").unwrap();
    static ref PROPERTY_PLACEHOLDER: Regex = Regex::new(r"\$\{([^}:]+)").unwrap();
}

pub struct JvmAnalyzer {
    language: Language,
}

impl JvmAnalyzer {
    pub fn new() -> Self {
        Self {
            language: tree_sitter_java::LANGUAGE.into(),
        }
    }
}

impl Default for JvmAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl LanguageAnalyzer for JvmAnalyzer {
    fn language_id(&self) -> &'static str {
        "java"
    }

    fn file_extensions(&self) -> &'static [&'static str] {
        &["java"]
    }

    fn parse(&self, path: &Path, source: &[u8]) -> anyhow::Result<ParsedFile> {
        parse_with(&self.language, path, source)
    }

    fn extract_findings(
        &self,
        parsed: &ParsedFile,
        options: &AnalysisOptions,
    ) -> anyhow::Result<Findings> {
        let mut collector = Collector {
            parsed,
            findings: Findings::empty(&parsed.path, self.language_id()),
            candidates: Vec::new(),
            matchers: Vec::new(),
        };
        let stats = syntax::walk(parsed.tree.root_node(), &options.limits, |node, _| {
            collector.visit(node)
        });

        let Collector {
            mut findings,
            candidates,
            matchers,
            ..
        } = collector;
        findings.walk = stats;
        attach_matchers(&mut findings, matchers);

        let server_context =
            has_server_context(&findings.imports, parsed.source_str(), &options.aliases);
        let framework = options.aliases.server_framework(&findings.imports);
        findings.apis.extend(resolve_candidates(
            &candidates,
            server_context,
            framework.as_deref(),
            &options.aliases,
        ));
        reconcile_directions(&mut findings);
        findings.test_framework = detect_test_framework(parsed.source_str(), self.language_id());
        findings.finalize();

        Ok(findings)
    }
}

/// Give each URL matcher to the innermost security component around it.
fn attach_matchers(findings: &mut Findings, mut matchers: Vec<UrlMatcher>) {
    matchers.sort_by(|a, b| (a.line, &a.pattern).cmp(&(b.line, &b.pattern)));
    for matcher in matchers {
        let owner = findings
            .security
            .iter_mut()
            .filter(|c| c.span.contains_line(matcher.line))
            .min_by_key(|c| c.span.line_count());
        match owner {
            Some(component) => component.matchers.push(matcher),
            None => debug!(
                pattern = %matcher.pattern,
                line = matcher.line,
                "URL matcher outside a security component"
            ),
        }
    }
}

/// An annotation on a declaration.
struct Annotation<'t> {
    name: String,
    node: Node<'t>,
}

struct Collector<'a> {
    parsed: &'a ParsedFile,
    findings: Findings,
    candidates: Vec<ApiCandidate>,
    matchers: Vec<UrlMatcher>,
}

impl<'a> Collector<'a> {
    fn text(&self, node: Node) -> &'a str {
        self.parsed.node_text(node)
    }

    fn visit(&mut self, node: Node) -> Visit {
        if !node.is_named() {
            return Visit::Continue;
        }
        match node.kind() {
            "class_declaration" => self.type_declaration(node, DeclarationKind::Class),
            "enum_declaration" => self.type_declaration(node, DeclarationKind::Enum),
            "record_declaration" => self.type_declaration(node, DeclarationKind::Record),
            "interface_declaration" => self.interface(node),
            "method_declaration" | "constructor_declaration" => self.method(node),
            "field_declaration" => self.variables(node, true),
            "local_variable_declaration" => self.variables(node, false),
            "method_invocation" => self.invocation(node),
            "throw_statement" => self.throw(node),
            "annotation" => self.value_annotation(node),
            "import_declaration" => {
                let path = named_children(node)
                    .into_iter()
                    .find(|c| matches!(c.kind(), "scoped_identifier" | "identifier"));
                if let Some(path) = path {
                    self.findings.imports.push(Import {
                        source: self.text(path).to_string(),
                        line: syntax::start_line(node),
                    });
                }
            }
            "string_literal" | "text_block" => {
                let line = syntax::start_line(node);
                let text = unquote(self.text(node));
                record_sql_tables(&mut self.findings, &text, line);
                return Visit::SkipChildren;
            }
            _ => {}
        }
        Visit::Continue
    }

    fn annotations<'t>(&self, decl: Node<'t>) -> Vec<Annotation<'t>> {
        named_children(decl)
            .into_iter()
            .filter(|c| c.kind() == "modifiers")
            .flat_map(named_children)
            .filter(|c| matches!(c.kind(), "annotation" | "marker_annotation"))
            .filter_map(|node| {
                let name = field_text(node, "name", self.parsed)?;
                let simple = name.rsplit('.').next().unwrap_or(&name).to_string();
                Some(Annotation { name: simple, node })
            })
            .collect()
    }

    /// Argument `key` of an annotation; `value` also matches a positional argument.
    fn annotation_value<'t>(&self, annotation: Node<'t>, key: &str) -> Option<Node<'t>> {
        let args = annotation.child_by_field_name("arguments")?;
        named_children(args).into_iter().find_map(|arg| {
            if arg.kind() == "element_value_pair" {
                let matches = field_text(arg, "key", self.parsed).as_deref() == Some(key);
                return if matches {
                    arg.child_by_field_name("value")
                } else {
                    None
                };
            }
            (key == "value").then_some(arg)
        })
    }

    fn annotation_strings(&self, value: Node) -> Vec<String> {
        if value.kind() == "element_value_array_initializer" {
            return named_children(value)
                .into_iter()
                .filter_map(|item| string_value(item, self.parsed, STRING_KINDS))
                .collect();
        }
        string_value(value, self.parsed, STRING_KINDS)
            .into_iter()
            .collect()
    }

    /// Route path of a mapping annotation (`value` or `path`).
    fn annotation_path(&self, annotation: Node) -> Option<String> {
        ["value", "path"]
            .iter()
            .filter_map(|key| self.annotation_value(annotation, key))
            .flat_map(|value| self.annotation_strings(value))
            .next()
    }

    fn bases(&self, node: Node) -> Vec<String> {
        let mut bases = Vec::new();
        for field in ["superclass", "interfaces"] {
            if let Some(clause) = node.child_by_field_name(field) {
                bases.extend(split_bases(self.text(clause)));
            }
        }
        for clause in named_children(node)
            .into_iter()
            .filter(|c| c.kind() == "extends_interfaces")
        {
            bases.extend(split_bases(self.text(clause)));
        }
        bases
    }

    fn type_declaration(&mut self, node: Node, kind: DeclarationKind) {
        let Some(name) = field_text(node, "name", self.parsed) else {
            return;
        };
        let span = Span::from_node(node);
        let annotations: Vec<String> = self
            .annotations(node)
            .into_iter()
            .map(|a| a.name)
            .collect();
        let bases = self.bases(node);

        if let Some((component_type, markers)) =
            security_component_type(&name, &annotations, &bases)
        {
            self.findings.security.push(SecurityComponent {
                name: name.clone(),
                span,
                component_type,
                markers,
                matchers: Vec::new(),
            });
        }
        if let Some(table) = self.entity_table(node) {
            self.findings.tables.push(TableRef {
                table,
                line: span.start_line,
                operation: Some("entity".to_string()),
            });
        }

        let mut decl = Declaration::new(name, kind, span);
        decl.bases = bases;
        decl.annotations = annotations;
        self.findings.declarations.push(decl);
    }

    /// Table mapped by a JPA `@Entity` class.
    fn entity_table(&self, class: Node) -> Option<String> {
        let annotations = self.annotations(class);
        if !annotations.iter().any(|a| a.name == "Entity") {
            return None;
        }
        let explicit = annotations
            .iter()
            .find(|a| a.name == "Table")
            .and_then(|a| self.annotation_value(a.node, "name"))
            .and_then(|v| string_value(v, self.parsed, STRING_KINDS))
            .filter(|t| !t.is_empty());
        explicit.or_else(|| field_text(class, "name", self.parsed).map(|n| to_snake_case(&n)))
    }

    fn interface(&mut self, node: Node) {
        let Some(name) = field_text(node, "name", self.parsed) else {
            return;
        };
        let span = Span::from_node(node);
        let bases = self.bases(node);
        let annotations: Vec<String> = self
            .annotations(node)
            .into_iter()
            .map(|a| a.name)
            .collect();

        let extended: Vec<String> = named_children(node)
            .into_iter()
            .filter(|c| c.kind() == "extends_interfaces")
            .flat_map(named_children)
            .filter(|c| c.kind() == "type_list")
            .flat_map(named_children)
            .map(|t| self.text(t).to_string())
            .collect();

        let repository = extended
            .iter()
            .find_map(|base| repository_framework(base).map(|framework| (base, framework)));
        if let Some((base, framework)) = repository {
            let (base_name, args) = generic_parts(base);
            let derived_queries = self.derived_queries(node);
            let simple = |t: &String| t.rsplit('.').next().unwrap_or(t).to_string();
            self.findings.repositories.push(RepositoryInterface {
                name: name.clone(),
                span,
                framework,
                base_interface: simple(&base_name),
                entity_type: args.first().map(simple),
                id_type: args.get(1).map(simple),
                derived_queries,
            });
        }

        let mut decl = Declaration::new(name, DeclarationKind::Interface, span);
        decl.bases = bases;
        decl.annotations = annotations;
        self.findings.declarations.push(decl);
    }

    fn derived_queries(&self, interface: Node) -> Vec<DerivedQuery> {
        let Some(body) = interface.child_by_field_name("body") else {
            return Vec::new();
        };
        named_children(body)
            .into_iter()
            .filter(|m| m.kind() == "method_declaration")
            .filter_map(|m| field_text(m, "name", self.parsed))
            .filter_map(|method| {
                let fields = derive_query_fields(&method);
                (!fields.is_empty()).then_some(DerivedQuery { method, fields })
            })
            .collect()
    }

    fn method(&mut self, node: Node) {
        let Some(name) = field_text(node, "name", self.parsed) else {
            return;
        };
        let span = Span::from_node(node);
        let annotations = self.annotations(node);

        if annotations
            .iter()
            .any(|a| TEST_ANNOTATIONS.contains(&a.name.as_str()))
        {
            self.findings.tests.push(TestCase {
                name: name.clone(),
                span,
            });
        }
        self.routes(node, &annotations);

        let mut decl = Declaration::new(name, DeclarationKind::Method, span);
        decl.return_type = node
            .child_by_field_name("type")
            .and_then(|t| type_text(t, self.parsed));
        decl.parameters = self.parameters(node);
        decl.annotations = annotations.into_iter().map(|a| a.name).collect();
        self.findings.declarations.push(decl);
    }

    fn parameters(&self, method: Node) -> Vec<Parameter> {
        let Some(params) = method.child_by_field_name("parameters") else {
            return Vec::new();
        };
        named_children(params)
            .into_iter()
            .filter(|p| p.kind() == "formal_parameter")
            .filter_map(|p| {
                Some(Parameter {
                    name: field_text(p, "name", self.parsed)?,
                    type_name: p
                        .child_by_field_name("type")
                        .and_then(|t| type_text(t, self.parsed)),
                })
            })
            .collect()
    }

    /// Provided routes from Spring MVC or JAX-RS annotations on a method.
    fn routes(&mut self, method: Node, annotations: &[Annotation]) {
        let class_annotations = ancestor(method, TYPE_KINDS)
            .map(|class| self.annotations(class))
            .unwrap_or_default();
        let class_path = |wanted: &str| {
            class_annotations
                .iter()
                .find(|a| a.name == wanted)
                .and_then(|a| self.annotation_path(a.node))
                .unwrap_or_default()
        };

        let mut routes = Vec::new();
        for annotation in annotations {
            let spring = SPRING_MAPPINGS
                .iter()
                .find(|(name, _)| *name == annotation.name)
                .map(|(_, verb)| verb.to_string())
                .or_else(|| {
                    (annotation.name == "RequestMapping").then(|| {
                        REQUEST_METHOD
                            .captures(self.text(annotation.node))
                            .map(|caps| caps[1].to_string())
                            .unwrap_or_else(|| "GET".to_string())
                    })
                });
            if let Some(verb) = spring {
                let path = self.annotation_path(annotation.node).unwrap_or_default();
                routes.push((
                    verb,
                    join_route(&class_path("RequestMapping"), &path),
                    syntax::start_line(annotation.node),
                    "spring",
                ));
                continue;
            }
            if JAX_RS_METHODS.contains(&annotation.name.as_str()) {
                let path = annotations
                    .iter()
                    .find(|a| a.name == "Path")
                    .and_then(|a| self.annotation_path(a.node))
                    .unwrap_or_default();
                routes.push((
                    annotation.name.clone(),
                    join_route(&class_path("Path"), &path),
                    syntax::start_line(annotation.node),
                    "jax-rs",
                ));
            }
        }

        for (verb, target, line, framework) in routes {
            self.findings.apis.push(ApiCall {
                method: Some(verb),
                target,
                direction: Direction::Provided,
                line,
                framework: Some(framework.to_string()),
            });
        }
    }

    /// Fields and locals. Fields of `@Entity` classes also map columns.
    fn variables(&mut self, node: Node, is_field: bool) {
        let value_type = node
            .child_by_field_name("type")
            .and_then(|t| type_text(t, self.parsed));
        let annotations = self.annotations(node);
        let is_static = named_children(node)
            .into_iter()
            .filter(|c| c.kind() == "modifiers")
            .any(|m| self.text(m).split_whitespace().any(|w| w == "static"));
        let entity = ancestor(node, TYPE_KINDS)
            .filter(|_| is_field)
            .and_then(|class| self.entity_table(class));

        for declarator in named_children(node)
            .into_iter()
            .filter(|c| c.kind() == "variable_declarator")
        {
            let Some(name) = field_text(declarator, "name", self.parsed) else {
                continue;
            };
            let line = syntax::start_line(declarator);

            if let Some(table) = &entity {
                let transient = annotations.iter().any(|a| a.name == "Transient");
                if !is_static && !transient {
                    let explicit = annotations
                        .iter()
                        .find(|a| a.name == "Column" || a.name == "JoinColumn")
                        .and_then(|a| self.annotation_value(a.node, "name"))
                        .and_then(|v| string_value(v, self.parsed, STRING_KINDS))
                        .filter(|c| !c.is_empty());
                    self.findings.columns.push(ColumnRef {
                        table: table.clone(),
                        column: explicit.unwrap_or_else(|| to_snake_case(&name)),
                        line,
                    });
                }
            }

            let mut decl = Declaration::new(name, DeclarationKind::Variable, Span::from_node(node));
            decl.value_type = value_type.clone();
            decl.annotations = annotations.iter().map(|a| a.name.clone()).collect();
            self.findings.declarations.push(decl);
        }
    }

    /// `@Value("${key:default}")` property injection.
    fn value_annotation(&mut self, node: Node) {
        if field_text(node, "name", self.parsed).as_deref() != Some("Value") {
            return;
        }
        let Some(raw) = self
            .annotation_value(node, "value")
            .and_then(|v| string_value(v, self.parsed, STRING_KINDS))
        else {
            return;
        };
        if let Some(caps) = PROPERTY_PLACEHOLDER.captures(&raw) {
            self.findings.config_reads.push(ConfigRead {
                key: caps[1].trim().to_string(),
                line: syntax::start_line(node),
                source: "property",
            });
        }
    }

    fn invocation(&mut self, node: Node) {
        let Some(name_node) = node.child_by_field_name("name") else {
            return;
        };
        let name = self.text(name_node).to_string();
        let object = node.child_by_field_name("object");
        let receiver = object.map(|o| self.text(o).to_string()).unwrap_or_default();
        // Chained calls start at the chain head, so use the name's line
        let line = syntax::start_line(name_node);
        let callee = if receiver.is_empty() {
            name.clone()
        } else {
            format!("{}.{}", receiver, name)
        };
        self.findings.calls.push(CallSite { callee, line });

        let args = node.child_by_field_name("arguments");
        let literal = args.and_then(|a| first_string_argument(a, self.parsed, STRING_KINDS));

        match name.as_str() {
            "getenv" if receiver == "System" => {
                if let Some(key) = literal {
                    self.findings.config_reads.push(ConfigRead {
                        key,
                        line,
                        source: "env",
                    });
                }
            }
            "getProperty" | "getRequiredProperty" => {
                if let Some(key) = literal {
                    let source = if receiver == "System" {
                        "system-property"
                    } else {
                        "property"
                    };
                    self.findings.config_reads.push(ConfigRead { key, line, source });
                }
            }
            "error" if LOGGER_NAMES.contains(&receiver.as_str()) => {
                if let Some(message) = literal {
                    self.findings.errors.push(ErrorEmission {
                        message,
                        line,
                        kind: ErrorKind::Logged,
                        error_type: None,
                    });
                }
            }
            "exchange" => {
                let verb = args
                    .and_then(|a| HTTP_METHOD_ARG.captures(self.text(a)))
                    .map(|caps| caps[1].to_lowercase());
                if let (Some(verb), Some(literal)) = (verb, literal) {
                    self.candidate(receiver, verb, literal, line);
                }
            }
            "uri" => {
                // webClient.get().uri("/path")
                let verb_call = object.filter(|o| o.kind() == "method_invocation");
                if let (Some(verb_call), Some(literal)) = (verb_call, literal) {
                    let verb = field_text(verb_call, "name", self.parsed).unwrap_or_default();
                    if http_method(&verb).is_some() {
                        let client = field_text(verb_call, "object", self.parsed).unwrap_or_default();
                        self.candidate(client, verb, literal, line);
                    }
                }
            }
            _ if MATCHER_CALLS.contains(&name.as_str()) => self.matcher(node, args, line),
            _ => {
                let verb = REST_TEMPLATE_METHODS
                    .iter()
                    .find(|(m, _)| *m == name)
                    .map(|(_, verb)| verb.to_string())
                    .or_else(|| http_method(&name).map(|_| name.clone()));
                if let (Some(verb), Some(literal)) = (verb, literal) {
                    if !receiver.is_empty() {
                        self.candidate(receiver, verb, literal, line);
                    }
                }
            }
        }
    }

    fn candidate(&mut self, receiver: String, method: String, literal: String, line: usize) {
        self.candidates.push(ApiCandidate {
            receiver,
            method,
            literal,
            line,
        });
    }

    /// `requestMatchers("/a/**", "/b").permitAll()`
    fn matcher(&mut self, node: Node, args: Option<Node>, line: usize) {
        let access = node
            .parent()
            .filter(|p| p.kind() == "method_invocation")
            .filter(|p| p.child_by_field_name("object").map(|o| o.id()) == Some(node.id()))
            .and_then(|p| {
                let rule = field_text(p, "name", self.parsed)?;
                if !is_access_rule(&rule) {
                    return None;
                }
                let arg = p
                    .child_by_field_name("arguments")
                    .and_then(|a| first_string_argument(a, self.parsed, STRING_KINDS));
                Some(match arg {
                    Some(arg) => format!("{}({})", rule, arg),
                    None => rule,
                })
            });
        let Some(args) = args else {
            return;
        };
        for arg in named_children(args) {
            if let Some(pattern) = string_value(arg, self.parsed, STRING_KINDS) {
                self.matchers.push(UrlMatcher {
                    pattern,
                    access: access.clone(),
                    line,
                });
            }
        }
    }

    fn throw(&mut self, node: Node) {
        let Some(thrown) = named_children(node).into_iter().next() else {
            return;
        };
        if thrown.kind() != "object_creation_expression" {
            return;
        }
        let message = thrown
            .child_by_field_name("arguments")
            .and_then(|a| first_string_argument(a, self.parsed, STRING_KINDS));
        if let Some(message) = message {
            self.findings.errors.push(ErrorEmission {
                message,
                line: syntax::start_line(node),
                kind: ErrorKind::Thrown,
                error_type: field_text(thrown, "type", self.parsed),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn analyze(source: &str) -> Findings {
        let analyzer = JvmAnalyzer::new();
        let parsed = analyzer
            .parse(Path::new("Test.java"), source.as_bytes())
            .unwrap();
        analyzer
            .extract_findings(&parsed, &AnalysisOptions::default())
            .unwrap()
    }

    #[test]
    fn test_spring_controller_routes() {
        let findings = analyze(
            r#"
import org.springframework.web.bind.annotation.*;

@RestController
@RequestMapping("/api/users")
public class UserController {
    @GetMapping("/{id}")
    public User get(@PathVariable Long id) {
        return service.find(id);
    }

    @PostMapping
    public User create(@RequestBody User user) {
        return service.save(user);
    }

    @RequestMapping(value = "/search", method = RequestMethod.PUT)
    public void search() {}
}
"#,
        );
        let routes: Vec<_> = findings
            .apis
            .iter()
            .map(|a| (a.method.clone().unwrap(), a.target.clone(), a.direction))
            .collect();
        assert_eq!(
            routes,
            vec![
                ("GET".to_string(), "/api/users/{id}".to_string(), Direction::Provided),
                ("POST".to_string(), "/api/users".to_string(), Direction::Provided),
                ("PUT".to_string(), "/api/users/search".to_string(), Direction::Provided),
            ]
        );
        assert!(findings.apis.iter().all(|a| a.framework.as_deref() == Some("spring")));

        let get = findings.find_declaration("get").unwrap();
        assert_eq!(get.container.as_deref(), Some("UserController"));
        assert_eq!(get.return_type.as_deref(), Some("User"));
        assert_eq!(get.parameters[0].name, "id");
        assert_eq!(get.parameters[0].type_name.as_deref(), Some("Long"));
    }

    #[test]
    fn test_jax_rs_routes() {
        let findings = analyze(
            r#"
@Path("/orders")
public class OrderResource {
    @GET
    @Path("/{id}")
    public Order find(@PathParam("id") String id) { return null; }

    @DELETE
    public void purge() {}
}
"#,
        );
        assert_eq!(findings.apis.len(), 2);
        assert_eq!(findings.apis[0].target, "/orders/{id}");
        assert_eq!(findings.apis[0].method.as_deref(), Some("GET"));
        assert_eq!(findings.apis[1].target, "/orders");
        assert_eq!(findings.apis[1].framework.as_deref(), Some("jax-rs"));
    }

    #[test]
    fn test_http_clients_are_consumed() {
        let findings = analyze(
            r#"
class InventoryClient {
    Stock stock() {
        return restTemplate.getForObject("http://inventory/api/stock", Stock.class);
    }
    void order() {
        webClient.post().uri("/orders").retrieve();
    }
    void sync() {
        restTemplate.exchange("/sync", HttpMethod.PUT, entity, Void.class);
    }
    void ignored() {
        cache.get("/x");
    }
}
"#,
        );
        let apis: Vec<_> = findings
            .apis
            .iter()
            .map(|a| (a.method.clone().unwrap(), a.target.clone()))
            .collect();
        assert_eq!(
            apis,
            vec![
                ("GET".to_string(), "http://inventory/api/stock".to_string()),
                ("POST".to_string(), "/orders".to_string()),
                ("PUT".to_string(), "/sync".to_string()),
            ]
        );
        assert!(findings.apis.iter().all(|a| a.direction == Direction::Consumed));
    }

    #[test]
    fn test_spring_data_repository() {
        let findings = analyze(
            r#"
public interface UserRepo extends JpaRepository<User, Long> {
    Optional<User> findByUsername(String username);
    List<User> findByEmailAndActive(String email, boolean active);
    void flush();
}
"#,
        );
        assert_eq!(findings.repositories.len(), 1);
        let repo = &findings.repositories[0];
        assert_eq!(repo.name, "UserRepo");
        assert_eq!(repo.framework, "spring-data-jpa");
        assert_eq!(repo.base_interface, "JpaRepository");
        assert_eq!(repo.entity_type.as_deref(), Some("User"));
        assert_eq!(repo.id_type.as_deref(), Some("Long"));
        assert_eq!(repo.derived_fields(), vec!["username", "email", "active"]);

        let decl = findings.find_declaration("UserRepo").unwrap();
        assert_eq!(decl.kind, DeclarationKind::Interface);
        assert_eq!(decl.bases, vec!["JpaRepository"]);
    }

    #[test]
    fn test_jpa_entity_tables_and_columns() {
        let findings = analyze(
            r#"
@Entity
@Table(name = "app_users")
public class User {
    private static final long serialVersionUID = 1L;
    @Id
    private Long id;
    @Column(name = "user_name")
    private String username;
    private Instant createdAt;
    @Transient
    private String cached;
}
"#,
        );
        assert_eq!(findings.tables.len(), 1);
        assert_eq!(findings.tables[0].table, "app_users");
        let columns: Vec<_> = findings.columns.iter().map(|c| c.column.as_str()).collect();
        assert_eq!(columns, vec!["id", "user_name", "created_at"]);
        assert!(findings.columns.iter().all(|c| c.table == "app_users"));
    }

    #[test]
    fn test_security_config_matchers() {
        let findings = analyze(
            r#"
@Configuration
@EnableWebSecurity
public class WebConfig {
    @Bean
    SecurityFilterChain chain(HttpSecurity http) throws Exception {
        http.authorizeHttpRequests(auth -> auth
            .requestMatchers("/api/public/**").permitAll()
            .requestMatchers("/api/admin/**").hasRole("ADMIN")
            .anyRequest().authenticated());
        return http.build();
    }
}

class JwtFilter extends OncePerRequestFilter {}
"#,
        );
        assert_eq!(findings.security.len(), 2);
        let config = &findings.security[0];
        assert_eq!(config.name, "WebConfig");
        assert_eq!(config.component_type, "security-config");
        let matchers: Vec<_> = config
            .matchers
            .iter()
            .map(|m| (m.pattern.as_str(), m.access.as_deref()))
            .collect();
        assert_eq!(
            matchers,
            vec![
                ("/api/public/**", Some("permitAll")),
                ("/api/admin/**", Some("hasRole(ADMIN)")),
            ]
        );
        assert_eq!(findings.security[1].component_type, "security-filter");
    }

    #[test]
    fn test_config_errors_and_tests() {
        let findings = analyze(
            r#"
import org.junit.jupiter.api.Test;

class PaymentTest {
    @Value("${payments.timeout:30}")
    private int timeout;

    @Test
    void chargesCard() {
        String key = System.getenv("STRIPE_KEY");
        if (key == null) {
            throw new IllegalStateException("stripe key missing");
        }
        log.error("charge failed");
        jdbc.query("SELECT * FROM payments");
    }
}
"#,
        );
        let keys: Vec<_> = findings
            .config_reads
            .iter()
            .map(|c| (c.key.as_str(), c.source))
            .collect();
        assert_eq!(
            keys,
            vec![("payments.timeout", "property"), ("STRIPE_KEY", "env")]
        );
        assert_eq!(findings.errors.len(), 2);
        assert_eq!(
            findings.errors[0].error_type.as_deref(),
            Some("IllegalStateException")
        );
        assert_eq!(findings.errors[1].kind, ErrorKind::Logged);
        assert_eq!(findings.tests.len(), 1);
        assert_eq!(findings.tests[0].name, "chargesCard");
        assert_eq!(findings.test_framework.as_deref(), Some("junit"));
        assert_eq!(findings.tables[0].table, "payments");
    }
}
