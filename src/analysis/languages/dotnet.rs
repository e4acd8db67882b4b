//! C# language analyzer using tree-sitter.

use std::path::Path;

use lazy_static::lazy_static;
use regex::Regex;
use tree_sitter::{Language, Node};

use super::common::{
    ancestor, field_text, first_string_argument, join_route, named_children, record_sql_tables,
    split_bases, string_value, type_text,
};
use crate::analysis::classify::{
    has_server_context, http_method, reconcile_directions, resolve_candidates, ApiCandidate,
};
use crate::analysis::heuristics::{detect_test_framework, unquote};
use crate::analysis::{
    parse_with, AnalysisOptions, ApiCall, CallSite, ConfigRead, Declaration, DeclarationKind,
    Direction, ErrorEmission, ErrorKind, Findings, Import, LanguageAnalyzer, Parameter,
    ParsedFile, Span, TestCase,
};
use crate::syntax::{self, Visit};

const STRING_KINDS: &[&str] = &[
    "string_literal",
    "verbatim_string_literal",
    "raw_string_literal",
    "interpolated_string_expression",
];

const TYPE_KINDS: &[&str] = &[
    "class_declaration",
    "struct_declaration",
    "record_declaration",
    "interface_declaration",
];

const TEST_ATTRIBUTES: &[&str] = &["Fact", "Theory", "Test", "TestCase", "TestMethod"];

/// Minimal API route registrations: `app.MapGet("/x", ...)`.
const MAP_METHODS: &[(&str, &str)] = &[
    ("MapGet", "get"),
    ("MapPost", "post"),
    ("MapPut", "put"),
    ("MapDelete", "delete"),
    ("MapPatch", "patch"),
];

/// Configuration accessors taking the key as first argument.
const CONFIG_GETTERS: &[&str] = &["GetValue", "GetSection", "GetConnectionString", "GetRequiredSection"];

lazy_static! {
    /// `GetAsync`, `PostAsJsonAsync`, `GetFromJsonAsync`, `GetStringAsync`...
    static ref HTTP_CLIENT_METHOD: Regex = Regex::new(
        r"^(Get|Post|Put|Delete|Patch)(?:AsJson|FromJson|String|Stream|ByteArray)?Async$"
    )
    .unwrap();
}

pub struct DotnetAnalyzer {
    language: Language,
}

impl DotnetAnalyzer {
    pub fn new() -> Self {
        Self {
            language: tree_sitter_c_sharp::LANGUAGE.into(),
        }
    }
}

impl Default for DotnetAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl LanguageAnalyzer for DotnetAnalyzer {
    fn language_id(&self) -> &'static str {
        "csharp"
    }

    fn file_extensions(&self) -> &'static [&'static str] {
        &["cs"]
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
        };
        let stats = syntax::walk(parsed.tree.root_node(), &options.limits, |node, _| {
            collector.visit(node)
        });

        let Collector {
            mut findings,
            candidates,
            ..
        } = collector;
        findings.walk = stats;

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

/// An attribute with its name normalized (`HttpGetAttribute` -> `HttpGet`).
struct Attribute<'t> {
    name: String,
    node: Node<'t>,
}

struct Collector<'a> {
    parsed: &'a ParsedFile,
    findings: Findings,
    candidates: Vec<ApiCandidate>,
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
            "struct_declaration" => self.type_declaration(node, DeclarationKind::Struct),
            "record_declaration" => self.type_declaration(node, DeclarationKind::Record),
            "interface_declaration" => self.type_declaration(node, DeclarationKind::Interface),
            "enum_declaration" => self.type_declaration(node, DeclarationKind::Enum),
            "method_declaration" | "constructor_declaration" => self.method(node),
            "field_declaration" | "local_declaration_statement" => self.variables(node),
            "property_declaration" => self.property(node),
            "invocation_expression" => self.invocation(node),
            "element_access_expression" => self.config_indexer(node),
            "throw_statement" | "throw_expression" => self.throw(node),
            "using_directive" => {
                let name = named_children(node)
                    .into_iter()
                    .find(|c| matches!(c.kind(), "qualified_name" | "identifier"));
                if let Some(name) = name {
                    self.findings.imports.push(Import {
                        source: self.text(name).to_string(),
                        line: syntax::start_line(node),
                    });
                }
            }
            kind if STRING_KINDS.contains(&kind) => {
                let line = syntax::start_line(node);
                let text = unquote(self.text(node));
                record_sql_tables(&mut self.findings, &text, line);
                return Visit::SkipChildren;
            }
            _ => {}
        }
        Visit::Continue
    }

    fn attributes<'t>(&self, decl: Node<'t>) -> Vec<Attribute<'t>> {
        named_children(decl)
            .into_iter()
            .filter(|c| c.kind() == "attribute_list")
            .flat_map(named_children)
            .filter(|c| c.kind() == "attribute")
            .filter_map(|node| {
                let raw = field_text(node, "name", self.parsed)?;
                let simple = raw.rsplit('.').next().unwrap_or(&raw);
                let name = simple.strip_suffix("Attribute").unwrap_or(simple).to_string();
                Some(Attribute { name, node })
            })
            .collect()
    }

    /// First string argument of an attribute: `[Route("api/[controller]")]`.
    fn attribute_string(&self, attribute: Node) -> Option<String> {
        named_children(attribute)
            .into_iter()
            .filter(|c| c.kind() == "attribute_argument_list")
            .flat_map(named_children)
            .filter_map(|arg| named_children(arg).into_iter().last())
            .find_map(|expr| string_value(expr, self.parsed, STRING_KINDS))
    }

    fn type_declaration(&mut self, node: Node, kind: DeclarationKind) {
        let Some(name) = field_text(node, "name", self.parsed) else {
            return;
        };
        let mut decl = Declaration::new(name, kind, Span::from_node(node));
        decl.bases = named_children(node)
            .into_iter()
            .filter(|c| c.kind() == "base_list")
            .flat_map(|c| split_bases(self.text(c)))
            .collect();
        decl.annotations = self.attributes(node).into_iter().map(|a| a.name).collect();
        self.findings.declarations.push(decl);
    }

    fn method(&mut self, node: Node) {
        let Some(name) = field_text(node, "name", self.parsed) else {
            return;
        };
        let span = Span::from_node(node);
        let attributes = self.attributes(node);

        if attributes
            .iter()
            .any(|a| TEST_ATTRIBUTES.contains(&a.name.as_str()))
        {
            self.findings.tests.push(TestCase {
                name: name.clone(),
                span,
            });
        }
        self.routes(node, &name, &attributes);

        let mut decl = Declaration::new(name, DeclarationKind::Method, span);
        decl.return_type = node
            .child_by_field_name("returns")
            .or_else(|| node.child_by_field_name("type"))
            .and_then(|t| type_text(t, self.parsed));
        decl.is_async = named_children(node)
            .into_iter()
            .any(|c| c.kind() == "modifier" && self.text(c) == "async");
        decl.parameters = node
            .child_by_field_name("parameters")
            .map(named_children)
            .unwrap_or_default()
            .into_iter()
            .filter(|p| p.kind() == "parameter")
            .filter_map(|p| {
                Some(Parameter {
                    name: field_text(p, "name", self.parsed)?,
                    type_name: p
                        .child_by_field_name("type")
                        .and_then(|t| type_text(t, self.parsed)),
                })
            })
            .collect();
        decl.annotations = attributes.into_iter().map(|a| a.name).collect();
        self.findings.declarations.push(decl);
    }

    /// Attribute-routed controller actions.
    fn routes(&mut self, method: Node, method_name: &str, attributes: &[Attribute]) {
        let class = ancestor(method, TYPE_KINDS);
        let controller = class
            .and_then(|c| field_text(c, "name", self.parsed))
            .unwrap_or_default();
        let prefix = class
            .map(|c| self.attributes(c))
            .unwrap_or_default()
            .iter()
            .find(|a| a.name == "Route")
            .and_then(|a| self.attribute_string(a.node))
            .unwrap_or_default();
        let method_route = attributes
            .iter()
            .find(|a| a.name == "Route")
            .and_then(|a| self.attribute_string(a.node));

        for attribute in attributes {
            let Some(verb) = attribute
                .name
                .strip_prefix("Http")
                .and_then(|rest| http_method(&rest.to_lowercase()))
            else {
                continue;
            };
            let path = self
                .attribute_string(attribute.node)
                .or_else(|| method_route.clone())
                .unwrap_or_default();
            let target = substitute_tokens(&join_route(&prefix, &path), &controller, method_name);
            self.findings.apis.push(ApiCall {
                method: Some(verb),
                target,
                direction: Direction::Provided,
                line: syntax::start_line(attribute.node),
                framework: Some("aspnetcore".to_string()),
            });
        }
    }

    fn variables(&mut self, node: Node) {
        let attributes: Vec<String> = self.attributes(node).into_iter().map(|a| a.name).collect();
        for declaration in named_children(node)
            .into_iter()
            .filter(|c| c.kind() == "variable_declaration")
        {
            let value_type = declaration
                .child_by_field_name("type")
                .and_then(|t| type_text(t, self.parsed));
            for declarator in named_children(declaration)
                .into_iter()
                .filter(|c| c.kind() == "variable_declarator")
            {
                let name = field_text(declarator, "name", self.parsed).or_else(|| {
                    named_children(declarator)
                        .into_iter()
                        .find(|c| c.kind() == "identifier")
                        .map(|c| self.text(c).to_string())
                });
                let Some(name) = name else {
                    continue;
                };
                let mut decl =
                    Declaration::new(name, DeclarationKind::Variable, Span::from_node(node));
                decl.value_type = value_type.clone();
                decl.annotations = attributes.clone();
                self.findings.declarations.push(decl);
            }
        }
    }

    fn property(&mut self, node: Node) {
        let Some(name) = field_text(node, "name", self.parsed) else {
            return;
        };
        let mut decl = Declaration::new(name, DeclarationKind::Variable, Span::from_node(node));
        decl.value_type = node
            .child_by_field_name("type")
            .and_then(|t| type_text(t, self.parsed));
        decl.annotations = self.attributes(node).into_iter().map(|a| a.name).collect();
        self.findings.declarations.push(decl);
    }

    fn invocation(&mut self, node: Node) {
        let Some(function) = node.child_by_field_name("function") else {
            return;
        };
        let line = syntax::start_line(node);
        self.findings.calls.push(CallSite {
            callee: self.text(function).to_string(),
            line,
        });
        if function.kind() != "member_access_expression" {
            return;
        }
        let receiver = field_text(function, "expression", self.parsed).unwrap_or_default();
        let Some(member) = field_text(function, "name", self.parsed) else {
            return;
        };
        // Drop generic arguments: GetValue<int>
        let member = member.split('<').next().unwrap_or(&member).to_string();
        let args = node.child_by_field_name("arguments");
        let literal = args.and_then(|a| first_string_argument(a, self.parsed, STRING_KINDS));

        if receiver == "Environment" && member == "GetEnvironmentVariable" {
            if let Some(key) = literal {
                self.findings.config_reads.push(ConfigRead {
                    key,
                    line,
                    source: "env",
                });
            }
            return;
        }
        if CONFIG_GETTERS.contains(&member.as_str()) && is_configuration(&receiver) {
            if let Some(key) = literal {
                self.findings.config_reads.push(ConfigRead {
                    key,
                    line,
                    source: "configuration",
                });
            }
            return;
        }
        if member == "LogError" || member == "LogCritical" {
            // The message may follow an exception argument
            let message = args.and_then(|a| {
                named_children(a)
                    .into_iter()
                    .filter_map(|arg| named_children(arg).into_iter().last())
                    .find_map(|expr| string_value(expr, self.parsed, STRING_KINDS))
            });
            if let Some(message) = message {
                self.findings.errors.push(ErrorEmission {
                    message,
                    line,
                    kind: ErrorKind::Logged,
                    error_type: None,
                });
            }
            return;
        }

        let Some(literal) = literal else {
            return;
        };
        let verb = MAP_METHODS
            .iter()
            .find(|(name, _)| *name == member)
            .map(|(_, verb)| verb.to_string())
            .or_else(|| {
                HTTP_CLIENT_METHOD
                    .captures(&member)
                    .map(|caps| caps[1].to_lowercase())
            });
        if let Some(verb) = verb {
            self.candidates.push(ApiCandidate {
                receiver,
                method: verb,
                literal,
                line,
            });
        }
    }

    /// `configuration["Section:Key"]`
    fn config_indexer(&mut self, node: Node) {
        let Some(target) = node.child_by_field_name("expression") else {
            return;
        };
        if !is_configuration(self.text(target)) {
            return;
        }
        let key = node
            .child_by_field_name("subscript")
            .or_else(|| {
                named_children(node)
                    .into_iter()
                    .find(|c| c.kind() == "bracketed_argument_list")
            })
            .and_then(|list| first_string_argument(list, self.parsed, STRING_KINDS));
        if let Some(key) = key {
            self.findings.config_reads.push(ConfigRead {
                key,
                line: syntax::start_line(node),
                source: "configuration",
            });
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

/// Whether a receiver looks like an `IConfiguration`.
fn is_configuration(receiver: &str) -> bool {
    let lower = receiver.to_lowercase();
    lower.contains("config")
}

/// Replace `[controller]` and `[action]` route tokens.
fn substitute_tokens(route: &str, controller: &str, action: &str) -> String {
    let controller = controller.strip_suffix("Controller").unwrap_or(controller);
    route
        .replace("[controller]", &controller.to_lowercase())
        .replace("[action]", &action.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn analyze(source: &str) -> Findings {
        let analyzer = DotnetAnalyzer::new();
        let parsed = analyzer
            .parse(Path::new("Api.cs"), source.as_bytes())
            .unwrap();
        analyzer
            .extract_findings(&parsed, &AnalysisOptions::default())
            .unwrap()
    }

    #[test]
    fn test_attribute_routes() {
        let findings = analyze(
            r#"
using Microsoft.AspNetCore.Mvc;

[ApiController]
[Route("api/[controller]")]
public class OrdersController : ControllerBase
{
    [HttpGet("{id}")]
    public async Task<IActionResult> Get(int id)
    {
        return Ok(await _service.Find(id));
    }

    [HttpPost]
    public IActionResult Create(Order order) => Ok();
}
"#,
        );
        let routes: Vec<_> = findings
            .apis
            .iter()
            .map(|a| (a.method.clone().unwrap(), a.target.clone()))
            .collect();
        assert_eq!(
            routes,
            vec![
                ("GET".to_string(), "/api/orders/{id}".to_string()),
                ("POST".to_string(), "/api/orders".to_string()),
            ]
        );
        assert!(findings.apis.iter().all(|a| a.direction == Direction::Provided));

        let class = findings.find_declaration("OrdersController").unwrap();
        assert_eq!(class.bases, vec!["ControllerBase"]);
        let get = findings.find_declaration("Get").unwrap();
        assert!(get.is_async);
        assert_eq!(get.container.as_deref(), Some("OrdersController"));
        assert_eq!(get.parameters[0].name, "id");
    }

    #[test]
    fn test_minimal_api_and_http_client() {
        let findings = analyze(
            r#"
var builder = WebApplication.CreateBuilder(args);
var app = builder.Build();
app.MapGet("/health", () => "ok");

class StockClient
{
    private readonly HttpClient _httpClient;

    public async Task<Stock> Load()
    {
        return await _httpClient.GetFromJsonAsync<Stock>("https://stock.internal/api/stock");
    }

    public void Other()
    {
        cache.GetAsync("/x");
    }
}
"#,
        );
        let apis: Vec<_> = findings
            .apis
            .iter()
            .map(|a| (a.method.clone().unwrap(), a.target.clone(), a.direction))
            .collect();
        assert_eq!(
            apis,
            vec![
                ("GET".to_string(), "/health".to_string(), Direction::Provided),
                (
                    "GET".to_string(),
                    "https://stock.internal/api/stock".to_string(),
                    Direction::Consumed
                ),
            ]
        );
        let field = findings.find_declaration("_httpClient").unwrap();
        assert_eq!(field.kind, DeclarationKind::Variable);
        assert_eq!(field.value_type.as_deref(), Some("HttpClient"));
    }

    #[test]
    fn test_config_errors_and_tests() {
        let findings = analyze(
            r#"
using Xunit;

public class BillingTests
{
    [Fact]
    public void Charges()
    {
        var key = Environment.GetEnvironmentVariable("BILLING_KEY");
        var url = _configuration["Billing:Url"];
        var retries = _configuration.GetValue<int>("Billing:Retries");
        if (key == null)
        {
            throw new InvalidOperationException("billing key missing");
        }
        _logger.LogError(ex, "charge failed");
        _db.Query("SELECT id FROM invoices");
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
            vec![
                ("BILLING_KEY", "env"),
                ("Billing:Url", "configuration"),
                ("Billing:Retries", "configuration"),
            ]
        );
        assert_eq!(findings.errors.len(), 2);
        assert_eq!(findings.errors[0].message, "billing key missing");
        assert_eq!(
            findings.errors[0].error_type.as_deref(),
            Some("InvalidOperationException")
        );
        assert_eq!(findings.errors[1].message, "charge failed");
        assert_eq!(findings.tests.len(), 1);
        assert_eq!(findings.test_framework.as_deref(), Some("xunit"));
        assert_eq!(findings.tables[0].table, "invoices");
    }

    #[test]
    fn test_substitute_tokens() {
        assert_eq!(
            substitute_tokens("/api/[controller]/[action]", "UsersController", "List"),
            "/api/users/list"
        );
        assert_eq!(substitute_tokens("/plain", "X", "y"), "/plain");
    }
}
