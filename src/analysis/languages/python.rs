//! Python language analyzer using tree-sitter.

use std::path::Path;

use tree_sitter::{Language, Node};

use super::common::{
    field_text, first_string_argument, named_children, record_sql_tables, split_bases,
    string_value, type_text,
};
use crate::analysis::classify::{
    has_server_context, http_method, reconcile_directions, resolve_candidates, ApiCandidate,
};
use crate::analysis::heuristics::{detect_test_framework, doc_return_type, literal_type, unquote};
use crate::analysis::{
    parse_with, AnalysisOptions, CallSite, ConfigRead, Declaration, DeclarationKind, ErrorEmission,
    ErrorKind, Findings, Import, LanguageAnalyzer, Parameter, ParsedFile, Span, TestCase,
};
use crate::syntax::{self, Visit};

const STRING_KINDS: &[&str] = &["string", "concatenated_string"];

/// Callees that read an environment variable by name.
const ENV_GETTERS: &[&str] = &["os.getenv", "os.environ.get", "getenv", "environ.get"];

const LOGGER_NAMES: &[&str] = &["logger", "logging", "log", "_logger", "_log"];

/// Parameters that name the receiver rather than an argument.
const RECEIVER_PARAMS: &[&str] = &["self", "cls"];

pub struct PythonAnalyzer {
    language: Language,
}

impl PythonAnalyzer {
    pub fn new() -> Self {
        Self {
            language: tree_sitter_python::LANGUAGE.into(),
        }
    }
}

impl Default for PythonAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl LanguageAnalyzer for PythonAnalyzer {
    fn language_id(&self) -> &'static str {
        "python"
    }

    fn file_extensions(&self) -> &'static [&'static str] {
        &["py", "pyi"]
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
            "function_definition" => self.function(node),
            "class_definition" => self.class(node),
            "assignment" => self.assignment(node),
            "call" => self.call(node),
            "subscript" => self.environ_subscript(node),
            "raise_statement" => self.raise(node),
            "import_statement" => self.import(node),
            "import_from_statement" => {
                if let Some(module) = node.child_by_field_name("module_name") {
                    self.findings.imports.push(Import {
                        source: self.text(module).to_string(),
                        line: syntax::start_line(node),
                    });
                }
            }
            "string" | "concatenated_string" => {
                let line = syntax::start_line(node);
                let text = unquote(self.text(node));
                record_sql_tables(&mut self.findings, &text, line);
                // f-string interpolations can hold calls
                if !has_interpolation(node) {
                    return Visit::SkipChildren;
                }
            }
            _ => {}
        }
        Visit::Continue
    }

    fn function(&mut self, node: Node) {
        let Some(name) = field_text(node, "name", self.parsed) else {
            return;
        };
        let kind = if in_class_body(node) {
            DeclarationKind::Method
        } else {
            DeclarationKind::Function
        };
        let span = definition_span(node);
        let mut decl = Declaration::new(name.clone(), kind, span);
        decl.is_async = self.text(node).trim_start().starts_with("async");
        decl.parameters = self.parameters(node);
        decl.return_type = node
            .child_by_field_name("return_type")
            .and_then(|t| type_text(t, self.parsed))
            .or_else(|| self.docstring(node).and_then(|doc| doc_return_type(&doc)));
        decl.annotations = self.decorators(node);
        self.findings.declarations.push(decl);

        if name == "test" || name.starts_with("test_") {
            self.findings.tests.push(TestCase { name, span });
        }
    }

    fn class(&mut self, node: Node) {
        let Some(name) = field_text(node, "name", self.parsed) else {
            return;
        };
        let mut decl = Declaration::new(name, DeclarationKind::Class, definition_span(node));
        decl.bases = node
            .child_by_field_name("superclasses")
            .map(|s| split_bases(self.text(s)))
            .unwrap_or_default();
        decl.annotations = self.decorators(node);
        self.findings.declarations.push(decl);
    }

    /// Assignments to a plain name become variables.
    fn assignment(&mut self, node: Node) {
        if node.parent().map(|p| p.kind()) != Some("expression_statement") {
            return;
        }
        let Some(left) = node.child_by_field_name("left").filter(|l| l.kind() == "identifier")
        else {
            return;
        };
        let mut decl = Declaration::new(
            self.text(left),
            DeclarationKind::Variable,
            Span::from_node(node),
        );
        decl.value_type = node
            .child_by_field_name("type")
            .and_then(|t| type_text(t, self.parsed))
            .or_else(|| {
                node.child_by_field_name("right")
                    .and_then(|r| literal_type(r.kind()))
                    .map(str::to_string)
            });
        self.findings.declarations.push(decl);
    }

    fn parameters(&self, func: Node) -> Vec<Parameter> {
        let Some(params) = func.child_by_field_name("parameters") else {
            return Vec::new();
        };
        named_children(params)
            .into_iter()
            .filter_map(|param| {
                let (name, type_name) = match param.kind() {
                    "identifier" => (self.text(param).to_string(), None),
                    "typed_parameter" => (
                        named_children(param)
                            .into_iter()
                            .next()
                            .map(|n| self.text(n).to_string())?,
                        param
                            .child_by_field_name("type")
                            .and_then(|t| type_text(t, self.parsed)),
                    ),
                    "default_parameter" | "typed_default_parameter" => (
                        field_text(param, "name", self.parsed)?,
                        param
                            .child_by_field_name("type")
                            .and_then(|t| type_text(t, self.parsed)),
                    ),
                    "list_splat_pattern" | "dictionary_splat_pattern" => {
                        (self.text(param).to_string(), None)
                    }
                    _ => return None,
                };
                if RECEIVER_PARAMS.contains(&name.as_str()) {
                    return None;
                }
                Some(Parameter { name, type_name })
            })
            .collect()
    }

    /// First statement of the body when it is a string.
    fn docstring(&self, func: Node) -> Option<String> {
        let body = func.child_by_field_name("body")?;
        let first = named_children(body).into_iter().next()?;
        if first.kind() != "expression_statement" {
            return None;
        }
        let literal = first.named_child(0)?;
        string_value(literal, self.parsed, STRING_KINDS)
    }

    fn decorators(&self, node: Node) -> Vec<String> {
        let Some(parent) = node.parent().filter(|p| p.kind() == "decorated_definition") else {
            return Vec::new();
        };
        named_children(parent)
            .into_iter()
            .filter(|c| c.kind() == "decorator")
            .map(|d| {
                let text = self.text(d).trim_start_matches('@');
                text.split('(').next().unwrap_or(text).trim().to_string()
            })
            .collect()
    }

    fn call(&mut self, node: Node) {
        let Some(function) = node.child_by_field_name("function") else {
            return;
        };
        let callee = self.text(function);
        let line = syntax::start_line(node);
        self.findings.calls.push(CallSite {
            callee: callee.to_string(),
            line,
        });
        let args = node.child_by_field_name("arguments");
        let literal = args.and_then(|a| first_string_argument(a, self.parsed, STRING_KINDS));

        if ENV_GETTERS.contains(&callee) {
            if let Some(key) = literal {
                self.findings.config_reads.push(ConfigRead {
                    key,
                    line,
                    source: "env",
                });
            }
            return;
        }

        if function.kind() != "attribute" {
            return;
        }
        let receiver = field_text(function, "object", self.parsed).unwrap_or_default();
        let method = field_text(function, "attribute", self.parsed).unwrap_or_default();

        if method == "error" && LOGGER_NAMES.contains(&crate::analysis::simple_name(&receiver)) {
            if let Some(message) = literal {
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
        if http_method(&method).is_some() {
            self.candidates.push(ApiCandidate {
                receiver,
                method,
                literal,
                line,
            });
        } else if method == "route" {
            let mut verbs = args.map(|a| self.route_methods(a)).unwrap_or_default();
            if verbs.is_empty() {
                verbs.push("get".to_string());
            }
            for verb in verbs {
                self.candidates.push(ApiCandidate {
                    receiver: receiver.clone(),
                    method: verb,
                    literal: literal.clone(),
                    line,
                });
            }
        }
    }

    /// Entries of a `methods=[...]` keyword argument, lower-cased.
    fn route_methods(&self, args: Node) -> Vec<String> {
        let keyword = named_children(args).into_iter().find(|arg| {
            arg.kind() == "keyword_argument"
                && field_text(*arg, "name", self.parsed).as_deref() == Some("methods")
        });
        let Some(list) = keyword.and_then(|k| k.child_by_field_name("value")) else {
            return Vec::new();
        };
        let mut verbs: Vec<String> = named_children(list)
            .into_iter()
            .filter_map(|item| string_value(item, self.parsed, STRING_KINDS))
            .map(|m| m.to_lowercase())
            .collect();
        verbs.dedup();
        verbs
    }

    /// `os.environ["KEY"]`
    fn environ_subscript(&mut self, node: Node) {
        let Some(value) = node.child_by_field_name("value") else {
            return;
        };
        if !matches!(self.text(value), "os.environ" | "environ") {
            return;
        }
        let key = node
            .child_by_field_name("subscript")
            .and_then(|s| string_value(s, self.parsed, STRING_KINDS));
        if let Some(key) = key {
            self.findings.config_reads.push(ConfigRead {
                key,
                line: syntax::start_line(node),
                source: "env",
            });
        }
    }

    fn raise(&mut self, node: Node) {
        let Some(raised) = named_children(node).into_iter().next() else {
            return;
        };
        let line = syntax::start_line(node);
        let (message, error_type) = match raised.kind() {
            "call" => (
                raised
                    .child_by_field_name("arguments")
                    .and_then(|a| first_string_argument(a, self.parsed, STRING_KINDS)),
                field_text(raised, "function", self.parsed),
            ),
            _ => (string_value(raised, self.parsed, STRING_KINDS), None),
        };
        if let Some(message) = message {
            self.findings.errors.push(ErrorEmission {
                message,
                line,
                kind: ErrorKind::Thrown,
                error_type,
            });
        }
    }

    fn import(&mut self, node: Node) {
        let line = syntax::start_line(node);
        for name in named_children(node) {
            let module = match name.kind() {
                "dotted_name" => Some(name),
                "aliased_import" => name.child_by_field_name("name"),
                _ => None,
            };
            if let Some(module) = module {
                self.findings.imports.push(Import {
                    source: self.text(module).to_string(),
                    line,
                });
            }
        }
    }
}

/// Span of a definition including its decorators.
fn definition_span(node: Node) -> Span {
    match node.parent().filter(|p| p.kind() == "decorated_definition") {
        Some(decorated) => Span::from_node(decorated),
        None => Span::from_node(node),
    }
}

fn has_interpolation(node: Node) -> bool {
    named_children(node)
        .into_iter()
        .any(|c| c.kind() == "interpolation" || (c.kind() == "string" && has_interpolation(c)))
}

/// Whether a node sits directly in a class body, possibly under decorators.
fn in_class_body(node: Node) -> bool {
    let mut current = node;
    if let Some(parent) = current.parent().filter(|p| p.kind() == "decorated_definition") {
        current = parent;
    }
    current
        .parent()
        .filter(|p| p.kind() == "block")
        .and_then(|block| block.parent())
        .map(|owner| owner.kind() == "class_definition")
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::Direction;

    fn analyze(source: &str) -> Findings {
        let analyzer = PythonAnalyzer::new();
        let parsed = analyzer.parse(Path::new("app.py"), source.as_bytes()).unwrap();
        analyzer
            .extract_findings(&parsed, &AnalysisOptions::default())
            .unwrap()
    }

    #[test]
    fn test_requests_call_is_consumed() {
        let findings = analyze(
            r#"
import requests

def load_users():
    return requests.get("https://users.internal/api/users")
"#,
        );
        assert_eq!(findings.apis.len(), 1);
        assert_eq!(findings.apis[0].direction, Direction::Consumed);
        assert_eq!(findings.apis[0].method.as_deref(), Some("GET"));
        assert_eq!(findings.apis[0].framework.as_deref(), Some("requests"));
    }

    #[test]
    fn test_flask_route_with_methods() {
        let findings = analyze(
            r#"
from flask import Flask

app = Flask(__name__)

@app.route("/orders", methods=["POST"])
def create_order():
    return {}

@app.route("/health")
def health():
    return "ok"
"#,
        );
        assert_eq!(findings.apis.len(), 2);
        let create = &findings.apis[0];
        assert_eq!(create.direction, Direction::Provided);
        assert_eq!(create.method.as_deref(), Some("POST"));
        assert_eq!(create.target, "/orders");
        assert_eq!(create.framework.as_deref(), Some("flask"));
        assert_eq!(findings.apis[1].method.as_deref(), Some("GET"));

        let decl = findings.find_declaration("create_order").unwrap();
        assert_eq!(decl.annotations, vec!["app.route"]);
    }

    #[test]
    fn test_fastapi_router_and_fstring() {
        let findings = analyze(
            r#"
from fastapi import APIRouter
import httpx

router = APIRouter()

@router.get("/items/{item_id}")
async def read_item(item_id: int):
    return await httpx.get(f"{BASE}/stock/{item_id}")
"#,
        );
        let provided: Vec<_> = findings
            .apis
            .iter()
            .filter(|a| a.direction == Direction::Provided)
            .collect();
        assert_eq!(provided.len(), 1);
        assert_eq!(provided[0].target, "/items/{item_id}");

        let consumed: Vec<_> = findings
            .apis
            .iter()
            .filter(|a| a.direction == Direction::Consumed)
            .collect();
        assert_eq!(consumed.len(), 1);
        assert_eq!(consumed[0].target, "/stock/");

        let read = findings.find_declaration("read_item").unwrap();
        assert!(read.is_async);
        assert_eq!(read.parameters[0].name, "item_id");
        assert_eq!(read.parameters[0].type_name.as_deref(), Some("int"));
    }

    #[test]
    fn test_unknown_receiver_is_skipped() {
        let findings = analyze("from flask import Flask\ncache.get('/x')\n");
        assert!(findings.apis.is_empty());
    }

    #[test]
    fn test_classes_and_methods() {
        let findings = analyze(
            r#"
TIMEOUT = 30

class OrderService(BaseService, Mixin):
    retries = 3

    def place(self, order, *args):
        """Place an order.

        :rtype: Receipt
        """
        return self.repo.save(order)

def helper() -> str:
    return "x"
"#,
        );
        let timeout = findings.find_declaration("TIMEOUT").unwrap();
        assert_eq!(timeout.kind, DeclarationKind::Variable);
        assert_eq!(timeout.value_type.as_deref(), Some("number"));

        let class = findings.find_declaration("OrderService").unwrap();
        assert_eq!(class.bases, vec!["BaseService", "Mixin"]);

        let retries = findings.find_declaration("retries").unwrap();
        assert_eq!(retries.container.as_deref(), Some("OrderService"));

        let place = findings.find_declaration("place").unwrap();
        assert_eq!(place.kind, DeclarationKind::Method);
        assert_eq!(place.container.as_deref(), Some("OrderService"));
        assert_eq!(place.return_type.as_deref(), Some("Receipt"));
        let names: Vec<_> = place.parameters.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["order", "*args"]);

        let helper = findings.find_declaration("helper").unwrap();
        assert_eq!(helper.kind, DeclarationKind::Function);
        assert_eq!(helper.return_type.as_deref(), Some("str"));

        assert!(findings.calls.iter().any(|c| c.callee == "self.repo.save"));
    }

    #[test]
    fn test_config_errors_and_sql() {
        let findings = analyze(
            r#"
import os
import logging

logger = logging.getLogger(__name__)
DB_URL = os.getenv("DATABASE_URL")
SECRET = os.environ["SECRET_KEY"]

def fetch(conn):
    if not DB_URL:
        raise RuntimeError("database url missing")
    logger.error("fetch failed")
    return conn.execute("SELECT * FROM invoices")
"#,
        );
        let keys: Vec<_> = findings.config_reads.iter().map(|c| c.key.as_str()).collect();
        assert_eq!(keys, vec!["DATABASE_URL", "SECRET_KEY"]);

        assert_eq!(findings.errors.len(), 2);
        assert_eq!(findings.errors[0].message, "database url missing");
        assert_eq!(findings.errors[0].error_type.as_deref(), Some("RuntimeError"));
        assert_eq!(findings.errors[1].kind, ErrorKind::Logged);

        assert_eq!(findings.tables.len(), 1);
        assert_eq!(findings.tables[0].table, "invoices");
    }

    #[test]
    fn test_pytest_functions() {
        let findings = analyze(
            r#"
import pytest

def test_total():
    assert 1 == 1

def helper():
    pass
"#,
        );
        assert_eq!(findings.test_framework.as_deref(), Some("pytest"));
        assert_eq!(findings.tests.len(), 1);
        assert_eq!(findings.tests[0].name, "test_total");
    }

    #[test]
    fn test_prefix_without_underscore_is_not_a_test() {
        let findings = analyze(
            r#"
import pytest

def testing_helper():
    pass

def test():
    pass

def test_total():
    pass
"#,
        );
        let names: Vec<_> = findings.tests.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["test", "test_total"]);
    }

    #[test]
    fn test_route_with_several_methods() {
        let findings = analyze(
            r#"
from flask import Flask

app = Flask(__name__)

@app.route("/orders", methods=["GET", "POST"])
def orders():
    return {}
"#,
        );
        let mut methods: Vec<_> = findings
            .apis
            .iter()
            .filter(|a| a.direction == Direction::Provided && a.target == "/orders")
            .filter_map(|a| a.method.as_deref())
            .collect();
        methods.sort();
        assert_eq!(methods, vec!["GET", "POST"]);
    }

    #[test]
    fn test_decorated_function_span_starts_at_decorator() {
        let findings = analyze(
            r#"
from fastapi import FastAPI

app = FastAPI()

@app.get("/items")
def list_items():
    return []
"#,
        );
        let decl = findings.find_declaration("list_items").unwrap();
        assert_eq!(decl.span.start_line, 6);
        assert_eq!(findings.apis.len(), 1);
        assert!(decl.span.contains_line(findings.apis[0].line));
    }

    #[test]
    fn test_call_inside_fstring_interpolation() {
        let findings = analyze(
            r#"
import requests

def banner():
    return f"{requests.get('https://x.io/a')}"
"#,
        );
        assert_eq!(findings.apis.len(), 1);
        assert_eq!(findings.apis[0].direction, Direction::Consumed);
        assert_eq!(findings.apis[0].target, "https://x.io/a");
    }
}
