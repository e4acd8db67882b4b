//! JavaScript, TypeScript and TSX analyzer.
//!
//! The three dialects share node kinds for everything collected here, so a
//! single analyzer parameterized by grammar handles all of them.

use std::path::Path;

use tree_sitter::{Language as Grammar, Node};

use super::common::{
    field_text, first_argument, first_string_argument, named_children, preceding_comment,
    record_sql_tables, split_bases, string_value, type_text,
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

const STRING_KINDS: &[&str] = &["string", "template_string"];

/// Receivers whose `.error(...)` calls are error-level logging.
const LOGGER_NAMES: &[&str] = &["console", "logger", "log", "winston", "pino"];

const ENV_OBJECTS: &[&str] = &["process.env", "import.meta.env"];

pub struct EcmaScriptAnalyzer {
    grammar: Grammar,
    id: &'static str,
    extensions: &'static [&'static str],
}

impl EcmaScriptAnalyzer {
    pub fn javascript() -> Self {
        Self {
            grammar: tree_sitter_javascript::LANGUAGE.into(),
            id: "javascript",
            extensions: &["js", "jsx", "mjs", "cjs"],
        }
    }

    pub fn typescript() -> Self {
        Self {
            grammar: tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
            id: "typescript",
            extensions: &["ts", "mts", "cts"],
        }
    }

    pub fn tsx() -> Self {
        Self {
            grammar: tree_sitter_typescript::LANGUAGE_TSX.into(),
            id: "tsx",
            extensions: &["tsx"],
        }
    }
}

impl LanguageAnalyzer for EcmaScriptAnalyzer {
    fn language_id(&self) -> &'static str {
        self.id
    }

    fn file_extensions(&self) -> &'static [&'static str] {
        self.extensions
    }

    fn parse(&self, path: &Path, source: &[u8]) -> anyhow::Result<ParsedFile> {
        parse_with(&self.grammar, path, source)
    }

    fn extract_findings(
        &self,
        parsed: &ParsedFile,
        options: &AnalysisOptions,
    ) -> anyhow::Result<Findings> {
        let mut collector = Collector {
            parsed,
            findings: Findings::empty(&parsed.path, self.id),
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

        let server_context = has_server_context(&findings.imports, parsed.source_str(), &options.aliases);
        let framework = options.aliases.server_framework(&findings.imports);
        findings.apis.extend(resolve_candidates(
            &candidates,
            server_context,
            framework.as_deref(),
            &options.aliases,
        ));
        reconcile_directions(&mut findings);
        findings.test_framework = detect_test_framework(parsed.source_str(), self.id);
        findings.finalize();

        Ok(findings)
    }
}

impl Default for EcmaScriptAnalyzer {
    fn default() -> Self {
        Self::javascript()
    }
}

/// Single-pass visitor state.
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
            "function_declaration" | "generator_function_declaration" => {
                self.function(node, node, DeclarationKind::Function);
            }
            "method_definition" => {
                self.function(node, node, DeclarationKind::Method);
            }
            "variable_declarator" => self.variable_declarator(node),
            "public_field_definition" | "field_definition" => self.class_field(node),
            "class_declaration" | "class" | "abstract_class_declaration" => self.class(node),
            "interface_declaration" => self.type_definition(node, DeclarationKind::Interface),
            "type_alias_declaration" => self.type_definition(node, DeclarationKind::TypeAlias),
            "enum_declaration" => self.type_definition(node, DeclarationKind::Enum),
            "call_expression" => self.call(node),
            "throw_statement" => self.throw(node),
            "member_expression" => self.env_member(node),
            "subscript_expression" => self.env_subscript(node),
            "import_statement" => {
                if let Some(source) = node.child_by_field_name("source") {
                    self.import(source);
                }
            }
            "string" | "template_string" => {
                let line = syntax::start_line(node);
                let text = unquote(self.text(node));
                record_sql_tables(&mut self.findings, &text, line);
            }
            _ => {}
        }
        Visit::Continue
    }

    /// Record a function-like declaration. `name_node` carries the name,
    /// `func` the parameters and body.
    fn function(&mut self, name_node: Node, func: Node, kind: DeclarationKind) {
        let Some(name) = field_text(name_node, "name", self.parsed)
            .or_else(|| field_text(name_node, "property", self.parsed))
        else {
            return;
        };
        let mut decl = Declaration::new(name, kind, Span::from_node(name_node));
        decl.is_async = self.text(func).trim_start().starts_with("async");
        decl.parameters = self.parameters(func);
        decl.return_type = self.return_type(name_node, func, decl.is_async);
        self.findings.declarations.push(decl);
    }

    fn variable_declarator(&mut self, node: Node) {
        let Some(name_node) = node.child_by_field_name("name") else {
            return;
        };
        if let Some(value) = node.child_by_field_name("value") {
            if is_function_value(value.kind()) {
                self.function(node, value, DeclarationKind::Function);
                return;
            }
        }
        if name_node.kind() != "identifier" {
            return;
        }
        let mut decl = Declaration::new(
            self.text(name_node),
            DeclarationKind::Variable,
            Span::from_node(node),
        );
        decl.value_type = node
            .child_by_field_name("type")
            .and_then(|t| type_text(t, self.parsed))
            .or_else(|| {
                node.child_by_field_name("value")
                    .and_then(|v| literal_type(v.kind()))
                    .map(str::to_string)
            });
        self.findings.declarations.push(decl);
    }

    /// Class fields holding functions are methods (`handle = () => {}`).
    fn class_field(&mut self, node: Node) {
        if let Some(value) = node.child_by_field_name("value") {
            if is_function_value(value.kind()) {
                self.function(node, value, DeclarationKind::Method);
            }
        }
    }

    fn class(&mut self, node: Node) {
        let Some(name) = field_text(node, "name", self.parsed) else {
            return;
        };
        let mut decl = Declaration::new(name, DeclarationKind::Class, Span::from_node(node));
        decl.bases = named_children(node)
            .into_iter()
            .filter(|c| c.kind() == "class_heritage")
            .flat_map(|c| split_bases(self.text(c)))
            .collect();
        self.findings.declarations.push(decl);
    }

    fn type_definition(&mut self, node: Node, kind: DeclarationKind) {
        if let Some(name) = field_text(node, "name", self.parsed) {
            self.findings
                .declarations
                .push(Declaration::new(name, kind, Span::from_node(node)));
        }
    }

    fn parameters(&self, func: Node) -> Vec<Parameter> {
        if let Some(single) = func.child_by_field_name("parameter") {
            return vec![Parameter {
                name: self.text(single).to_string(),
                type_name: None,
            }];
        }
        let Some(params) = func.child_by_field_name("parameters") else {
            return Vec::new();
        };
        named_children(params)
            .into_iter()
            .map(|param| {
                let name_node = param
                    .child_by_field_name("pattern")
                    .or_else(|| param.child_by_field_name("left"))
                    .unwrap_or(param);
                Parameter {
                    name: self.text(name_node).to_string(),
                    type_name: param
                        .child_by_field_name("type")
                        .and_then(|t| type_text(t, self.parsed)),
                }
            })
            .collect()
    }

    /// Annotated type, then JSDoc `@returns`, then the shape of an arrow
    /// function's expression body, then `Promise` for async functions.
    fn return_type(&self, decl: Node, func: Node, is_async: bool) -> Option<String> {
        if let Some(annotated) = func
            .child_by_field_name("return_type")
            .and_then(|t| type_text(t, self.parsed))
        {
            return Some(annotated);
        }
        if let Some(documented) =
            preceding_comment(decl, self.parsed).and_then(|doc| doc_return_type(&doc))
        {
            return Some(documented);
        }
        if func.kind() == "arrow_function" {
            if let Some(body) = func.child_by_field_name("body") {
                let inferred = match body.kind() {
                    "new_expression" => field_text(body, "constructor", self.parsed),
                    "parenthesized_expression" => body
                        .named_child(0)
                        .and_then(|inner| literal_type(inner.kind()))
                        .map(str::to_string),
                    kind => literal_type(kind).map(str::to_string),
                };
                if let Some(inferred) = inferred {
                    return Some(if is_async {
                        format!("Promise<{}>", inferred)
                    } else {
                        inferred
                    });
                }
            }
        }
        if is_async {
            return Some("Promise".to_string());
        }
        None
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

        match function.kind() {
            "member_expression" => {
                let receiver = field_text(function, "object", self.parsed).unwrap_or_default();
                let method = field_text(function, "property", self.parsed).unwrap_or_default();
                let literal = args.and_then(|a| first_string_argument(a, self.parsed, STRING_KINDS));

                if let (Some(_), Some(literal)) = (http_method(&method), literal.clone()) {
                    self.candidates.push(ApiCandidate {
                        receiver: receiver.clone(),
                        method: method.clone(),
                        literal,
                        line,
                    });
                }
                if method == "error" && is_logger(&receiver) {
                    if let Some(message) = literal {
                        self.findings.errors.push(ErrorEmission {
                            message,
                            line,
                            kind: ErrorKind::Logged,
                            error_type: None,
                        });
                    }
                }
            }
            "identifier" => match callee {
                "fetch" => {
                    if let Some(url) = args.and_then(|a| first_string_argument(a, self.parsed, STRING_KINDS)) {
                        let method = args
                            .and_then(|a| self.fetch_method(a))
                            .unwrap_or_else(|| "get".to_string());
                        self.candidates.push(ApiCandidate {
                            receiver: "fetch".to_string(),
                            method,
                            literal: url,
                            line,
                        });
                    }
                }
                "require" => {
                    if let Some(arg) = args.and_then(first_argument) {
                        self.import(arg);
                    }
                }
                "describe" | "it" | "test" => {
                    if let Some(name) = args.and_then(|a| first_string_argument(a, self.parsed, STRING_KINDS)) {
                        self.findings.tests.push(TestCase {
                            name,
                            span: Span::from_node(node),
                        });
                    }
                }
                _ => {}
            },
            _ => {}
        }
    }

    /// `method` property of a `fetch(url, { method: "POST" })` options object.
    fn fetch_method(&self, args: Node) -> Option<String> {
        let options = named_children(args).into_iter().nth(1)?;
        if options.kind() != "object" {
            return None;
        }
        named_children(options)
            .into_iter()
            .filter(|pair| pair.kind() == "pair")
            .find(|pair| {
                field_text(*pair, "key", self.parsed)
                    .map(|k| k.trim_matches(|c| c == '"' || c == '\'') == "method")
                    .unwrap_or(false)
            })
            .and_then(|pair| pair.child_by_field_name("value"))
            .and_then(|value| string_value(value, self.parsed, STRING_KINDS))
            .map(|m| m.to_lowercase())
    }

    fn throw(&mut self, node: Node) {
        let Some(thrown) = named_children(node).into_iter().next() else {
            return;
        };
        let line = syntax::start_line(node);
        match thrown.kind() {
            "new_expression" => {
                let message = thrown
                    .child_by_field_name("arguments")
                    .and_then(|a| first_string_argument(a, self.parsed, STRING_KINDS));
                if let Some(message) = message {
                    self.findings.errors.push(ErrorEmission {
                        message,
                        line,
                        kind: ErrorKind::Thrown,
                        error_type: field_text(thrown, "constructor", self.parsed),
                    });
                }
            }
            _ => {
                if let Some(message) = string_value(thrown, self.parsed, STRING_KINDS) {
                    self.findings.errors.push(ErrorEmission {
                        message,
                        line,
                        kind: ErrorKind::Thrown,
                        error_type: None,
                    });
                }
            }
        }
    }

    /// `process.env.KEY`
    fn env_member(&mut self, node: Node) {
        let Some(object) = node.child_by_field_name("object") else {
            return;
        };
        if !ENV_OBJECTS.contains(&self.text(object)) {
            return;
        }
        if let Some(key) = field_text(node, "property", self.parsed) {
            self.findings.config_reads.push(ConfigRead {
                key,
                line: syntax::start_line(node),
                source: "env",
            });
        }
    }

    /// `process.env["KEY"]`
    fn env_subscript(&mut self, node: Node) {
        let Some(object) = node.child_by_field_name("object") else {
            return;
        };
        if !ENV_OBJECTS.contains(&self.text(object)) {
            return;
        }
        let key = node
            .child_by_field_name("index")
            .and_then(|i| string_value(i, self.parsed, STRING_KINDS));
        if let Some(key) = key {
            self.findings.config_reads.push(ConfigRead {
                key,
                line: syntax::start_line(node),
                source: "env",
            });
        }
    }

    fn import(&mut self, source: Node) {
        if let Some(module) = string_value(source, self.parsed, STRING_KINDS) {
            self.findings.imports.push(Import {
                source: module,
                line: syntax::start_line(source),
            });
        }
    }
}

fn is_function_value(kind: &str) -> bool {
    matches!(
        kind,
        "arrow_function" | "function_expression" | "function" | "generator_function"
    )
}

fn is_logger(receiver: &str) -> bool {
    let last = crate::analysis::simple_name(receiver).to_lowercase();
    LOGGER_NAMES.contains(&last.as_str())
}
