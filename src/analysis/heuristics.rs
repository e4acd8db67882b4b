//! Lexical heuristics shared by the analyzers.
//!
//! These work on source or literal text rather than on the tree: test
//! framework detection, SQL table extraction, doc-comment return types and
//! literal-shape type inference.

use lazy_static::lazy_static;
use regex::Regex;

const ECMASCRIPT: &[&str] = &["javascript", "typescript", "tsx"];
const PYTHON: &[&str] = &["python"];
const JAVA: &[&str] = &["java"];
const CSHARP: &[&str] = &["csharp"];

lazy_static! {
    /// Known test frameworks, checked in order. The first match wins.
    static ref TEST_FRAMEWORKS: Vec<(&'static str, &'static [&'static str], Regex)> = vec![
        ("vitest", ECMASCRIPT, Regex::new(r#"['"]vitest['"]"#).unwrap()),
        ("jest", ECMASCRIPT, Regex::new(r"\bjest\.|@jest/|@testing-library/").unwrap()),
        ("mocha", ECMASCRIPT, Regex::new(r#"['"]mocha['"]|\bchai\b"#).unwrap()),
        ("jasmine", ECMASCRIPT, Regex::new(r"\bjasmine\.").unwrap()),
        ("playwright", ECMASCRIPT, Regex::new(r"@playwright/test").unwrap()),
        ("cypress", ECMASCRIPT, Regex::new(r"\bcy\.(visit|get|request)\(").unwrap()),
        ("pytest", PYTHON, Regex::new(r"(?m)^\s*(import pytest|from pytest)|@pytest\.").unwrap()),
        ("unittest", PYTHON, Regex::new(r"(?m)^\s*(import unittest|from unittest)").unwrap()),
        ("junit", JAVA, Regex::new(r"\borg\.junit\b").unwrap()),
        ("testng", JAVA, Regex::new(r"\borg\.testng\b").unwrap()),
        ("xunit", CSHARP, Regex::new(r"\busing Xunit\b|\[Fact\]|\[Theory\]").unwrap()),
        ("nunit", CSHARP, Regex::new(r"\bNUnit\.Framework\b|\[TestCase\b").unwrap()),
        ("mstest", CSHARP, Regex::new(r"\[TestMethod\]|\[TestClass\]").unwrap()),
    ];

    /// `describe(`/`it(`/`test(` blocks without a recognizable framework import.
    static ref BDD_BLOCKS: Regex = Regex::new(r"(?m)^\s*(describe|it|test)\s*\(").unwrap();

    /// Statement shapes that mark a literal as SQL.
    static ref SQL_SHAPE: Regex = Regex::new(
        r"(?is)^\s*(select\b.+\bfrom\b|insert\s+into\b|update\s+\S+\s+set\b|delete\s+from\b|create\s+table\b|alter\s+table\b|drop\s+table\b|truncate\s+table\b|with\s+\w+\s+as\s*\()"
    ).unwrap();

    static ref SQL_TABLE: Regex = Regex::new(
        r"(?i)\b(from|join|into|update|table)\s+([A-Za-z_][A-Za-z0-9_]*(?:\.[A-Za-z_][A-Za-z0-9_]*)?)"
    ).unwrap();

    static ref JSDOC_RETURNS: Regex = Regex::new(r"@returns?\s*\{([^}]+)\}").unwrap();
    static ref RTYPE: Regex = Regex::new(r":rtype:\s*([^\n]+)").unwrap();
    static ref CSHARP_RETURNS_CREF: Regex = Regex::new(r#"<returns>\s*<see\s+cref="([^"]+)""#).unwrap();
}

/// Words that follow FROM/JOIN in SQL but are not table names.
const SQL_NON_TABLES: &[&str] = &[
    "select", "where", "set", "values", "lateral", "unnest", "only", "exists", "if", "not",
];

/// Detect a test framework from lexical markers in the source.
pub fn detect_test_framework(source: &str, language: &str) -> Option<String> {
    for (name, languages, pattern) in TEST_FRAMEWORKS.iter() {
        if languages.contains(&language) && pattern.is_match(source) {
            return Some(name.to_string());
        }
    }
    let is_ecmascript = matches!(language, "javascript" | "typescript" | "tsx");
    if is_ecmascript && BDD_BLOCKS.is_match(source) {
        return Some("bdd".to_string());
    }
    None
}

/// Whether a string literal looks like a SQL statement.
pub fn looks_like_sql(text: &str) -> bool {
    SQL_SHAPE.is_match(text)
}

/// Tables referenced by a SQL string as `(operation, table)` pairs.
///
/// Returns nothing for text that does not look like SQL.
pub fn sql_tables(text: &str) -> Vec<(String, String)> {
    if !looks_like_sql(text) {
        return Vec::new();
    }
    let operation = text
        .split_whitespace()
        .next()
        .map(|w| w.to_uppercase())
        .unwrap_or_default();

    let mut tables: Vec<(String, String)> = Vec::new();
    for caps in SQL_TABLE.captures_iter(text) {
        let table = caps[2].to_string();
        if SQL_NON_TABLES.contains(&table.to_lowercase().as_str()) {
            continue;
        }
        if !tables.iter().any(|(_, t)| t.eq_ignore_ascii_case(&table)) {
            tables.push((operation.clone(), table));
        }
    }
    tables
}

/// Return type declared in a doc comment (`@returns {T}`, `:rtype: T`,
/// `<returns><see cref="T"/>`).
pub fn doc_return_type(doc: &str) -> Option<String> {
    JSDOC_RETURNS
        .captures(doc)
        .or_else(|| RTYPE.captures(doc))
        .or_else(|| CSHARP_RETURNS_CREF.captures(doc))
        .map(|caps| caps[1].trim().to_string())
        .filter(|t| !t.is_empty())
}

/// Coarse type of an expression from its node kind.
pub fn literal_type(kind: &str) -> Option<&'static str> {
    match kind {
        "string" | "template_string" | "string_literal" | "concatenated_string" => Some("string"),
        "number" | "integer" | "float" | "decimal_integer_literal" | "integer_literal"
        | "real_literal" => Some("number"),
        "true" | "false" | "boolean_literal" => Some("boolean"),
        "array" | "list" | "array_creation_expression" => Some("array"),
        "object" | "dictionary" => Some("object"),
        "null" | "undefined" | "none" | "null_literal" => Some("null"),
        "arrow_function" | "function_expression" | "function" | "lambda"
        | "lambda_expression" => Some("function"),
        "jsx_element" | "jsx_self_closing_element" | "jsx_fragment" => Some("JSX.Element"),
        "await_expression" => Some("Promise"),
        _ => None,
    }
}

/// Convert `UserAccount` or `userAccount` to `user_account`.
pub fn to_snake_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    let chars: Vec<char> = name.chars().collect();
    for (i, c) in chars.iter().enumerate() {
        if c.is_uppercase() {
            let prev_lower = i > 0 && (chars[i - 1].is_lowercase() || chars[i - 1].is_ascii_digit());
            let next_lower = chars.get(i + 1).map(|n| n.is_lowercase()).unwrap_or(false);
            if i > 0 && (prev_lower || (next_lower && chars[i - 1].is_uppercase())) {
                out.push('_');
            }
            out.extend(c.to_lowercase());
        } else {
            out.push(*c);
        }
    }
    out
}

/// Lower-case the first character: `Username` -> `username`.
pub fn lower_first(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Strip quotes and string prefixes from a literal's source text.
///
/// Handles `'x'`, `"x"`, `` `x` ``, `"""x"""`, Python prefixes (`f"x"`,
/// `rb'x'`) and C# `@"x"` / `$"x"`. Python f-string and C# interpolation
/// holes (`{expr}`) are removed.
pub fn unquote(raw: &str) -> String {
    let raw = raw.trim();
    let prefix_len = raw
        .find(|c: char| c == '"' || c == '\'' || c == '`')
        .unwrap_or(0);
    let (prefix, rest) = raw.split_at(prefix_len);
    if !prefix
        .chars()
        .all(|c| matches!(c.to_ascii_lowercase(), 'f' | 'r' | 'b' | 'u' | '@' | '$'))
    {
        return raw.to_string();
    }

    let body = ["\"\"\"", "'''", "\"", "'", "`"]
        .iter()
        .find_map(|q| {
            rest.strip_prefix(q)
                .map(|inner| inner.strip_suffix(q).unwrap_or(inner))
        })
        .unwrap_or(rest);

    let interpolated = prefix.to_ascii_lowercase().contains('f') || prefix.contains('$');
    if interpolated {
        strip_braced(body)
    } else {
        body.to_string()
    }
}

/// Remove `{...}` interpolation holes.
fn strip_braced(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut depth = 0usize;
    for c in text.chars() {
        match c {
            '{' => depth += 1,
            '}' if depth > 0 => depth -= 1,
            _ if depth == 0 => out.push(c),
            _ => {}
        }
    }
    out
}
