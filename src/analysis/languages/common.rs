//! Node helpers shared by the analyzers.

use tree_sitter::Node;

use crate::analysis::heuristics::{sql_tables, unquote};
use crate::analysis::{Findings, ParsedFile, TableRef};

/// Named children of a node, skipping comments.
pub fn named_children(node: Node) -> Vec<Node> {
    (0..node.named_child_count())
        .filter_map(|i| node.named_child(i))
        .filter(|c| !c.kind().contains("comment"))
        .collect()
}

/// Text of a named field, if present.
pub fn field_text(node: Node, field: &str, parsed: &ParsedFile) -> Option<String> {
    node.child_by_field_name(field)
        .map(|n| parsed.node_text(n).to_string())
        .filter(|t| !t.is_empty())
}

/// A type annotation without its leading `:` or `->`.
pub fn type_text(node: Node, parsed: &ParsedFile) -> Option<String> {
    let text = parsed.node_text(node).trim();
    let text = text
        .strip_prefix("->")
        .or_else(|| text.strip_prefix(':'))
        .unwrap_or(text)
        .trim();
    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}

/// Literal value of a string node, unquoted.
pub fn string_value(node: Node, parsed: &ParsedFile, kinds: &[&str]) -> Option<String> {
    if kinds.contains(&node.kind()) {
        Some(unquote(parsed.node_text(node)))
    } else {
        None
    }
}

/// First positional argument of an argument list.
pub fn first_argument(args: Node) -> Option<Node> {
    let first = named_children(args).into_iter().next()?;
    // C# wraps each argument in an `argument` node
    if first.kind() == "argument" {
        return first.named_child(0).or(Some(first));
    }
    Some(first)
}

/// String value of the first argument, if it is a string literal.
pub fn first_string_argument(args: Node, parsed: &ParsedFile, kinds: &[&str]) -> Option<String> {
    first_argument(args).and_then(|arg| string_value(arg, parsed, kinds))
}

/// Doc comment directly above a declaration.
///
/// Looks through export/decorator wrappers so `export function f` and
/// `const f = () => ...` both find the comment above the statement.
pub fn preceding_comment(node: Node, parsed: &ParsedFile) -> Option<String> {
    let mut anchor = node;
    while let Some(parent) = anchor.parent() {
        let wraps = matches!(
            parent.kind(),
            "export_statement" | "lexical_declaration" | "variable_declaration" | "decorated_definition"
        );
        if !wraps {
            break;
        }
        anchor = parent;
    }

    let mut lines = Vec::new();
    let mut current = anchor.prev_sibling();
    while let Some(sibling) = current {
        if !sibling.kind().contains("comment") {
            break;
        }
        lines.push(parsed.node_text(sibling).to_string());
        current = sibling.prev_sibling();
    }
    if lines.is_empty() {
        return None;
    }
    lines.reverse();
    Some(lines.join("\n"))
}

/// Record SQL table references found in a string literal.
pub fn record_sql_tables(findings: &mut Findings, text: &str, line: usize) {
    for (operation, table) in sql_tables(text) {
        findings.tables.push(TableRef {
            table,
            line,
            operation: Some(operation),
        });
    }
}

/// Nearest ancestor whose kind is one of `kinds`.
pub fn ancestor<'t>(node: Node<'t>, kinds: &[&str]) -> Option<Node<'t>> {
    let mut current = node.parent();
    while let Some(parent) = current {
        if kinds.contains(&parent.kind()) {
            return Some(parent);
        }
        current = parent.parent();
    }
    None
}

/// Join a controller prefix and a handler route into one absolute path.
pub fn join_route(prefix: &str, path: &str) -> String {
    let segments: Vec<&str> = [prefix, path]
        .iter()
        .map(|part| part.trim().trim_matches('/'))
        .filter(|part| !part.is_empty())
        .collect();
    format!("/{}", segments.join("/"))
}

/// Split a heritage clause such as `extends Base implements A, B<T>` into names.
pub fn split_bases(text: &str) -> Vec<String> {
    let mut bases = Vec::new();
    let mut depth = 0usize;
    let mut current = String::new();
    for c in text.chars() {
        match c {
            '<' | '[' => {
                depth += 1;
                continue;
            }
            '>' | ']' if depth > 0 => {
                depth -= 1;
                continue;
            }
            _ => {}
        }
        if depth > 0 {
            continue;
        }
        if c == ',' || c == '(' || c == ')' || c == ':' || c.is_whitespace() {
            push_base(&mut bases, &mut current);
        } else {
            current.push(c);
        }
    }
    push_base(&mut bases, &mut current);
    bases
}

fn push_base(bases: &mut Vec<String>, current: &mut String) {
    let word = std::mem::take(current);
    if word.is_empty()
        || word.contains('=')
        || matches!(word.as_str(), "extends" | "implements" | "with")
    {
        return;
    }
    if !bases.contains(&word) {
        bases.push(word);
    }
}
