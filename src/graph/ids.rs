//! Stable entity ids.
//!
//! An id is the hex SHA-256 of its identity parts joined by a unit
//! separator, so ids are reproducible across runs and machines.

use sha2::{Digest, Sha256};

use super::EntityId;
use crate::analysis::{Direction, Span};

const SEPARATOR: &[u8] = "\u{1f}".as_bytes();

/// Hash identity parts into an id.
pub fn stable_id(parts: &[&str]) -> EntityId {
    let mut hasher = Sha256::new();
    for (i, part) in parts.iter().enumerate() {
        if i > 0 {
            hasher.update(SEPARATOR);
        }
        hasher.update(part.as_bytes());
    }
    format!("{:x}", hasher.finalize())
}

pub fn repository_id(repo_root: &str) -> EntityId {
    stable_id(&["Repository", repo_root])
}

pub fn file_id(repo_root: &str, file: &str) -> EntityId {
    stable_id(&[repo_root, "File", file])
}

/// Id of a span-located entity (class, function, variable, test...).
pub fn declaration_id(repo_root: &str, kind: &str, file: &str, name: &str, span: Span) -> EntityId {
    let start = span.start_line.to_string();
    let end = span.end_line.to_string();
    stable_id(&[repo_root, kind, file, name, &start, &end])
}

/// Id of an API endpoint. Independent of the file so that call sites of the
/// same endpoint in one repository collapse into one entity.
pub fn api_id(repo_root: &str, direction: Direction, method: &str, path: &str) -> EntityId {
    stable_id(&[repo_root, "API", direction.as_str(), method, path])
}

/// Package ids are global: the same package is shared across repositories.
pub fn package_id(manager: &str, name: &str) -> EntityId {
    stable_id(&["Package", manager, name])
}

/// Table names are case-insensitive.
pub fn table_id(repo_root: &str, table: &str) -> EntityId {
    stable_id(&[repo_root, "DatabaseTable", &table.to_lowercase()])
}

pub fn column_id(repo_root: &str, table: &str, column: &str) -> EntityId {
    stable_id(&[
        repo_root,
        "DatabaseColumn",
        &table.to_lowercase(),
        &column.to_lowercase(),
    ])
}

pub fn config_id(repo_root: &str, key: &str) -> EntityId {
    stable_id(&[repo_root, "Config", key])
}

pub fn error_id(repo_root: &str, file: &str, message: &str, line: usize) -> EntityId {
    stable_id(&[repo_root, "ErrorMessage", file, message, &line.to_string()])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stable_id_is_deterministic() {
        assert_eq!(stable_id(&["a", "b"]), stable_id(&["a", "b"]));
        assert_eq!(stable_id(&["a"]).len(), 64);
    }

    #[test]
    fn test_stable_id_separates_parts() {
        assert_ne!(stable_id(&["ab", "c"]), stable_id(&["a", "bc"]));
    }

    #[test]
    fn test_ids_are_scoped() {
        assert_ne!(file_id("/r1", "a.py"), file_id("/r2", "a.py"));
        assert_eq!(package_id("npm", "axios"), package_id("npm", "axios"));
        assert_ne!(package_id("npm", "axios"), package_id("pypi", "axios"));
        assert_eq!(table_id("/r", "Users"), table_id("/r", "users"));
        assert_ne!(
            api_id("/r", Direction::Provided, "GET", "/users"),
            api_id("/r", Direction::Consumed, "GET", "/users")
        );
        assert_ne!(
            declaration_id("/r", "Function", "a.py", "f", Span::new(1, 2)),
            declaration_id("/r", "Function", "a.py", "f", Span::new(1, 3))
        );
    }
}
