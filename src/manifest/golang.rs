//! go.mod require directives.

use super::DeclaredPackage;

/// Parse a require entry: `github.com/gin-gonic/gin v1.9.1 // indirect`.
fn parse_require_line(line: &str) -> Option<DeclaredPackage> {
    let (spec, comment) = match line.split_once("//") {
        Some((spec, comment)) => (spec, comment),
        None => (line, ""),
    };
    let parts: Vec<&str> = spec.split_whitespace().collect();
    let module = parts.first()?;
    let scope = if comment.trim() == "indirect" {
        "indirect"
    } else {
        "runtime"
    };
    Some(DeclaredPackage::new(
        *module,
        parts.get(1).map(|v| v.to_string()),
        scope,
    ))
}

pub fn parse_go_mod(content: &str) -> Vec<DeclaredPackage> {
    let mut packages = Vec::new();
    let mut in_require_block = false;

    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with("//") {
            continue;
        }

        if line == "require (" {
            in_require_block = true;
            continue;
        }
        if line == ")" {
            in_require_block = false;
            continue;
        }

        if in_require_block {
            packages.extend(parse_require_line(line));
        } else if let Some(rest) = line.strip_prefix("require ") {
            if !rest.contains('(') {
                packages.extend(parse_require_line(rest));
            }
        }
    }

    packages
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_go_mod() {
        let content = r#"
module example.com/orders

go 1.21

require github.com/google/uuid v1.4.0

require (
    github.com/gin-gonic/gin v1.9.1
    golang.org/x/net v0.17.0 // indirect
)

replace example.com/shared => ../shared
"#;
        let packages = parse_go_mod(content);
        assert_eq!(packages.len(), 3);
        assert_eq!(packages[0].name, "github.com/google/uuid");
        assert_eq!(packages[0].version.as_deref(), Some("v1.4.0"));
        assert_eq!(packages[1].scope, "runtime");
        assert_eq!(packages[2].scope, "indirect");
    }
}
