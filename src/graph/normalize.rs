//! API path normalization and path matching.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref SCHEME: Regex = Regex::new(r"^[A-Za-z][A-Za-z0-9+.\-]*://").unwrap();
    static ref TEMPLATE_SEGMENT: Regex = Regex::new(r"^(?::[^/]+|\{[^/}]+\})$").unwrap();
}

/// Reduce a path or URL to its canonical form.
///
/// Drops the scheme and host, the query string and fragment, empty
/// segments and segments still holding a `${...}` placeholder. The result
/// always starts with `/` and has no trailing slash. Applying it twice
/// gives the same result as applying it once.
pub fn normalize_path(raw: &str) -> String {
    let trimmed = raw.trim();
    let without_host = if let Some(m) = SCHEME.find(trimmed) {
        strip_host(&trimmed[m.end()..])
    } else if let Some(rest) = trimmed.strip_prefix("//") {
        strip_host(rest)
    } else {
        trimmed
    };
    let path = without_host
        .split(|c| c == '?' || c == '#')
        .next()
        .unwrap_or("");

    let segments: Vec<&str> = path
        .split('/')
        .filter(|s| !s.is_empty() && !s.contains("${"))
        .collect();
    format!("/{}", segments.join("/"))
}

fn strip_host(rest: &str) -> &str {
    match rest.find('/') {
        Some(i) => &rest[i..],
        None => "",
    }
}

/// Upper-case HTTP method; absent or blank means GET.
pub fn normalize_method(method: Option<&str>) -> String {
    match method.map(str::trim).filter(|m| !m.is_empty()) {
        Some(m) => m.to_uppercase(),
        None => "GET".to_string(),
    }
}

/// How a consumed path matched a provided path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathMatch {
    Exact,
    Contains,
    Template,
}

impl PathMatch {
    pub fn as_str(&self) -> &'static str {
        match self {
            PathMatch::Exact => "exact",
            PathMatch::Contains => "contains",
            PathMatch::Template => "template",
        }
    }
}

/// Anchored regex for a provided path, with `:param` and `{param}`
/// segments matching exactly one segment. None when the path has no
/// parameter segments.
pub fn path_template(provided: &str) -> Option<Regex> {
    let mut has_params = false;
    let pattern: Vec<String> = provided
        .split('/')
        .map(|segment| {
            if TEMPLATE_SEGMENT.is_match(segment) {
                has_params = true;
                "[^/]+".to_string()
            } else {
                regex::escape(segment)
            }
        })
        .collect();
    if !has_params {
        return None;
    }
    Regex::new(&format!("^{}$", pattern.join("/"))).ok()
}

/// Match two normalized paths: exact, then containment, then template.
pub fn match_paths(consumed: &str, provided: &str) -> Option<PathMatch> {
    if consumed == provided {
        return Some(PathMatch::Exact);
    }
    if provided.len() > 1 && consumed.contains(provided) {
        return Some(PathMatch::Contains);
    }
    match path_template(provided) {
        Some(template) if template.is_match(consumed) => Some(PathMatch::Template),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_strips_host_query_fragment() {
        assert_eq!(normalize_path("https://api.example.com/users"), "/users");
        assert_eq!(normalize_path("http://host:8080/a/b?x=1#top"), "/a/b");
        assert_eq!(normalize_path("//cdn.example.com/assets/"), "/assets");
        assert_eq!(normalize_path("https://api.example.com"), "/");
        assert_eq!(normalize_path(""), "/");
    }

    #[test]
    fn test_normalize_collapses_slashes_and_placeholders() {
        assert_eq!(normalize_path("/users//42/"), "/users/42");
        assert_eq!(normalize_path("users"), "/users");
        assert_eq!(normalize_path("/users/${id}/posts"), "/users/posts");
        assert_eq!(normalize_path("/users/:id"), "/users/:id");
        assert_eq!(normalize_path("/users/{id}"), "/users/{id}");
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let inputs = [
            "https://api.example.com/users?x=1",
            "//host/a//b/",
            "/orders/:id",
            "relative/path#frag",
            "http:/odd",
            "ftp://files.example.com",
            "/a/${x}/b",
            "",
            "?only=query",
        ];
        for input in inputs {
            let once = normalize_path(input);
            assert_eq!(normalize_path(&once), once, "input {:?}", input);
        }
    }

    #[test]
    fn test_normalize_method() {
        assert_eq!(normalize_method(None), "GET");
        assert_eq!(normalize_method(Some("")), "GET");
        assert_eq!(normalize_method(Some("post")), "POST");
    }

    #[test]
    fn test_match_paths() {
        assert_eq!(match_paths("/users", "/users"), Some(PathMatch::Exact));
        assert_eq!(
            match_paths("/api/v1/users", "/users"),
            Some(PathMatch::Contains)
        );
        assert_eq!(
            match_paths("/users/42", "/users/:id"),
            Some(PathMatch::Template)
        );
        assert_eq!(
            match_paths("/users/42", "/users/{id}"),
            Some(PathMatch::Template)
        );
        assert_eq!(match_paths("/users/42/posts", "/users/:id"), None);
        assert_eq!(match_paths("/orders", "/users"), None);
        // the root path never matches by containment
        assert_eq!(match_paths("/users", "/"), None);
    }

    #[test]
    fn test_path_template_escapes_literals() {
        assert!(path_template("/a.b").is_none());
        let template = path_template("/files/:name/v1.0").unwrap();
        assert!(template.is_match("/files/x/v1.0"));
        assert!(!template.is_match("/files/x/v1x0"));
    }
}
