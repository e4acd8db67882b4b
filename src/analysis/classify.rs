//! API call-site direction classification.
//!
//! Direction is decided from data-driven alias tables, never guessed:
//!
//! 1. receiver is a known HTTP client alias: consumed
//! 2. receiver is a known server alias, the file has server context and the
//!    target is not a full URL: provided
//! 3. target is a full URL: consumed
//! 4. otherwise the call is skipped
//!
//! The built-in tables can be extended from configuration.

use lazy_static::lazy_static;
use phf::phf_set;
use regex::Regex;
use tracing::debug;

use super::{ApiCall, Direction, Findings, Import};

/// HTTP verbs recognized as `receiver.verb(...)` call shapes.
pub const HTTP_METHODS: &[&str] = &["get", "post", "put", "delete", "patch"];

/// Known HTTP client identifiers.
static CLIENT_ALIASES: phf::Set<&'static str> = phf_set! {
    "axios",
    "http",
    "https",
    "fetch",
    "request",
    "client",
    "superagent",
    "got",
    "ky",
    "api",
    "$http",
    "requests",
    "httpx",
    "urllib",
    "resttemplate",
    "webclient",
    "okhttp",
};

/// Known server-framework receivers.
static SERVER_ALIASES: phf::Set<&'static str> = phf_set! {
    "app",
    "router",
    "server",
    "fastify",
    "api_router",
    "apirouter",
    "blueprint",
    "bp",
    "routes",
    "koa",
    "hapi",
    "restify",
};

/// Module names whose import marks a file as server-side.
static SERVER_MODULES: phf::Set<&'static str> = phf_set! {
    "express",
    "fastify",
    "koa",
    "koa-router",
    "@koa/router",
    "@hapi/hapi",
    "restify",
    "@nestjs/common",
    "flask",
    "fastapi",
    "django",
    "sanic",
    "bottle",
    "starlette",
    "tornado",
    "aiohttp.web",
    "org.springframework.web",
    "javax.ws.rs",
    "jakarta.ws.rs",
    "microsoft.aspnetcore",
};

/// Aliases shorter than this only match a whole receiver segment.
const MIN_CONTAINED_ALIAS_LEN: usize = 4;

lazy_static! {
    static ref PLACEHOLDER: Regex = Regex::new(r"\$\{[^}]*\}").unwrap();

    /// Server construction calls that establish context without an import.
    static ref SERVER_USAGE: Regex = Regex::new(
        r"\b(express|fastify|Fastify|Koa|Hapi\.server|restify\.createServer|Flask|FastAPI|WebApplication\.CreateBuilder)\s*\("
    ).unwrap();
}

/// Alias tables: the built-in sets plus configured extensions.
#[derive(Debug, Clone, Default)]
pub struct ApiAliases {
    extra_client: Vec<String>,
    extra_server: Vec<String>,
    extra_modules: Vec<String>,
}

impl ApiAliases {
    /// Extend the built-in tables. Entries are compared case-insensitively.
    pub fn with_extensions(client: &[String], server: &[String], modules: &[String]) -> Self {
        let lower = |items: &[String]| items.iter().map(|s| s.to_lowercase()).collect();
        Self {
            extra_client: lower(client),
            extra_server: lower(server),
            extra_modules: lower(modules),
        }
    }

    fn client_entries(&self) -> impl Iterator<Item = &str> + '_ {
        CLIENT_ALIASES
            .iter()
            .map(|s| &**s)
            .chain(self.extra_client.iter().map(String::as_str))
    }

    /// The client alias matched by a receiver expression, if any.
    ///
    /// Long aliases match anywhere in the receiver (`this.httpClient`
    /// contains `http`); short ones must equal a receiver segment.
    pub fn client_alias(&self, receiver: &str) -> Option<String> {
        let lower = receiver.to_lowercase();
        let segments = receiver_segments(&lower);
        self.client_entries()
            .find(|alias| {
                segments.iter().any(|seg| seg == alias)
                    || (alias.len() >= MIN_CONTAINED_ALIAS_LEN && lower.contains(alias))
            })
            .map(str::to_string)
    }

    pub fn is_client(&self, receiver: &str) -> bool {
        self.client_alias(receiver).is_some()
    }

    /// Whether the receiver's final segment is a server alias.
    pub fn is_server(&self, receiver: &str) -> bool {
        let lower = receiver.to_lowercase();
        let Some(last) = receiver_segments(&lower).pop() else {
            return false;
        };
        SERVER_ALIASES.contains(last.as_str()) || self.extra_server.iter().any(|s| *s == last)
    }

    /// Whether importing `module` marks a file as server-side.
    ///
    /// Submodules count: `flask.views` and `org.springframework.web.bind`.
    pub fn is_server_module(&self, module: &str) -> bool {
        let lower = module.trim().to_lowercase();
        SERVER_MODULES
            .iter()
            .map(|s| &**s)
            .chain(self.extra_modules.iter().map(String::as_str))
            .any(|m| {
                lower == m
                    || lower
                        .strip_prefix(m)
                        .map(|rest| rest.starts_with('/') || rest.starts_with('.'))
                        .unwrap_or(false)
            })
    }

    /// First server module imported by a file.
    pub fn server_framework(&self, imports: &[Import]) -> Option<String> {
        imports
            .iter()
            .find(|i| self.is_server_module(&i.source))
            .map(|i| i.source.clone())
    }
}

/// Identifier segments of a receiver expression, e.g. `this.http` -> `[this, http]`.
fn receiver_segments(receiver: &str) -> Vec<String> {
    receiver
        .split(|c: char| !(c.is_alphanumeric() || c == '_' || c == '$'))
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Upper-case HTTP method for a verb call name, if recognized.
pub fn http_method(name: &str) -> Option<String> {
    HTTP_METHODS
        .iter()
        .find(|m| **m == name)
        .map(|m| m.to_uppercase())
}

/// Remove `${...}` template placeholders.
pub fn strip_placeholders(literal: &str) -> String {
    PLACEHOLDER.replace_all(literal, "").trim().to_string()
}

/// Absolute `http(s)://` or protocol-relative `//` URL.
pub fn is_full_url(target: &str) -> bool {
    let lower = target.trim().to_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://") || lower.starts_with("//")
}

/// Whether a file shows server-side context through imports or usage.
pub fn has_server_context(imports: &[Import], source: &str, aliases: &ApiAliases) -> bool {
    imports.iter().any(|i| aliases.is_server_module(&i.source)) || SERVER_USAGE.is_match(source)
}

/// Classify a `receiver.verb(target)` call.
pub fn classify_call(
    receiver: &str,
    target: &str,
    server_context: bool,
    aliases: &ApiAliases,
) -> Option<Direction> {
    if aliases.is_client(receiver) {
        return Some(Direction::Consumed);
    }
    let full_url = is_full_url(target);
    if aliases.is_server(receiver) && server_context && !full_url {
        return Some(Direction::Provided);
    }
    if full_url {
        return Some(Direction::Consumed);
    }
    None
}

/// An unclassified `receiver.verb("literal")` call collected during a walk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiCandidate {
    pub receiver: String,
    pub method: String,
    /// Literal argument before placeholder stripping.
    pub literal: String,
    pub line: usize,
}

/// Classify collected candidates once server context is known.
pub fn resolve_candidates(
    candidates: &[ApiCandidate],
    server_context: bool,
    server_framework: Option<&str>,
    aliases: &ApiAliases,
) -> Vec<ApiCall> {
    let mut calls = Vec::new();
    for candidate in candidates {
        let target = strip_placeholders(&candidate.literal);
        match classify_call(&candidate.receiver, &target, server_context, aliases) {
            Some(direction) => {
                let framework = match direction {
                    Direction::Consumed => aliases.client_alias(&candidate.receiver),
                    Direction::Provided => server_framework.map(str::to_string),
                };
                calls.push(ApiCall {
                    method: Some(candidate.method.to_uppercase()),
                    target,
                    direction,
                    line: candidate.line,
                    framework,
                });
            }
            None => {
                debug!(
                    receiver = %candidate.receiver,
                    target = %target,
                    line = candidate.line,
                    "ambiguous API call direction, skipping"
                );
            }
        }
    }
    calls
}

/// Reclassify provided entries whose target is a full URL.
///
/// A served endpoint is never an absolute URL.
pub fn reconcile_directions(findings: &mut Findings) {
    for api in &mut findings.apis {
        if api.direction == Direction::Provided && is_full_url(&api.target) {
            debug!(target = %api.target, line = api.line, "provided API is a full URL, reclassifying as consumed");
            api.direction = Direction::Consumed;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn aliases() -> ApiAliases {
        ApiAliases::default()
    }

    #[test]
    fn test_client_aliases() {
        let a = aliases();
        assert_eq!(a.client_alias("axios"), Some("axios".to_string()));
        assert!(a.is_client("this.httpClient"));
        assert!(a.is_client("requests"));
        assert!(a.is_client("this.api"));
        assert!(a.is_client("axios.create()"));
        assert!(!a.is_client("apiRouter"));
        assert!(!a.is_client("app"));
        assert!(!a.is_client("cache"));
    }

    #[test]
    fn test_server_aliases() {
        let a = aliases();
        assert!(a.is_server("app"));
        assert!(a.is_server("this.router"));
        assert!(a.is_server("fastify"));
        assert!(!a.is_server("cache"));
        assert!(!a.is_server(""));
    }

    #[test]
    fn test_server_modules() {
        let a = aliases();
        assert!(a.is_server_module("express"));
        assert!(a.is_server_module("flask.views"));
        assert!(a.is_server_module("org.springframework.web.bind.annotation.GetMapping"));
        assert!(a.is_server_module("Microsoft.AspNetCore.Mvc"));
        assert!(!a.is_server_module("expressive"));
        assert!(!a.is_server_module("axios"));
    }

    #[test]
    fn test_configured_extensions() {
        let a = ApiAliases::with_extensions(
            &["gateway".to_string()],
            &["Api".to_string()],
            &["my-server".to_string()],
        );
        assert!(a.is_client("this.gateway"));
        assert!(a.is_server("v1.api"));
        assert!(a.is_server_module("my-server"));
    }

    #[test]
    fn test_classify_rules_in_order() {
        let a = aliases();
        assert_eq!(
            classify_call("axios", "/users", false, &a),
            Some(Direction::Consumed)
        );
        assert_eq!(
            classify_call("app", "/orders", true, &a),
            Some(Direction::Provided)
        );
        // No server context: ambiguous
        assert_eq!(classify_call("app", "/orders", false, &a), None);
        // Full URLs are never provided
        assert_eq!(
            classify_call("app", "https://x.io/orders", true, &a),
            Some(Direction::Consumed)
        );
        assert_eq!(
            classify_call("thing", "//cdn.example.com/a", false, &a),
            Some(Direction::Consumed)
        );
        // Unknown receiver, relative path
        assert_eq!(classify_call("obj", "/x", true, &a), None);
    }

    #[test]
    fn test_strip_placeholders() {
        assert_eq!(strip_placeholders("${BASE}/users/${id}"), "/users/");
        assert_eq!(strip_placeholders("/plain"), "/plain");
    }

    #[test]
    fn test_server_context_from_usage() {
        let a = aliases();
        assert!(has_server_context(&[], "const app = express();", &a));
        let imports = vec![Import {
            source: "fastapi".to_string(),
            line: 1,
        }];
        assert!(has_server_context(&imports, "", &a));
        assert!(!has_server_context(&[], "const x = 1;", &a));
    }

    #[test]
    fn test_resolve_and_reconcile() {
        let a = aliases();
        let candidates = vec![
            ApiCandidate {
                receiver: "obj".to_string(),
                method: "get".to_string(),
                literal: "/x".to_string(),
                line: 1,
            },
            ApiCandidate {
                receiver: "app".to_string(),
                method: "post".to_string(),
                literal: "/orders".to_string(),
                line: 2,
            },
        ];
        let calls = resolve_candidates(&candidates, true, Some("express"), &a);
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].method.as_deref(), Some("POST"));
        assert_eq!(calls[0].framework.as_deref(), Some("express"));

        let mut findings = Findings::empty("a.js", "javascript");
        findings.apis.push(ApiCall {
            method: Some("GET".to_string()),
            target: "https://other.io/x".to_string(),
            direction: Direction::Provided,
            line: 3,
            framework: None,
        });
        reconcile_directions(&mut findings);
        assert_eq!(findings.apis[0].direction, Direction::Consumed);
    }
}
