//! Spring Data and Spring Security recognition.
//!
//! These helpers are text based so they can be shared by the Java walk and
//! by the graph linker, which matches security URL patterns against
//! provided API paths.

use lazy_static::lazy_static;
use regex::Regex;

use crate::analysis::heuristics::lower_first;

/// Spring Data repository bases and the framework each one belongs to.
const REPOSITORY_BASES: &[(&str, &str)] = &[
    ("JpaRepository", "spring-data-jpa"),
    ("JpaSpecificationExecutor", "spring-data-jpa"),
    ("CrudRepository", "spring-data"),
    ("ListCrudRepository", "spring-data"),
    ("PagingAndSortingRepository", "spring-data"),
    ("ListPagingAndSortingRepository", "spring-data"),
    ("Repository", "spring-data"),
    ("MongoRepository", "spring-data-mongodb"),
    ("ReactiveMongoRepository", "spring-data-mongodb"),
    ("ReactiveCrudRepository", "spring-data-reactive"),
    ("ReactiveSortingRepository", "spring-data-reactive"),
    ("R2dbcRepository", "spring-data-r2dbc"),
    ("ElasticsearchRepository", "spring-data-elasticsearch"),
];

/// Operator keywords that may end a derived-query predicate part.
const OPERATOR_SUFFIXES: &[&str] = &[
    "GreaterThanEqual",
    "LessThanEqual",
    "GreaterThan",
    "LessThan",
    "Between",
    "IsNotNull",
    "IsNull",
    "NotNull",
    "Null",
    "IsNotEmpty",
    "IsEmpty",
    "NotEmpty",
    "Empty",
    "NotLike",
    "Like",
    "StartingWith",
    "StartsWith",
    "EndingWith",
    "EndsWith",
    "NotContaining",
    "Containing",
    "Contains",
    "NotIn",
    "In",
    "IsTrue",
    "True",
    "IsFalse",
    "False",
    "Before",
    "After",
    "Equals",
    "Regex",
    "Near",
    "Within",
    "Not",
    "Is",
];

/// Supertypes that make a class a security component.
const SECURITY_BASES: &[(&str, &str)] = &[
    ("WebSecurityConfigurerAdapter", "security-config"),
    ("UserDetailsService", "user-details-service"),
    ("ReactiveUserDetailsService", "user-details-service"),
    ("AuthenticationProvider", "authentication-provider"),
    ("OncePerRequestFilter", "security-filter"),
    ("GenericFilterBean", "security-filter"),
    ("AbstractAuthenticationProcessingFilter", "security-filter"),
    ("AuthenticationEntryPoint", "authentication-entry-point"),
    ("AccessDeniedHandler", "access-denied-handler"),
];

/// Annotations that make a class a security component.
const SECURITY_ANNOTATIONS: &[(&str, &str)] = &[
    ("EnableWebSecurity", "security-config"),
    ("EnableWebFluxSecurity", "security-config"),
    ("EnableMethodSecurity", "method-security"),
    ("EnableGlobalMethodSecurity", "method-security"),
];

/// Name fragments that mark a `@Configuration` class as security related.
const SECURITY_NAME_HINTS: &[&str] = &["Security", "Auth", "Jwt", "OAuth"];

/// Builder calls whose string arguments are secured URL patterns.
pub const MATCHER_CALLS: &[&str] = &[
    "requestMatchers",
    "antMatchers",
    "mvcMatchers",
    "regexMatchers",
    "securityMatcher",
    "pathMatchers",
];

/// Access rules that may follow a matcher call.
const ACCESS_RULES: &[&str] = &[
    "permitAll",
    "authenticated",
    "denyAll",
    "anonymous",
    "fullyAuthenticated",
    "rememberMe",
    "hasRole",
    "hasAnyRole",
    "hasAuthority",
    "hasAnyAuthority",
    "access",
];

lazy_static! {
    static ref DERIVED_QUERY: Regex = Regex::new(
        r"^(?:find|read|get|query|search|stream|count|exists|delete|remove)(?:[A-Z0-9]\w*?)?By([A-Z]\w*)$"
    )
    .unwrap();
}

/// Framework of a Spring Data repository base interface, if recognized.
///
/// Accepts generic and qualified names: `org.x.JpaRepository<User, Long>`.
pub fn repository_framework(base: &str) -> Option<&'static str> {
    let (name, _) = generic_parts(base);
    let simple = name.rsplit('.').next().unwrap_or(&name);
    REPOSITORY_BASES
        .iter()
        .find(|(b, _)| *b == simple)
        .map(|(_, framework)| *framework)
}

/// Split `Base<A, Map<K, V>>` into `("Base", ["A", "Map<K, V>"])`.
pub fn generic_parts(text: &str) -> (String, Vec<String>) {
    let text = text.trim();
    let Some(open) = text.find('<') else {
        return (text.to_string(), Vec::new());
    };
    let name = text[..open].trim().to_string();
    let inner = text[open + 1..].trim_end().strip_suffix('>').unwrap_or(&text[open + 1..]);

    let mut args = Vec::new();
    let mut depth = 0usize;
    let mut current = String::new();
    for c in inner.chars() {
        match c {
            '<' => depth += 1,
            '>' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                args.push(std::mem::take(&mut current).trim().to_string());
                continue;
            }
            _ => {}
        }
        current.push(c);
    }
    if !current.trim().is_empty() {
        args.push(current.trim().to_string());
    }
    (name, args)
}

/// Entity fields referenced by a derived query method name.
///
/// `findByFirstNameAndLastNameIgnoreCase` gives `[firstName, lastName]`.
/// Methods that are not derived queries give nothing.
pub fn derive_query_fields(method: &str) -> Vec<String> {
    let Some(caps) = DERIVED_QUERY.captures(method) else {
        return Vec::new();
    };
    let mut predicate = caps[1].to_string();
    if let Some(order) = predicate.find("OrderBy") {
        predicate.truncate(order);
    }
    for suffix in ["AllIgnoreCase", "IgnoringCase", "IgnoreCase"] {
        if let Some(stripped) = predicate.strip_suffix(suffix) {
            predicate = stripped.to_string();
        }
    }

    let mut fields: Vec<String> = Vec::new();
    for part in split_conjunctions(&predicate) {
        let part = strip_operator(&part);
        let part = part.strip_suffix("IgnoreCase").unwrap_or(part);
        if part.is_empty() {
            continue;
        }
        let field = lower_first(part);
        if !fields.contains(&field) {
            fields.push(field);
        }
    }
    fields
}

/// Split a camel-case predicate on `And`/`Or` words.
fn split_conjunctions(predicate: &str) -> Vec<String> {
    let mut parts = vec![String::new()];
    for word in camel_words(predicate) {
        if word == "And" || word == "Or" {
            parts.push(String::new());
        } else if let Some(last) = parts.last_mut() {
            last.push_str(word);
        }
    }
    parts.retain(|p| !p.is_empty());
    parts
}

/// Camel-case words: `FirstNameAnd` -> `[First, Name, And]`.
fn camel_words(text: &str) -> Vec<&str> {
    let mut words = Vec::new();
    let mut start = 0;
    for (i, c) in text.char_indices().skip(1) {
        if c.is_uppercase() {
            words.push(&text[start..i]);
            start = i;
        }
    }
    if start < text.len() {
        words.push(&text[start..]);
    }
    words
}

fn strip_operator(part: &str) -> &str {
    for suffix in OPERATOR_SUFFIXES {
        if let Some(stripped) = part.strip_suffix(suffix) {
            if !stripped.is_empty() {
                return stripped;
            }
        }
    }
    part
}

/// Component type of a class, from its annotations, supertypes and name.
///
/// Returns the type and the markers that identified it.
pub fn security_component_type(
    name: &str,
    annotations: &[String],
    bases: &[String],
) -> Option<(&'static str, Vec<String>)> {
    let mut component = None;
    let mut markers = Vec::new();

    for annotation in annotations {
        if let Some((marker, kind)) = SECURITY_ANNOTATIONS.iter().find(|(a, _)| *a == annotation.as_str()) {
            component.get_or_insert(*kind);
            markers.push(format!("@{}", marker));
        }
    }
    for base in bases {
        let (simple, _) = generic_parts(base);
        if let Some((marker, kind)) = SECURITY_BASES.iter().find(|(b, _)| *b == simple) {
            component.get_or_insert(*kind);
            markers.push(marker.to_string());
        }
    }
    if component.is_none()
        && annotations.iter().any(|a| a == "Configuration")
        && SECURITY_NAME_HINTS.iter().any(|hint| name.contains(hint))
    {
        component = Some("security-config");
        markers.push("@Configuration".to_string());
    }
    component.map(|kind| (kind, markers))
}

/// Whether a call name is a recognized access rule.
pub fn is_access_rule(name: &str) -> bool {
    ACCESS_RULES.contains(&name)
}

/// Ant-style path match: `**` spans any number of segments, `*` and `?`
/// match within one segment.
pub fn ant_match(pattern: &str, path: &str) -> bool {
    let pattern: Vec<&str> = pattern.split('/').filter(|s| !s.is_empty()).collect();
    let path: Vec<&str> = path
        .split(|c| c == '?' || c == '#')
        .next()
        .unwrap_or("")
        .split('/')
        .filter(|s| !s.is_empty())
        .collect();
    match_segments(&pattern, &path)
}

fn match_segments(pattern: &[&str], path: &[&str]) -> bool {
    match pattern.split_first() {
        None => path.is_empty(),
        Some((&"**", rest)) => (0..=path.len()).any(|skip| match_segments(rest, &path[skip..])),
        Some((segment, rest)) => match path.split_first() {
            Some((head, tail)) => match_segment(segment, head) && match_segments(rest, tail),
            None => false,
        },
    }
}

fn match_segment(pattern: &str, segment: &str) -> bool {
    // `{id}` path variables match any single segment
    if pattern.starts_with('{') && pattern.ends_with('}') {
        return true;
    }
    let p: Vec<char> = pattern.chars().collect();
    let s: Vec<char> = segment.chars().collect();
    glob(&p, &s)
}

fn glob(p: &[char], s: &[char]) -> bool {
    match p.split_first() {
        None => s.is_empty(),
        Some(('*', rest)) => (0..=s.len()).any(|skip| glob(rest, &s[skip..])),
        Some(('?', rest)) => !s.is_empty() && glob(rest, &s[1..]),
        Some((c, rest)) => s.first() == Some(c) && glob(rest, &s[1..]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repository_framework() {
        assert_eq!(
            repository_framework("JpaRepository<User, Long>"),
            Some("spring-data-jpa")
        );
        assert_eq!(
            repository_framework("org.springframework.data.repository.CrudRepository<A, B>"),
            Some("spring-data")
        );
        assert_eq!(repository_framework("MongoRepository"), Some("spring-data-mongodb"));
        assert_eq!(repository_framework("Comparable<User>"), None);
    }

    #[test]
    fn test_generic_parts() {
        assert_eq!(
            generic_parts("JpaRepository<User, Long>"),
            ("JpaRepository".to_string(), vec!["User".to_string(), "Long".to_string()])
        );
        assert_eq!(
            generic_parts("Base<Map<K, V>, T>").1,
            vec!["Map<K, V>".to_string(), "T".to_string()]
        );
        assert!(generic_parts("Plain").1.is_empty());
    }

    #[test]
    fn test_derive_query_fields() {
        assert_eq!(derive_query_fields("findByUsername"), vec!["username"]);
        assert_eq!(
            derive_query_fields("findByFirstNameAndLastNameIgnoreCase"),
            vec!["firstName", "lastName"]
        );
        assert_eq!(
            derive_query_fields("findAllByStatusOrderByCreatedAtDesc"),
            vec!["status"]
        );
        assert_eq!(derive_query_fields("countByAgeGreaterThan"), vec!["age"]);
        assert_eq!(
            derive_query_fields("findDistinctByEmailOrPhoneIsNull"),
            vec!["email", "phone"]
        );
        assert_eq!(derive_query_fields("existsByEmail"), vec!["email"]);
        assert_eq!(derive_query_fields("findByOrdinal"), vec!["ordinal"]);
        assert!(derive_query_fields("findAll").is_empty());
        assert!(derive_query_fields("save").is_empty());
        assert!(derive_query_fields("findbyname").is_empty());
    }

    #[test]
    fn test_security_component_type() {
        let annotations = vec!["Configuration".to_string(), "EnableWebSecurity".to_string()];
        let (kind, markers) = security_component_type("WebConfig", &annotations, &[]).unwrap();
        assert_eq!(kind, "security-config");
        assert_eq!(markers, vec!["@EnableWebSecurity"]);

        let bases = vec!["OncePerRequestFilter".to_string()];
        let (kind, _) = security_component_type("JwtFilter", &[], &bases).unwrap();
        assert_eq!(kind, "security-filter");

        let config = vec!["Configuration".to_string()];
        assert!(security_component_type("JwtSettings", &config, &[]).is_some());
        assert!(security_component_type("CacheConfig", &config, &[]).is_none());
        assert!(security_component_type("UserService", &[], &[]).is_none());
    }

    #[test]
    fn test_ant_match() {
        assert!(ant_match("/api/**", "/api/users/1"));
        assert!(ant_match("/api/**", "/api"));
        assert!(ant_match("/api/*/orders", "/api/7/orders"));
        assert!(!ant_match("/api/*", "/api/users/1"));
        assert!(ant_match("/public/*.css", "/public/site.css"));
        assert!(ant_match("/users/{id}", "/users/42"));
        assert!(ant_match("/**", "/anything/at/all"));
        assert!(ant_match("/health", "/health?verbose=1"));
        assert!(!ant_match("/admin/**", "/api/admin"));
    }
}
