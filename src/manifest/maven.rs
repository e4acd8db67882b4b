//! pom.xml dependency coordinates.
//!
//! Read with regular expressions; only `<dependency>` elements are of
//! interest, so a full XML parser is not needed.

use lazy_static::lazy_static;
use regex::Regex;

use super::DeclaredPackage;

lazy_static! {
    static ref DEPENDENCY: Regex = Regex::new(r"(?s)<dependency>(.*?)</dependency>").unwrap();
    static ref COMMENT: Regex = Regex::new(r"(?s)<!--.*?-->").unwrap();
}

fn tag<'c>(body: &'c str, name: &str) -> Option<&'c str> {
    let open = format!("<{}>", name);
    let close = format!("</{}>", name);
    let start = body.find(&open)? + open.len();
    let end = body[start..].find(&close)? + start;
    Some(body[start..end].trim())
}

pub fn parse_pom(content: &str) -> Vec<DeclaredPackage> {
    let content = COMMENT.replace_all(content, "");
    DEPENDENCY
        .captures_iter(&content)
        .filter_map(|caps| {
            let body = caps.get(1)?.as_str();
            let group = tag(body, "groupId")?;
            let artifact = tag(body, "artifactId")?;
            let scope = match tag(body, "scope") {
                Some("test") => "test",
                Some("provided") | Some("system") => "build",
                _ => "runtime",
            };
            Some(DeclaredPackage::new(
                format!("{}:{}", group, artifact),
                tag(body, "version").map(str::to_string),
                scope,
            ))
        })
        .collect()
}
