//! Python manifests: requirements*.txt and pyproject.toml.

use anyhow::Context;
use toml::Value;

use super::DeclaredPackage;

/// Split a requirement string into name and version specifier.
///
/// Handles the common formats:
/// - `requests==2.31.0` → (`requests`, `==2.31.0`)
/// - `aiohttp>=3.0,<4` → (`aiohttp`, `>=3.0,<4`)
/// - `package[extra]>=1.0` → (`package`, `>=1.0`)
/// - `uvicorn; python_version > "3.8"` → (`uvicorn`, none)
fn split_requirement(req: &str) -> (String, Option<String>) {
    let req = req.split(';').next().unwrap_or("").trim();
    let end = req
        .find(|c: char| matches!(c, '=' | '>' | '<' | '~' | '!' | '[' | ' ' | '('))
        .unwrap_or(req.len());
    let name = req[..end].trim().to_lowercase();
    let rest = &req[end..];
    let rest = match (rest.find('['), rest.find(']')) {
        (Some(0), Some(close)) => &rest[close + 1..],
        _ => rest,
    };
    let version = rest.trim().trim_matches(|c| c == '(' || c == ')').trim();
    (
        name,
        (!version.is_empty()).then(|| version.to_string()),
    )
}

pub fn parse_requirements(content: &str) -> Vec<DeclaredPackage> {
    content
        .lines()
        .map(|line| line.split(" #").next().unwrap_or("").trim())
        // comments, blank lines and options like -r, -e, --index-url
        .filter(|line| !line.is_empty() && !line.starts_with('#') && !line.starts_with('-'))
        .filter_map(|line| {
            let (name, version) = split_requirement(line);
            (!name.is_empty() && !name.contains('/') && !name.contains(':'))
                .then(|| DeclaredPackage::new(name, version, "runtime"))
        })
        .collect()
}

pub fn parse_pyproject(content: &str) -> anyhow::Result<Vec<DeclaredPackage>> {
    let root: Value = toml::from_str(content).context("invalid pyproject.toml")?;
    let mut packages = Vec::new();

    // PEP 621
    if let Some(project) = root.get("project") {
        let pep508 = project
            .get("dependencies")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .map(|dep| (dep, "runtime"));
        let optional = project
            .get("optional-dependencies")
            .and_then(Value::as_table)
            .into_iter()
            .flat_map(|groups| groups.values())
            .filter_map(Value::as_array)
            .flatten()
            .map(|dep| (dep, "optional"));
        for (dep, scope) in pep508.chain(optional) {
            if let Some(req) = dep.as_str() {
                let (name, version) = split_requirement(req);
                if !name.is_empty() {
                    packages.push(DeclaredPackage::new(name, version, scope));
                }
            }
        }
    }

    // Poetry
    if let Some(poetry) = root.get("tool").and_then(|t| t.get("poetry")) {
        push_poetry_table(&mut packages, poetry.get("dependencies"), "runtime");
        push_poetry_table(&mut packages, poetry.get("dev-dependencies"), "dev");
        if let Some(groups) = poetry.get("group").and_then(Value::as_table) {
            for (group, table) in groups {
                let scope = if group == "test" { "test" } else { "dev" };
                push_poetry_table(&mut packages, table.get("dependencies"), scope);
            }
        }
    }

    Ok(packages)
}

fn push_poetry_table(packages: &mut Vec<DeclaredPackage>, table: Option<&Value>, scope: &str) {
    let Some(table) = table.and_then(Value::as_table) else {
        return;
    };
    for (name, spec) in table {
        if name == "python" {
            continue;
        }
        let version = match spec {
            Value::String(v) => Some(v.clone()),
            Value::Table(t) => t.get("version").and_then(Value::as_str).map(str::to_string),
            _ => None,
        };
        packages.push(DeclaredPackage::new(name.to_lowercase(), version, scope));
    }
}
