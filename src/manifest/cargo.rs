//! Cargo.toml dependency tables.

use anyhow::Context;
use toml::Value;

use super::DeclaredPackage;

const SECTIONS: &[(&str, &str)] = &[
    ("dependencies", "runtime"),
    ("dev-dependencies", "dev"),
    ("build-dependencies", "build"),
];

fn push_table(packages: &mut Vec<DeclaredPackage>, table: Option<&Value>, scope: &str) {
    let Some(table) = table.and_then(Value::as_table) else {
        return;
    };
    for (name, spec) in table {
        let version = match spec {
            Value::String(v) => Some(v.clone()),
            Value::Table(t) => t.get("version").and_then(Value::as_str).map(str::to_string),
            _ => None,
        };
        // `package = "real-name"` renames a dependency
        let name = spec
            .get("package")
            .and_then(Value::as_str)
            .unwrap_or(name);
        packages.push(DeclaredPackage::new(name, version, scope));
    }
}

pub fn parse_cargo_toml(content: &str) -> anyhow::Result<Vec<DeclaredPackage>> {
    let root: Value = toml::from_str(content).context("invalid Cargo.toml")?;
    let mut packages = Vec::new();
    for (section, scope) in SECTIONS {
        push_table(&mut packages, root.get(*section), scope);
    }
    if let Some(workspace) = root.get("workspace") {
        push_table(&mut packages, workspace.get("dependencies"), "runtime");
    }
    Ok(packages)
}
