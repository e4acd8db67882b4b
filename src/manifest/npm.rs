//! package.json dependencies.

use anyhow::Context;
use serde_json::Value;

use super::DeclaredPackage;

/// Dependency sections and the scope each one declares.
const SECTIONS: &[(&str, &str)] = &[
    ("dependencies", "runtime"),
    ("devDependencies", "dev"),
    ("peerDependencies", "peer"),
    ("optionalDependencies", "optional"),
];

pub fn parse_package_json(content: &str) -> anyhow::Result<Vec<DeclaredPackage>> {
    let root: Value = serde_json::from_str(content).context("invalid package.json")?;
    let mut packages = Vec::new();
    for (section, scope) in SECTIONS {
        let Some(deps) = root.get(*section).and_then(Value::as_object) else {
            continue;
        };
        for (name, version) in deps {
            packages.push(DeclaredPackage::new(
                name.as_str(),
                version.as_str().map(str::to_string),
                scope,
            ));
        }
    }
    Ok(packages)
}
