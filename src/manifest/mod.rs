//! Package manifest parsing.
//!
//! Declared dependencies are read from the manifests found during a scan,
//! whatever the language of the surrounding repository:
//!
//! ```text
//! ManifestKind
//!     ├── PackageJson     (npm: dependencies, devDependencies, ...)
//!     ├── Requirements    (pypi: requirements*.txt)
//!     ├── PyProject       (pypi: PEP 621 and Poetry)
//!     ├── GoMod           (go: require directives)
//!     ├── Pom             (maven: <dependency> coordinates)
//!     ├── CsProj          (nuget: <PackageReference>)
//!     └── CargoToml       (cargo: [dependencies] tables)
//! ```

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

mod cargo;
mod dotnet;
mod golang;
mod maven;
mod npm;
mod python;

/// Package ecosystem of a declared dependency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PackageManager {
    Npm,
    PyPI,
    Go,
    Maven,
    NuGet,
    Cargo,
}

impl PackageManager {
    pub fn as_str(&self) -> &'static str {
        match self {
            PackageManager::Npm => "npm",
            PackageManager::PyPI => "pypi",
            PackageManager::Go => "go",
            PackageManager::Maven => "maven",
            PackageManager::NuGet => "nuget",
            PackageManager::Cargo => "cargo",
        }
    }
}

impl fmt::Display for PackageManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Manifest file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManifestKind {
    PackageJson,
    Requirements,
    PyProject,
    GoMod,
    Pom,
    CsProj,
    CargoToml,
}

impl ManifestKind {
    /// Detect the manifest format from a file name.
    pub fn from_file_name(name: &str) -> Option<Self> {
        match name {
            "package.json" => Some(ManifestKind::PackageJson),
            "pyproject.toml" => Some(ManifestKind::PyProject),
            "go.mod" => Some(ManifestKind::GoMod),
            "pom.xml" => Some(ManifestKind::Pom),
            "Cargo.toml" => Some(ManifestKind::CargoToml),
            _ if name.starts_with("requirements") && name.ends_with(".txt") => {
                Some(ManifestKind::Requirements)
            }
            _ if name.ends_with(".csproj") => Some(ManifestKind::CsProj),
            _ => None,
        }
    }

    pub fn manager(&self) -> PackageManager {
        match self {
            ManifestKind::PackageJson => PackageManager::Npm,
            ManifestKind::Requirements | ManifestKind::PyProject => PackageManager::PyPI,
            ManifestKind::GoMod => PackageManager::Go,
            ManifestKind::Pom => PackageManager::Maven,
            ManifestKind::CsProj => PackageManager::NuGet,
            ManifestKind::CargoToml => PackageManager::Cargo,
        }
    }
}

/// One dependency declared by a manifest.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct DeclaredPackage {
    pub name: String,
    /// Version or version requirement as written.
    pub version: Option<String>,
    /// Dependency scope: `runtime`, `dev`, `test`, `build`, `optional`,
    /// `peer` or `indirect`.
    pub scope: String,
}

impl DeclaredPackage {
    pub fn new(name: impl Into<String>, version: Option<String>, scope: &str) -> Self {
        Self {
            name: name.into(),
            version: version.filter(|v| !v.trim().is_empty()),
            scope: scope.to_string(),
        }
    }
}

/// Dependencies declared by one manifest file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Manifest {
    /// Repository-relative path.
    pub path: String,
    pub manager: PackageManager,
    pub packages: Vec<DeclaredPackage>,
}

/// Whether a path names a recognized manifest.
pub fn is_manifest(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .and_then(ManifestKind::from_file_name)
        .is_some()
}

/// Parse a manifest. Returns `Ok(None)` when the path is not a manifest.
pub fn parse_manifest(path: &str, content: &str) -> anyhow::Result<Option<Manifest>> {
    let name = path.rsplit('/').next().unwrap_or(path);
    let Some(kind) = ManifestKind::from_file_name(name) else {
        return Ok(None);
    };
    let packages = match kind {
        ManifestKind::PackageJson => npm::parse_package_json(content)?,
        ManifestKind::Requirements => python::parse_requirements(content),
        ManifestKind::PyProject => python::parse_pyproject(content)?,
        ManifestKind::GoMod => golang::parse_go_mod(content),
        ManifestKind::Pom => maven::parse_pom(content),
        ManifestKind::CsProj => dotnet::parse_csproj(content),
        ManifestKind::CargoToml => cargo::parse_cargo_toml(content)?,
    };
    Ok(Some(Manifest {
        path: path.to_string(),
        manager: kind.manager(),
        packages,
    }))
}
