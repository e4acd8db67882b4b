//! Repository file collection.
//!
//! Produces the `(relPath, absPath, language, content)` tuples the scanner
//! consumes. Only files with a recognized language or a package manifest
//! name are collected.

use std::fs;
use std::path::{Path, PathBuf};

use globset::GlobSet;
use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};

use crate::analysis::Language;
use crate::config::Config;
use crate::manifest::is_manifest;

/// Directory names never descended into.
const SKIPPED_DIRS: &[&str] = &[
    "node_modules",
    "vendor",
    "target",
    "build",
    "dist",
    "out",
    "bin",
    "obj",
    "__pycache__",
    "venv",
    "coverage",
];

/// Directory names that hold tests.
const TEST_DIRS: &[&str] = &["test", "tests", "__tests__", "spec"];

/// One file of a repository.
#[derive(Debug, Clone)]
pub struct SourceFile {
    /// Path relative to the repository root with `/` separators.
    pub rel_path: String,
    pub abs_path: PathBuf,
    pub language: Language,
    pub content: String,
}

impl SourceFile {
    pub fn new(rel_path: impl Into<String>, language: Language, content: impl Into<String>) -> Self {
        let rel_path = rel_path.into();
        Self {
            abs_path: PathBuf::from(&rel_path),
            rel_path,
            language,
            content: content.into(),
        }
    }
}

/// The files of one repository.
#[derive(Debug, Clone, Default)]
pub struct RepositoryGroup {
    pub repo_root: String,
    pub files: Vec<SourceFile>,
}

impl RepositoryGroup {
    pub fn new(repo_root: impl Into<String>) -> Self {
        Self {
            repo_root: repo_root.into(),
            files: Vec::new(),
        }
    }

    pub fn with_file(mut self, file: SourceFile) -> Self {
        self.files.push(file);
        self
    }
}

fn is_skipped_dir(entry: &DirEntry) -> bool {
    if entry.depth() == 0 || !entry.file_type().is_dir() {
        return false;
    }
    let name = entry.file_name().to_string_lossy();
    name.starts_with('.') || SKIPPED_DIRS.contains(&name.as_ref())
}

/// Whether a repository-relative path looks like a test file.
pub fn is_test_path(rel_path: &str) -> bool {
    let mut segments: Vec<&str> = rel_path.split('/').collect();
    let Some(name) = segments.pop() else {
        return false;
    };
    if segments.iter().any(|s| TEST_DIRS.contains(s)) {
        return true;
    }
    let stem = name.split('.').next().unwrap_or(name);
    stem.starts_with("test_")
        || stem.ends_with("_test")
        || stem.ends_with("Test")
        || stem.ends_with("Tests")
        || name.contains(".test.")
        || name.contains(".spec.")
}

/// Relative path with `/` separators.
fn relative_path(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    let parts: Vec<String> = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy().to_string())
        .collect();
    Some(parts.join("/"))
}

/// Read one file into a `SourceFile`. Returns None for files that are
/// neither source nor manifest, and for unreadable or non-UTF-8 files.
pub fn read_source_file(root: &Path, path: &Path) -> Option<SourceFile> {
    let language = Language::from_path(path);
    if language == Language::Unknown && !is_manifest(path) {
        return None;
    }
    let rel_path = relative_path(root, path)?;
    let content = match fs::read(path) {
        Ok(bytes) => match String::from_utf8(bytes) {
            Ok(text) => text,
            Err(_) => {
                warn!(path = %rel_path, "skipping non UTF-8 file");
                return None;
            }
        },
        Err(e) => {
            warn!(path = %rel_path, error = %e, "cannot read file");
            return None;
        }
    };
    Some(SourceFile {
        rel_path,
        abs_path: path.to_path_buf(),
        language,
        content,
    })
}

/// Collect the files of the repository at `root`.
pub fn collect_repository(root: &Path, config: &Config) -> anyhow::Result<RepositoryGroup> {
    let root = root
        .canonicalize()
        .map_err(|e| anyhow::anyhow!("cannot access repository {}: {}", root.display(), e))?;
    if !root.is_dir() {
        anyhow::bail!("repository root is not a directory: {}", root.display());
    }
    let exclusions = config.exclusions()?;
    let include_tests = config.should_include_test_files();

    let mut group = RepositoryGroup::new(root.to_string_lossy());
    for entry in WalkDir::new(&root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !is_skipped_dir(e))
    {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let Some(rel_path) = relative_path(&root, path) else {
            continue;
        };
        if is_excluded(&exclusions, &rel_path) {
            debug!(path = %rel_path, "excluded");
            continue;
        }
        if !include_tests && is_test_path(&rel_path) {
            continue;
        }
        if let Some(file) = read_source_file(&root, path) {
            group.files.push(file);
        }
    }

    debug!(root = %group.repo_root, files = group.files.len(), "collected repository");
    Ok(group)
}

fn is_excluded(exclusions: &GlobSet, rel_path: &str) -> bool {
    !exclusions.is_empty() && exclusions.is_match(rel_path)
}
