//! Scan pipeline: files to findings to graph.
//!
//! Per-file analysis runs in parallel and touches no shared state. Linking
//! waits for every repository to finish, then runs once over the complete
//! entity set.

use std::path::Path;

use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::analysis::{analyze_source, AnalysisOptions, Language};
use crate::config::Config;
use crate::graph::{build_graph, FileAnalysis, Graph, MatchOptions, RepositoryAnalysis};
use crate::manifest::{is_manifest, parse_manifest, Manifest};
use crate::source::{RepositoryGroup, SourceFile};

/// Counters for one scan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ScanStats {
    pub repositories: usize,
    /// Source files that produced a File entity.
    pub files: usize,
    pub analyzed: usize,
    /// Files in a recognized language that has no analyzer.
    pub unsupported: usize,
    /// Files whose parse or analysis failed.
    pub failed: usize,
    /// Files whose syntax walk hit a ceiling.
    pub truncated: usize,
    pub manifests: usize,
}

impl ScanStats {
    fn add(&mut self, other: &ScanStats) {
        self.repositories += other.repositories;
        self.files += other.files;
        self.analyzed += other.analyzed;
        self.unsupported += other.unsupported;
        self.failed += other.failed;
        self.truncated += other.truncated;
        self.manifests += other.manifests;
    }

    fn count(&mut self, file: &FileAnalysis) {
        self.files += 1;
        match &file.findings {
            Some(findings) => {
                self.analyzed += 1;
                if findings.walk.is_truncated() {
                    self.truncated += 1;
                }
            }
            None if file.language.is_analyzed() => self.failed += 1,
            None => self.unsupported += 1,
        }
    }
}

/// Everything a scan produced.
#[derive(Debug, Clone, Default)]
pub struct ScanOutput {
    pub repositories: Vec<RepositoryAnalysis>,
    pub graph: Graph,
    pub stats: ScanStats,
}

/// Runs analyzers over repository groups and links the results.
#[derive(Debug, Clone, Default)]
pub struct Scanner {
    options: AnalysisOptions,
    matching: MatchOptions,
}

impl Scanner {
    pub fn new(options: AnalysisOptions, matching: MatchOptions) -> Self {
        Self { options, matching }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.analysis_options(), config.match_options())
    }

    pub fn match_options(&self) -> &MatchOptions {
        &self.matching
    }

    /// Analyze one file. Returns None for files in no recognized language.
    ///
    /// Files that cannot be analyzed still yield a `FileAnalysis` without
    /// findings so that they appear in the graph.
    pub fn analyze_file(&self, file: &SourceFile) -> Option<FileAnalysis> {
        if file.language == Language::Unknown {
            return None;
        }
        let line_count = file.content.lines().count();
        let path = Path::new(&file.rel_path);
        let findings = match analyze_source(file.language, path, file.content.as_bytes(), &self.options)
        {
            Ok(Some(findings)) => Some(findings),
            Ok(None) => {
                warn!(path = %file.rel_path, language = %file.language, "no analyzer for language");
                None
            }
            Err(e) => {
                warn!(path = %file.rel_path, error = %e, "analysis failed");
                None
            }
        };
        Some(FileAnalysis {
            path: file.rel_path.clone(),
            language: file.language,
            line_count,
            findings,
        })
    }

    /// Parse a manifest file. Malformed manifests are logged and skipped.
    pub fn read_manifest(&self, file: &SourceFile) -> Option<Manifest> {
        if !is_manifest(Path::new(&file.rel_path)) {
            return None;
        }
        match parse_manifest(&file.rel_path, &file.content) {
            Ok(manifest) => manifest,
            Err(e) => {
                warn!(path = %file.rel_path, error = %e, "malformed manifest");
                None
            }
        }
    }

    /// Analyze every file of one repository.
    pub fn analyze_repository(&self, group: &RepositoryGroup) -> (RepositoryAnalysis, ScanStats) {
        let mut repo = RepositoryAnalysis::new(group.repo_root.as_str());
        let mut stats = ScanStats {
            repositories: 1,
            ..ScanStats::default()
        };

        repo.manifests = group
            .files
            .iter()
            .filter_map(|file| self.read_manifest(file))
            .collect();
        stats.manifests = repo.manifests.len();

        repo.files = group
            .files
            .par_iter()
            .filter_map(|file| self.analyze_file(file))
            .collect();
        for file in &repo.files {
            stats.count(file);
        }

        debug!(
            root = %repo.repo_root,
            files = stats.files,
            failed = stats.failed,
            "analyzed repository"
        );
        (repo, stats)
    }

    /// Analyze all repositories, then build the linked graph.
    pub fn scan(&self, groups: &[RepositoryGroup]) -> ScanOutput {
        let results: Vec<(RepositoryAnalysis, ScanStats)> = groups
            .par_iter()
            .map(|group| self.analyze_repository(group))
            .collect();

        let mut stats = ScanStats::default();
        let mut repositories = Vec::with_capacity(results.len());
        for (repo, repo_stats) in results {
            stats.add(&repo_stats);
            repositories.push(repo);
        }

        let graph = self.link(&repositories);
        info!(
            repositories = stats.repositories,
            files = stats.files,
            entities = graph.entities.len(),
            relationships = graph.relationships.len(),
            "scan complete"
        );
        ScanOutput {
            repositories,
            graph,
            stats,
        }
    }

    /// Build the graph for already analyzed repositories.
    pub fn link(&self, repositories: &[RepositoryAnalysis]) -> Graph {
        build_graph(repositories, &self.matching)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::EntityKind;

    #[test]
    fn test_unknown_files_are_skipped() {
        let scanner = Scanner::default();
        let file = SourceFile::new("notes.txt", Language::Unknown, "hello");
        assert!(scanner.analyze_file(&file).is_none());
    }

    #[test]
    fn test_unsupported_language_keeps_file() {
        let scanner = Scanner::default();
        let file = SourceFile::new("main.go", Language::Go, "package main\n");
        let analysis = scanner.analyze_file(&file).unwrap();
        assert!(analysis.findings.is_none());
        assert_eq!(analysis.line_count, 1);
    }

    #[test]
    fn test_scan_counts_and_entities() {
        let group = RepositoryGroup::new("/repo")
            .with_file(SourceFile::new(
                "app.py",
                Language::Python,
                "def handler():\n    return 1\n",
            ))
            .with_file(SourceFile::new("main.go", Language::Go, "package main\n"))
            .with_file(SourceFile::new(
                "requirements.txt",
                Language::Unknown,
                "flask==3.0.0\n",
            ));

        let output = Scanner::default().scan(&[group]);
        assert_eq!(output.stats.repositories, 1);
        assert_eq!(output.stats.files, 2);
        assert_eq!(output.stats.analyzed, 1);
        assert_eq!(output.stats.unsupported, 1);
        assert_eq!(output.stats.manifests, 1);

        let counts = output.graph.entity_counts();
        assert_eq!(counts[&EntityKind::File], 2);
        assert_eq!(counts[&EntityKind::Repository], 1);
        assert_eq!(counts[&EntityKind::Package], 1);
        assert_eq!(counts[&EntityKind::Function], 1);
    }

    #[test]
    fn test_malformed_manifest_is_skipped() {
        let scanner = Scanner::default();
        let file = SourceFile::new("package.json", Language::Unknown, "{ not json");
        assert!(scanner.read_manifest(&file).is_none());
    }
}
