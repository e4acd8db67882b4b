//! AST-backed code analysis module.
//!
//! This module provides a language-agnostic interface for extracting
//! findings from source code using tree-sitter. Findings include:
//! - Declarations (classes, functions, methods, variables, type definitions)
//! - Call sites and imports
//! - API call sites, classified as provided or consumed
//! - Configuration reads, SQL table references, error messages and tests
//! - Spring Data repositories and Spring Security components
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐     ┌──────────────┐     ┌───────────────┐
//! │ Source Files    │────▶│ Analyzers    │────▶│ Findings      │
//! └─────────────────┘     │ (one walk    │     │ (per file)    │
//!                         │  per file)   │     └───────────────┘
//!                         └──────────────┘             │
//!                                                      ▼
//!                                              ┌───────────────┐
//!                                              │ graph::synth  │
//!                                              │ (entities)    │
//!                                              └───────────────┘
//! ```
//!
//! # Adding a New Language
//!
//! 1. Create a new module in `src/analysis/languages/` (e.g., `ruby.rs`)
//! 2. Implement the `LanguageAnalyzer` trait, collecting every finding in a
//!    single `syntax::walk`
//! 3. Register the analyzer in `languages/mod.rs`
//!
//! See `languages/python.rs` for a compact reference implementation.

pub mod classify;
mod findings;
pub mod heuristics;
mod languages;
mod traits;

pub use classify::ApiAliases;
pub use findings::{
    simple_name, ApiCall, CallSite, ColumnRef, ConfigRead, Declaration, DeclarationKind,
    DerivedQuery, Direction, ErrorEmission, ErrorKind, Findings, Import, Parameter,
    RepositoryInterface, SecurityComponent, Span, TableRef, TestCase, UrlMatcher,
};
pub use languages::{
    ant_match, derive_query_fields, get_analyzer, repository_framework, DotnetAnalyzer,
    EcmaScriptAnalyzer, JvmAnalyzer, Language, PythonAnalyzer,
};
pub use traits::{parse_with, AnalysisOptions, LanguageAnalyzer, ParsedFile};

use std::path::Path;

/// Parse and analyze one file with the analyzer for `language`.
///
/// Returns `Ok(None)` when no analyzer exists for the language.
pub fn analyze_source(
    language: Language,
    path: &Path,
    source: &[u8],
    options: &AnalysisOptions,
) -> anyhow::Result<Option<Findings>> {
    let Some(analyzer) = get_analyzer(language) else {
        return Ok(None);
    };
    let parsed = analyzer.parse(path, source)?;
    let findings = analyzer.extract_findings(&parsed, options)?;
    Ok(Some(findings))
}
