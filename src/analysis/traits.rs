//! Core traits for language analysis.

use std::path::Path;

use tree_sitter::{Language, Parser};

use super::{ApiAliases, Findings};
use crate::syntax::WalkLimits;

/// Holds a parsed tree-sitter tree and associated metadata.
pub struct ParsedFile {
    /// The tree-sitter parse tree.
    pub tree: tree_sitter::Tree,
    /// The original source code (kept for node text extraction).
    pub source: Vec<u8>,
    /// The file path (for error reporting).
    pub path: String,
}

impl ParsedFile {
    /// Get the source code as a string slice.
    pub fn source_str(&self) -> &str {
        std::str::from_utf8(&self.source).unwrap_or("")
    }

    /// Get text for a tree-sitter node.
    pub fn node_text(&self, node: tree_sitter::Node) -> &str {
        node.utf8_text(&self.source).unwrap_or("")
    }
}

/// Settings shared by every analyzer for one scan.
#[derive(Debug, Clone, Default)]
pub struct AnalysisOptions {
    pub limits: WalkLimits,
    pub aliases: ApiAliases,
}

/// Parse `source` with a tree-sitter grammar.
///
/// A fresh parser is created per call because `tree_sitter::Parser`
/// is not `Sync`.
pub fn parse_with(language: &Language, path: &Path, source: &[u8]) -> anyhow::Result<ParsedFile> {
    let mut parser = Parser::new();
    parser.set_language(language)?;
    let tree = parser
        .parse(source, None)
        .ok_or_else(|| anyhow::anyhow!("failed to parse {}", path.display()))?;

    Ok(ParsedFile {
        tree,
        source: source.to_vec(),
        path: path.to_string_lossy().to_string(),
    })
}

/// Language-specific analyzer trait.
///
/// One implementation exists per language family. Implementations must
/// gather every kind of finding in a single walk of the tree.
pub trait LanguageAnalyzer: Send + Sync {
    /// Returns the language identifier (e.g., "python", "tsx").
    fn language_id(&self) -> &'static str;

    /// Returns file extensions this analyzer handles (without dot).
    fn file_extensions(&self) -> &'static [&'static str];

    /// Parse a source file into a tree-sitter tree.
    ///
    /// Partial parse errors still produce a tree with ERROR nodes.
    fn parse(&self, path: &Path, source: &[u8]) -> anyhow::Result<ParsedFile>;

    /// Extract findings from a parsed file.
    fn extract_findings(
        &self,
        parsed: &ParsedFile,
        options: &AnalysisOptions,
    ) -> anyhow::Result<Findings>;

    /// Check if this analyzer handles the given file extension.
    fn handles_extension(&self, ext: &str) -> bool {
        self.file_extensions().contains(&ext)
    }
}
