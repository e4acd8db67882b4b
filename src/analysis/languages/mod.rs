//! Language-specific analyzer implementations.
//!
//! One analyzer exists per language family. Analyzers are immutable and
//! created lazily on first use.

mod common;
mod dotnet;
mod ecmascript;
mod jvm;
mod python;
mod spring;

pub use dotnet::DotnetAnalyzer;
pub use ecmascript::EcmaScriptAnalyzer;
pub use jvm::JvmAnalyzer;
pub use python::PythonAnalyzer;
pub use spring::{ant_match, derive_query_fields, repository_framework};

use std::fmt;
use std::path::Path;

use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};

use super::LanguageAnalyzer;

/// Closed set of language identifiers accepted on input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    JavaScript,
    TypeScript,
    Tsx,
    Python,
    Java,
    CSharp,
    Go,
    Rust,
    Ruby,
    Kotlin,
    Unknown,
}

impl Language {
    pub fn as_str(&self) -> &'static str {
        match self {
            Language::JavaScript => "javascript",
            Language::TypeScript => "typescript",
            Language::Tsx => "tsx",
            Language::Python => "python",
            Language::Java => "java",
            Language::CSharp => "csharp",
            Language::Go => "go",
            Language::Rust => "rust",
            Language::Ruby => "ruby",
            Language::Kotlin => "kotlin",
            Language::Unknown => "unknown",
        }
    }

    /// Parse a language identifier; unrecognized identifiers are `Unknown`.
    pub fn parse(id: &str) -> Self {
        match id.to_lowercase().as_str() {
            "javascript" | "js" => Language::JavaScript,
            "typescript" | "ts" => Language::TypeScript,
            "tsx" => Language::Tsx,
            "python" | "py" => Language::Python,
            "java" => Language::Java,
            "csharp" | "c#" | "cs" => Language::CSharp,
            "go" => Language::Go,
            "rust" => Language::Rust,
            "ruby" => Language::Ruby,
            "kotlin" => Language::Kotlin,
            _ => Language::Unknown,
        }
    }

    /// Language for a file extension (without dot).
    pub fn from_extension(ext: &str) -> Self {
        match ext {
            "js" | "jsx" | "mjs" | "cjs" => Language::JavaScript,
            "ts" | "mts" | "cts" => Language::TypeScript,
            "tsx" => Language::Tsx,
            "py" | "pyi" => Language::Python,
            "java" => Language::Java,
            "cs" => Language::CSharp,
            "go" => Language::Go,
            "rs" => Language::Rust,
            "rb" => Language::Ruby,
            "kt" | "kts" => Language::Kotlin,
            _ => Language::Unknown,
        }
    }

    /// Language for a path, by extension.
    pub fn from_path(path: &Path) -> Self {
        path.extension()
            .and_then(|e| e.to_str())
            .map(Self::from_extension)
            .unwrap_or(Language::Unknown)
    }

    /// Whether an analyzer exists for this language.
    pub fn is_analyzed(&self) -> bool {
        get_analyzer(*self).is_some()
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Static storage for the JavaScript analyzer.
static JAVASCRIPT_ANALYZER: OnceCell<EcmaScriptAnalyzer> = OnceCell::new();

/// Static storage for the TypeScript analyzer.
static TYPESCRIPT_ANALYZER: OnceCell<EcmaScriptAnalyzer> = OnceCell::new();

/// Static storage for the TSX analyzer.
static TSX_ANALYZER: OnceCell<EcmaScriptAnalyzer> = OnceCell::new();

/// Static storage for the Python analyzer.
static PYTHON_ANALYZER: OnceCell<PythonAnalyzer> = OnceCell::new();

/// Static storage for the Java analyzer.
static JAVA_ANALYZER: OnceCell<JvmAnalyzer> = OnceCell::new();

/// Static storage for the C# analyzer.
static CSHARP_ANALYZER: OnceCell<DotnetAnalyzer> = OnceCell::new();

/// Get the analyzer for a language.
///
/// Returns None for recognized languages without an analyzer and for
/// `Unknown`.
pub fn get_analyzer(language: Language) -> Option<&'static dyn LanguageAnalyzer> {
    let analyzer: &'static dyn LanguageAnalyzer = match language {
        Language::JavaScript => JAVASCRIPT_ANALYZER.get_or_init(EcmaScriptAnalyzer::javascript),
        Language::TypeScript => TYPESCRIPT_ANALYZER.get_or_init(EcmaScriptAnalyzer::typescript),
        Language::Tsx => TSX_ANALYZER.get_or_init(EcmaScriptAnalyzer::tsx),
        Language::Python => PYTHON_ANALYZER.get_or_init(PythonAnalyzer::new),
        Language::Java => JAVA_ANALYZER.get_or_init(JvmAnalyzer::new),
        Language::CSharp => CSHARP_ANALYZER.get_or_init(DotnetAnalyzer::new),
        Language::Go | Language::Rust | Language::Ruby | Language::Kotlin | Language::Unknown => {
            return None
        }
    };
    Some(analyzer)
}
