//! Scan configuration.
//!
//! Every field is optional; an empty file is a valid configuration.

use std::fs;
use std::path::{Path, PathBuf};

use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::{Deserialize, Serialize};

use crate::analysis::{AnalysisOptions, ApiAliases};
use crate::graph::MatchOptions;
use crate::syntax::WalkLimits;

/// File names searched for when no configuration path is given.
pub const DEFAULT_CONFIG_NAMES: &[&str] = &["repograph.yaml", ".repograph.yaml"];

/// Top-level configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct Config {
    #[serde(default)]
    pub version: String,
    /// Syntax tree traversal ceilings.
    #[serde(default)]
    pub walker: WalkLimits,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub matching: MatchingConfig,
    /// Glob patterns for paths to exclude (e.g., "**/generated/**").
    #[serde(default)]
    pub excluded_paths: Vec<String>,
    /// Whether test files are scanned (default: true)
    #[serde(default)]
    pub include_test_files: Option<bool>,
    #[serde(default)]
    pub watch: WatchConfig,
}

/// Extra entries for the API classification alias tables.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct ApiConfig {
    /// Receiver names treated as HTTP clients (e.g. "gateway").
    #[serde(default)]
    pub client_aliases: Vec<String>,
    /// Receiver names treated as HTTP servers or routers.
    #[serde(default)]
    pub server_aliases: Vec<String>,
    /// Imported modules that mark a file as server code.
    #[serde(default)]
    pub server_modules: Vec<String>,
}

/// Cross-repository matching settings.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct MatchingConfig {
    /// Also match consumers and providers inside one repository.
    #[serde(default)]
    pub within_repository: bool,
    /// Matches scoring below this are dropped.
    #[serde(default)]
    pub min_confidence: f64,
}

/// Incremental session settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WatchConfig {
    /// Window in which repeated events for one file collapse (default: 100)
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
}

fn default_debounce_ms() -> u64 {
    100
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
        }
    }
}

impl Config {
    /// Parse a configuration from a YAML file.
    pub fn parse_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        Self::parse_str(&content)
    }

    pub fn parse_str(content: &str) -> anyhow::Result<Self> {
        // serde_yaml reads an empty document as null
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Config = serde_yaml::from_str(content)?;
        Ok(config)
    }

    /// Returns whether to include test files (defaults to true).
    pub fn should_include_test_files(&self) -> bool {
        self.include_test_files.unwrap_or(true)
    }

    pub fn analysis_options(&self) -> AnalysisOptions {
        AnalysisOptions {
            limits: self.walker,
            aliases: ApiAliases::with_extensions(
                &self.api.client_aliases,
                &self.api.server_aliases,
                &self.api.server_modules,
            ),
        }
    }

    pub fn match_options(&self) -> MatchOptions {
        MatchOptions {
            within_repository: self.matching.within_repository,
            min_confidence: self.matching.min_confidence,
        }
    }

    /// Compiled `excluded_paths`. Invalid patterns are an error.
    pub fn exclusions(&self) -> anyhow::Result<GlobSet> {
        let mut builder = GlobSetBuilder::new();
        for pattern in &self.excluded_paths {
            let glob = Glob::new(pattern).map_err(|e| {
                anyhow::anyhow!("invalid excluded_paths pattern {:?}: {}", pattern, e)
            })?;
            builder.add(glob);
        }
        Ok(builder.build()?)
    }
}

/// Find a configuration file in `dir`.
pub fn discover(dir: &Path) -> Option<PathBuf> {
    DEFAULT_CONFIG_NAMES
        .iter()
        .map(|name| dir.join(name))
        .find(|path| path.is_file())
}

/// Validate a configuration for correctness.
pub fn validate(config: &Config) -> anyhow::Result<()> {
    let limits = &config.walker;
    if limits.max_depth == 0 || limits.max_nodes == 0 || limits.max_children == 0 {
        anyhow::bail!("walker ceilings must be greater than zero");
    }

    let min = config.matching.min_confidence;
    if !(0.0..=1.0).contains(&min) {
        anyhow::bail!("matching.min_confidence must be within [0, 1], got {}", min);
    }

    config.exclusions()?;

    Ok(())
}
