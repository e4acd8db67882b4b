//! Command-line interface for repograph.

use clap::{Parser, Subcommand};
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use crate::config::{self, Config};
use crate::graph::Graph;
use crate::pipeline::Scanner;
use crate::report;
use crate::source::collect_repository;
use crate::store::{
    publish, GraphStore, JsonlStore, MemoryStore, PublishReport, SnapshotClock, SnapshotVersion,
};

/// Exit codes.
pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_FAILED: i32 = 1;
pub const EXIT_ERROR: i32 = 2;

/// Cross-repository code knowledge graph.
///
/// Repograph parses every supported file of one or more repositories,
/// extracts entities (files, classes, functions, APIs, configuration,
/// database tables, tests, errors) and links them, including API calls
/// that cross repository boundaries.
#[derive(Parser)]
#[command(name = "repograph")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable debug logging (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Scan repositories and publish the graph
    Scan(ScanArgs),
    /// Create a repograph configuration file
    Init(InitArgs),
}

/// Arguments for the scan command.
#[derive(Parser)]
pub struct ScanArgs {
    /// Repository roots to scan
    #[arg(required = true)]
    pub repos: Vec<PathBuf>,

    /// Path to configuration YAML file (default: auto-discover)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Write entities and relationships as JSON lines to this file
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Output format: pretty or json
    #[arg(short, long, default_value = "pretty")]
    pub format: String,

    /// Exit non-zero if any file failed to parse
    #[arg(long)]
    pub strict: bool,
}

/// Arguments for the init command.
#[derive(Parser)]
pub struct InitArgs {
    /// Output file path
    #[arg(short, long, default_value = "repograph.yaml")]
    pub output: PathBuf,
}

const DEFAULT_TEMPLATE: &str = include_str!("templates/repograph.yaml");

/// Load the configuration named on the command line, or a discovered one,
/// or the defaults.
fn load_config(path: Option<&Path>) -> anyhow::Result<(Config, Option<PathBuf>)> {
    let path = match path {
        Some(p) => Some(p.to_path_buf()),
        None => config::discover(Path::new(".")),
    };
    let config = match &path {
        Some(p) => Config::parse_file(p)
            .map_err(|e| anyhow::anyhow!("parsing {}: {}", p.display(), e))?,
        None => Config::default(),
    };
    config::validate(&config)?;
    Ok((config, path))
}

/// Run the scan command.
pub fn run_scan(args: &ScanArgs) -> anyhow::Result<i32> {
    // Validate format
    if args.format != "pretty" && args.format != "json" {
        eprintln!(
            "Error: invalid format {:?}, must be 'pretty' or 'json'",
            args.format
        );
        return Ok(EXIT_ERROR);
    }

    let config = match load_config(args.config.as_deref()) {
        Ok((config, path)) => {
            if let Some(path) = path {
                tracing::debug!(config = %path.display(), "loaded configuration");
            }
            config
        }
        Err(e) => {
            eprintln!("Error: invalid configuration: {}", e);
            return Ok(EXIT_ERROR);
        }
    };

    // Collect files
    let mut groups = Vec::with_capacity(args.repos.len());
    for repo in &args.repos {
        match collect_repository(repo, &config) {
            Ok(group) => groups.push(group),
            Err(e) => {
                eprintln!("Error: {}", e);
                return Ok(EXIT_ERROR);
            }
        }
    }
    let roots: Vec<String> = groups.iter().map(|g| g.repo_root.clone()).collect();

    if groups.iter().all(|g| g.files.is_empty()) {
        eprintln!("Warning: no files to scan");
    }

    let scanner = Scanner::from_config(&config);
    let scan = scanner.scan(&groups);

    // Publish
    let snapshot = Some(SnapshotClock::new().next());
    let published = match &args.output {
        Some(path) => {
            let file = match File::create(path) {
                Ok(f) => f,
                Err(e) => {
                    eprintln!("Error: cannot create {}: {}", path.display(), e);
                    return Ok(EXIT_ERROR);
                }
            };
            let mut store = JsonlStore::new(BufWriter::new(file));
            publish_or_report(&mut store, &scan.graph, snapshot)
        }
        None => {
            let mut store = MemoryStore::new();
            publish_or_report(&mut store, &scan.graph, snapshot)
        }
    };
    let Some(published) = published else {
        return Ok(EXIT_ERROR);
    };

    // Output results
    let output = args.output.as_ref().map(|p| p.to_string_lossy().to_string());
    match args.format.as_str() {
        "json" => report::write_json(&roots, output.as_deref(), &scan, &published)?,
        _ => report::write_pretty(&roots, output.as_deref(), &scan, &published),
    }

    if args.strict && scan.stats.failed > 0 {
        Ok(EXIT_FAILED)
    } else {
        Ok(EXIT_SUCCESS)
    }
}

fn publish_or_report(
    store: &mut dyn GraphStore,
    graph: &Graph,
    snapshot: Option<SnapshotVersion>,
) -> Option<PublishReport> {
    match publish(store, graph, snapshot) {
        Ok(report) => Some(report),
        Err(e) => {
            eprintln!("Error: publishing graph: {}", e);
            None
        }
    }
}

/// Run the init command.
pub fn run_init(args: &InitArgs) -> anyhow::Result<i32> {
    // Check if output already exists
    if args.output.exists() {
        eprintln!("Error: file already exists: {}", args.output.display());
        eprintln!("Remove it or use --output to specify a different path");
        return Ok(EXIT_ERROR);
    }

    // Create output directory if needed
    if let Some(parent) = args.output.parent() {
        if !parent.as_os_str().is_empty() && parent != Path::new(".") {
            if let Err(e) = std::fs::create_dir_all(parent) {
                eprintln!("Error: failed to create directory: {}", e);
                return Ok(EXIT_ERROR);
            }
        }
    }

    if let Err(e) = std::fs::write(&args.output, DEFAULT_TEMPLATE) {
        eprintln!("Error: failed to write configuration: {}", e);
        return Ok(EXIT_ERROR);
    }

    println!("Created {}", args.output.display());
    println!();
    println!("Next steps:");
    println!("  1. Edit {} to customize the scan", args.output.display());
    println!(
        "  2. Run: repograph scan <repo>... --config {}",
        args.output.display()
    );

    Ok(EXIT_SUCCESS)
}
