//! Repograph - cross-repository code knowledge graph.
//!
//! Repograph parses the source files of one or more repositories, extracts
//! typed entities and links them into a labeled property graph: files,
//! classes, functions, API call sites, configuration reads, database
//! tables, tests, error messages and framework constructs, plus the
//! relationships between them, including API calls that cross repository
//! boundaries.
//!
//! # Architecture
//!
//! - `syntax`: bounded, cycle-safe syntax tree walker
//! - `analysis`: per-language analyzers producing per-file findings
//! - `manifest`: package manifest parsers
//! - `graph`: entity synthesis, stable ids, relationship building and
//!   cross-repository API matching
//! - `store`: graph store adapters (in-memory, JSON lines)
//! - `source` and `pipeline`: file collection and the scan pipeline
//! - `watch`: change coalescing and incremental recomputation
//! - `config`, `report`, `cli`: configuration and the command line
//!
//! # Adding a New Language
//!
//! See `src/analysis/languages/` for examples. Implement the
//! `LanguageAnalyzer` trait and register it in `languages/mod.rs`.

pub mod analysis;
pub mod cli;
pub mod config;
pub mod graph;
pub mod manifest;
pub mod pipeline;
pub mod report;
pub mod source;
pub mod store;
pub mod syntax;
pub mod watch;

pub use analysis::{AnalysisOptions, Findings, Language, LanguageAnalyzer};
pub use config::Config;
pub use graph::{build_graph, Entity, EntityKind, Graph, Relationship, RelationshipType};
pub use pipeline::{ScanOutput, ScanStats, Scanner};
pub use source::{collect_repository, RepositoryGroup, SourceFile};
pub use store::{publish, GraphStore, JsonlStore, MemoryStore, SnapshotClock, StoreError};
pub use watch::{ChangeCoalescer, ChangeKind, FileChange, IncrementalSession};
