//! Output formatting for scan results.
//!
//! Supports two output formats:
//! - Pretty: colored terminal summary for human readability
//! - JSON: structured summary for programmatic consumption

use std::collections::BTreeMap;

use colored::*;
use serde::{Deserialize, Serialize};

use crate::graph::{Graph, RelationshipType};
use crate::pipeline::{ScanOutput, ScanStats};
use crate::store::PublishReport;

/// JSON report structure.
#[derive(Debug, Serialize, Deserialize)]
pub struct JsonReport {
    pub version: String,
    pub repositories: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshot: Option<u64>,
    pub files: usize,
    pub analyzed: usize,
    pub unsupported: usize,
    pub failed: usize,
    pub truncated: usize,
    pub manifests: usize,
    pub entities: BTreeMap<String, usize>,
    pub relationships: BTreeMap<String, usize>,
    pub api_links: Vec<ApiLink>,
}

/// One `ConsumesApiFrom` edge, by repository name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiLink {
    pub consumer: String,
    pub provider: String,
    pub confidence: f64,
    pub match_count: usize,
}

/// Cross-repository API links, strongest first.
pub fn api_links(graph: &Graph) -> Vec<ApiLink> {
    let name = |id: &str| {
        graph
            .entity(id)
            .map(|e| e.name.clone())
            .unwrap_or_else(|| id.to_string())
    };
    let mut links: Vec<ApiLink> = graph
        .relationships_of(RelationshipType::ConsumesApiFrom)
        .map(|r| ApiLink {
            consumer: name(&r.from),
            provider: name(&r.to),
            confidence: r.property_f64("confidence").unwrap_or(0.0),
            match_count: r
                .properties
                .get("matchCount")
                .and_then(|v| v.as_u64())
                .unwrap_or(0) as usize,
        })
        .collect();
    links.sort_by(|a, b| {
        b.confidence
            .total_cmp(&a.confidence)
            .then_with(|| a.consumer.cmp(&b.consumer))
            .then_with(|| a.provider.cmp(&b.provider))
    });
    links
}

/// Build the JSON report.
pub fn json_report(
    repositories: &[String],
    output: Option<&str>,
    scan: &ScanOutput,
    published: &PublishReport,
) -> JsonReport {
    let stats = &scan.stats;
    JsonReport {
        version: env!("CARGO_PKG_VERSION").to_string(),
        repositories: repositories.to_vec(),
        output: output.map(str::to_string),
        snapshot: published.snapshot,
        files: stats.files,
        analyzed: stats.analyzed,
        unsupported: stats.unsupported,
        failed: stats.failed,
        truncated: stats.truncated,
        manifests: stats.manifests,
        entities: scan
            .graph
            .entity_counts()
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect(),
        relationships: scan
            .graph
            .relationship_counts()
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect(),
        api_links: api_links(&scan.graph),
    }
}

/// Write results in JSON format.
pub fn write_json(
    repositories: &[String],
    output: Option<&str>,
    scan: &ScanOutput,
    published: &PublishReport,
) -> anyhow::Result<()> {
    let report = json_report(repositories, output, scan, published);
    let json = serde_json::to_string_pretty(&report)?;
    println!("{}", json);
    Ok(())
}

/// Write results in pretty format.
pub fn write_pretty(
    repositories: &[String],
    output: Option<&str>,
    scan: &ScanOutput,
    published: &PublishReport,
) {
    // Header
    println!();
    print!("  ");
    print!("{}", "repograph".cyan().bold());
    println!(" v{}", env!("CARGO_PKG_VERSION"));
    println!();

    for repo in repositories {
        print!("  {}", "Scanning: ".dimmed());
        println!("{}", repo);
    }
    if let Some(output) = output {
        print!("  {}", "Output:   ".dimmed());
        println!("{}", output);
    }
    println!();

    write_file_summary(&scan.stats);
    println!();

    write_counts("Entities", scan.graph.entity_counts());
    println!();
    write_counts("Relationships", scan.graph.relationship_counts());
    println!();

    let links = api_links(&scan.graph);
    if !links.is_empty() {
        write_api_links(&links);
        println!();
    }

    print!("  {}", "✓".green());
    print!(
        " Published {} entities and {} relationships",
        published.entities, published.relationships
    );
    if let Some(snapshot) = published.snapshot {
        print!("  {}", format!("(snapshot {})", snapshot).dimmed());
    }
    println!();
    println!();
}

fn write_file_summary(stats: &ScanStats) {
    print!("  Files: {}", stats.files.to_string().bold());
    print!("  Analyzed: {}", stats.analyzed.to_string().green());
    if stats.unsupported > 0 {
        print!("  Unsupported: {}", stats.unsupported.to_string().yellow());
    }
    if stats.failed > 0 {
        print!("  Failed: {}", stats.failed.to_string().red());
    }
    if stats.truncated > 0 {
        print!("  Truncated: {}", stats.truncated.to_string().yellow());
    }
    print!("  Manifests: {}", stats.manifests);
    println!();
}

fn write_counts<K: std::fmt::Display>(title: &str, counts: BTreeMap<K, usize>) {
    println!("  {}", title.bold());
    if counts.is_empty() {
        println!("    {}", "none".dimmed());
        return;
    }
    for (kind, count) in counts {
        println!("    {:<24} {}", kind.to_string(), count);
    }
}

fn write_api_links(links: &[ApiLink]) {
    println!("  {}", "Cross-repository APIs".bold());
    for link in links {
        let confidence = format!("{:.1}", link.confidence);
        let colored_confidence = match link.confidence {
            c if c >= 0.8 => confidence.green(),
            c if c >= 0.5 => confidence.yellow(),
            _ => confidence.red(),
        };
        println!(
            "    {} {} {}  {}  {}",
            link.consumer,
            "→".dimmed(),
            link.provider,
            colored_confidence,
            format!("({} matches)", link.match_count).dimmed()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{ids, Entity, EntityDetails, Relationship};
    use serde_json::json;

    fn repository(root: &str) -> Entity {
        Entity::new(ids::repository_id(root), root.trim_start_matches('/'), root, EntityDetails::Repository)
    }

    #[test]
    fn test_api_links_sorted_by_confidence() {
        let (a, b, c) = (repository("/a"), repository("/b"), repository("/c"));
        let edge = |from: &Entity, to: &Entity, confidence: f64| {
            Relationship::new(from.id.clone(), RelationshipType::ConsumesApiFrom, to.id.clone())
                .with_property("confidence", confidence)
                .with_property("matchCount", 2)
        };
        let mut entities = vec![a.clone(), b.clone(), c.clone()];
        entities.sort_by(|x, y| x.id.cmp(&y.id));
        let graph = Graph {
            entities,
            relationships: vec![edge(&a, &b, 0.6), edge(&c, &b, 1.0)],
        };

        let links = api_links(&graph);
        assert_eq!(links.len(), 2);
        assert_eq!(links[0].consumer, "c");
        assert_eq!(links[0].provider, "b");
        assert_eq!(links[0].match_count, 2);
        assert_eq!(links[1].confidence, 0.6);
    }

    #[test]
    fn test_json_report_counts() {
        let mut scan = ScanOutput::default();
        scan.graph.entities.push(repository("/a"));
        scan.stats.files = 3;
        let report = json_report(
            &["/a".to_string()],
            None,
            &scan,
            &PublishReport::default(),
        );
        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["files"], json!(3));
        assert_eq!(value["entities"]["Repository"], json!(1));
        assert!(value.get("output").is_none());
    }
}
