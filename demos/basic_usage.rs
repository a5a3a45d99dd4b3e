//! Basic usage example for the Research Retriever library.
//!
//! Builds a Boolean search, pulls matching records from every configured
//! database, and writes the deduplicated results as RIS and CSV.
//!
//! Set `NCBI_EMAIL` before running: PubMed and PMC refuse anonymous callers.

use anyhow::Context;
use research_retriever::utils::init_logging;
use research_retriever::{export, get_config, Aggregator, ExportFormat, MaxResults, SearchStrategy, SourceRegistry};
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging("info");

    let registry = SourceRegistry::from_config(&get_config()).context("Failed to configure sources")?;
    let registry = Arc::new(registry);

    println!("Initialized {} sources", registry.len());
    println!("Available sources: {}\n", registry.ids().collect::<Vec<_>>().join(", "));

    let strategy = SearchStrategy::new()
        .concept("surgical site infection", "wound infection\nSSI")
        .concept("caesarean section", "cesarean section")
        .exclude("Review")
        .years(2018, 2023);

    println!("Query: {}", strategy.fielded_query());
    println!("PubMed link: {}\n", strategy.links().pubmed);

    let result = Aggregator::new(registry)
        .pull(&strategy.queries(MaxResults::Limit(25)))
        .await;

    for failure in &result.failures {
        eprintln!("  {}", failure);
    }
    println!(
        "Retrieved {} records, {} after removing duplicates",
        result.retrieved,
        result.records.len()
    );

    for (i, record) in result.records.iter().take(3).enumerate() {
        println!("\n{}. {}", i + 1, record.title.as_deref().unwrap_or("(untitled)"));
        println!("   Authors: {}", record.authors_joined());
        if let Some(year) = &record.year {
            println!("   Year: {}", year);
        }
        if let Some(doi) = &record.doi {
            println!("   DOI: {}", doi);
        }
        if let Some(url) = &record.source_url {
            println!("   URL: {}", url);
        }
    }

    for format in [ExportFormat::Ris, ExportFormat::Csv] {
        let payload = export(&result.records, format)?;
        let path = payload.file_name("results");
        std::fs::write(&path, &payload.bytes).with_context(|| format!("Failed to write {}", path))?;
        println!("\nSaved {} ({})", path, payload.mime_type);
    }

    Ok(())
}
