//! Ingest command handler.
//!
//! Adds documents to the knowledge base: deduplicated, chunked, embedded,
//! stored. Directories are walked for .txt and .md files; every item in a
//! batch is processed independently.

use crate::runtime::Runtime;
use clap::Args;
use ragdesk_core::{config::AppConfig, AppResult};
use ragdesk_knowledge::RawDocument;
use std::path::{Path, PathBuf};

/// Add documents to the knowledge base
#[derive(Args, Debug)]
pub struct IngestCommand {
    /// Files or directories to ingest
    #[arg(required = true)]
    pub paths: Vec<PathBuf>,

    /// Operator recorded in chunk metadata
    #[arg(long, default_value = "cli")]
    pub operator: String,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl IngestCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing ingest command for {} paths", self.paths.len());

        let runtime = Runtime::build(config, &self.operator)?;

        let documents = collect_documents(&self.paths)?;
        if documents.is_empty() {
            println!("No .txt or .md documents found under the given paths");
            return Ok(());
        }

        tracing::info!("Ingesting {} documents", documents.len());
        let report = runtime.ingestion.ingest_batch(documents).await;

        if self.json {
            let output = serde_json::json!({
                "ingested": report.ingested_count(),
                "skipped": report.skipped_count(),
                "failed": report.failed_count(),
                "items": report.items.iter().map(|item| {
                    serde_json::json!({
                        "name": item.name,
                        "result": match &item.result {
                            Ok(outcome) => serde_json::to_value(outcome).unwrap_or_default(),
                            Err(e) => serde_json::json!({ "error": e }),
                        }
                    })
                }).collect::<Vec<_>>(),
            });
            println!("{}", serde_json::to_string_pretty(&output).unwrap());
        } else {
            for item in &report.items {
                match &item.result {
                    Ok(outcome) => println!("{}: {:?}", item.name, outcome),
                    Err(e) => println!("{}: FAILED ({})", item.name, e),
                }
            }
            println!(
                "Done: {} ingested, {} skipped, {} failed",
                report.ingested_count(),
                report.skipped_count(),
                report.failed_count()
            );
        }

        Ok(())
    }
}

/// Expand files and directories into raw documents.
fn collect_documents(paths: &[PathBuf]) -> AppResult<Vec<RawDocument>> {
    let mut documents = Vec::new();

    for path in paths {
        if path.is_file() {
            documents.push(read_document(path)?);
        } else if path.is_dir() {
            for entry in walkdir::WalkDir::new(path)
                .follow_links(false)
                .into_iter()
                .filter_map(|e| e.ok())
            {
                let entry_path = entry.path();
                if entry_path.is_file() && is_supported(entry_path) {
                    documents.push(read_document(entry_path)?);
                }
            }
        } else {
            tracing::warn!("Path does not exist, skipping: {:?}", path);
        }
    }

    Ok(documents)
}

fn is_supported(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("txt") | Some("md")
    )
}

fn read_document(path: &Path) -> AppResult<RawDocument> {
    let bytes = std::fs::read(path)?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.to_string_lossy().to_string());

    Ok(RawDocument { name, bytes })
}
