//! Stats command handler.

use crate::runtime::Runtime;
use clap::Args;
use ragdesk_core::{config::AppConfig, AppResult};

/// Show knowledge base statistics
#[derive(Args, Debug)]
pub struct StatsCommand {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl StatsCommand {
    pub fn execute(&self, config: &AppConfig) -> AppResult<()> {
        let runtime = Runtime::build(config, "cli")?;
        let stats = runtime.ingestion.stats()?;

        if self.json {
            let output = serde_json::json!({
                "collection": config.storage.collection_name,
                "chunkCount": stats.chunk_count,
                "sourceCount": stats.source_count,
            });
            println!("{}", serde_json::to_string_pretty(&output).unwrap());
        } else {
            println!("Collection: {}", config.storage.collection_name);
            println!("  Sources: {}", stats.source_count);
            println!("  Chunks: {}", stats.chunk_count);
        }

        Ok(())
    }
}
