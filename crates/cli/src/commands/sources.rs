//! Sources command handler.
//!
//! Knowledge base management: list sources, inspect a source's chunks,
//! delete a source, or clear the whole store.

use crate::runtime::Runtime;
use clap::{Args, Subcommand};
use ragdesk_core::{config::AppConfig, AppError, AppResult};

/// Manage knowledge base sources
#[derive(Args, Debug)]
pub struct SourcesCommand {
    #[command(subcommand)]
    pub action: SourcesAction,
}

#[derive(Subcommand, Debug)]
pub enum SourcesAction {
    /// List source documents
    List(SourcesListCommand),
    /// Show the chunks of one source
    Show(SourcesShowCommand),
    /// Delete one source and all its chunks
    Delete(SourcesDeleteCommand),
    /// Remove every chunk from the store
    Clear(SourcesClearCommand),
}

#[derive(Args, Debug)]
pub struct SourcesListCommand {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl SourcesListCommand {
    pub fn execute(&self, runtime: &Runtime) -> AppResult<()> {
        let sources = runtime.ingestion.sources()?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&sources).unwrap());
        } else if sources.is_empty() {
            println!("Knowledge base is empty");
        } else {
            for source in sources {
                println!("{}", source);
            }
        }

        Ok(())
    }
}

#[derive(Args, Debug)]
pub struct SourcesShowCommand {
    /// Source document name
    pub source: String,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl SourcesShowCommand {
    pub fn execute(&self, runtime: &Runtime) -> AppResult<()> {
        let chunks = runtime.ingestion.chunks_for_source(&self.source)?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&chunks).unwrap());
            return Ok(());
        }

        if chunks.is_empty() {
            println!("No chunks stored for source '{}'", self.source);
            return Ok(());
        }

        println!("Source: {} ({} chunks)", self.source, chunks.len());
        for (i, chunk) in chunks.iter().enumerate() {
            println!();
            println!(
                "[{}] ingested {} by {}",
                i + 1,
                chunk.metadata.created_at.format("%Y-%m-%d %H:%M:%S"),
                chunk.metadata.operator
            );
            println!("{}", chunk.text);
        }

        Ok(())
    }
}

#[derive(Args, Debug)]
pub struct SourcesDeleteCommand {
    /// Source document name
    pub source: String,
}

impl SourcesDeleteCommand {
    pub fn execute(&self, runtime: &Runtime) -> AppResult<()> {
        let deleted = runtime.ingestion.delete_source(&self.source)?;

        if deleted == 0 {
            println!("No chunks found for source '{}'", self.source);
        } else {
            println!("Deleted {} chunks of source '{}'", deleted, self.source);
        }

        Ok(())
    }
}

#[derive(Args, Debug)]
pub struct SourcesClearCommand {
    /// Confirm the destructive operation
    #[arg(long)]
    pub yes: bool,
}

impl SourcesClearCommand {
    pub fn execute(&self, runtime: &Runtime) -> AppResult<()> {
        if !self.yes {
            return Err(AppError::Config(
                "Clearing the knowledge base is irreversible; pass --yes to confirm".to_string(),
            ));
        }

        runtime.ingestion.clear_all()?;
        println!("Knowledge base cleared");

        Ok(())
    }
}

impl SourcesCommand {
    pub fn execute(&self, config: &AppConfig) -> AppResult<()> {
        let runtime = Runtime::build(config, "cli")?;

        match &self.action {
            SourcesAction::List(cmd) => cmd.execute(&runtime),
            SourcesAction::Show(cmd) => cmd.execute(&runtime),
            SourcesAction::Delete(cmd) => cmd.execute(&runtime),
            SourcesAction::Clear(cmd) => cmd.execute(&runtime),
        }
    }
}
