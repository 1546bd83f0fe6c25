//! Ask command handler.
//!
//! Answers a question from the knowledge base, streaming the response to
//! stdout and persisting both turns to the session history.

use crate::runtime::Runtime;
use clap::Args;
use ragdesk_core::{config::AppConfig, AppResult};
use std::io::Write;

/// Ask a question grounded in the knowledge base
#[derive(Args, Debug)]
pub struct AskCommand {
    /// The question to ask
    pub question: String,

    /// Session id for conversation history
    #[arg(short, long, default_value = "user_001")]
    pub session: String,

    /// Disable streaming output
    #[arg(long)]
    pub no_stream: bool,

    /// Show the retrieved sources after the answer
    #[arg(long)]
    pub show_sources: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl AskCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing ask command for session '{}'", self.session);

        let runtime = Runtime::build(config, "cli")?;

        if self.json || self.no_stream {
            let answer = runtime.query.ask(&self.question, &self.session).await?;

            if self.json {
                let output = serde_json::json!({
                    "answer": answer.answer,
                    "session": self.session,
                    "sources": answer.sources.iter().map(|s| {
                        serde_json::json!({
                            "source": s.chunk.metadata.source,
                            "score": s.score,
                            "text": s.chunk.text,
                        })
                    }).collect::<Vec<_>>(),
                });
                println!("{}", serde_json::to_string_pretty(&output).unwrap());
            } else {
                println!("{}", answer.answer);
                if self.show_sources {
                    print_sources(&answer.sources);
                }
            }

            return Ok(());
        }

        // Streaming: render fragments as they arrive, then persist
        let pending = runtime
            .query
            .ask_streaming(&self.question, &self.session)
            .await?;
        let sources = pending.sources.clone();

        let result = pending
            .collect(|fragment| {
                print!("{}", fragment);
                std::io::stdout().flush().ok();
            })
            .await;

        println!();

        match result {
            Ok(_) => {
                if self.show_sources {
                    print_sources(&sources);
                }
                Ok(())
            }
            Err(e) => {
                // Interrupted generation: surface it, nothing was persisted
                eprintln!("服务暂时不可用，请稍后再试。");
                Err(e)
            }
        }
    }
}

fn print_sources(sources: &[ragdesk_knowledge::ScoredChunk]) {
    if sources.is_empty() {
        println!("\nSources: (no grounding available)");
        return;
    }

    println!("\nSources:");
    for scored in sources {
        println!(
            "- {} (score {:.3}): {}",
            scored.chunk.metadata.source,
            scored.score,
            snippet(&scored.chunk.text, 60)
        );
    }
}

fn snippet(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let cut: String = text.chars().take(max_chars).collect();
        format!("{}…", cut)
    }
}
