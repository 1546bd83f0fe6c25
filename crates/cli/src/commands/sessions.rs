//! Sessions command handler.

use clap::{Args, Subcommand};
use ragdesk_chat::{FileHistoryStore, HistoryStore};
use ragdesk_core::{config::AppConfig, AppResult};

/// Manage conversation sessions
#[derive(Args, Debug)]
pub struct SessionsCommand {
    #[command(subcommand)]
    pub action: SessionsAction,
}

#[derive(Subcommand, Debug)]
pub enum SessionsAction {
    /// Show a session's history
    Show(SessionsShowCommand),
    /// Clear a session's history
    Clear(SessionsClearCommand),
}

#[derive(Args, Debug)]
pub struct SessionsShowCommand {
    /// Session id
    pub session: String,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl SessionsShowCommand {
    pub fn execute(&self, config: &AppConfig) -> AppResult<()> {
        let store = FileHistoryStore::new(config.history_dir())?;
        let turns = store.load(&self.session)?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&turns).unwrap());
        } else if turns.is_empty() {
            println!("Session '{}' has no history", self.session);
        } else {
            for turn in turns {
                let role = match turn.role {
                    ragdesk_chat::TurnRole::User => "user",
                    ragdesk_chat::TurnRole::Assistant => "assistant",
                };
                println!("[{}] {}", role, turn.content);
            }
        }

        Ok(())
    }
}

#[derive(Args, Debug)]
pub struct SessionsClearCommand {
    /// Session id
    pub session: String,
}

impl SessionsClearCommand {
    pub fn execute(&self, config: &AppConfig) -> AppResult<()> {
        let store = FileHistoryStore::new(config.history_dir())?;
        store.clear(&self.session)?;
        println!("Session '{}' cleared", self.session);

        Ok(())
    }
}

impl SessionsCommand {
    pub fn execute(&self, config: &AppConfig) -> AppResult<()> {
        match &self.action {
            SessionsAction::Show(cmd) => cmd.execute(config),
            SessionsAction::Clear(cmd) => cmd.execute(config),
        }
    }
}
