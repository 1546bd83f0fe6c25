//! Command handlers for the ragdesk CLI.
//!
//! This module organizes all CLI commands into separate submodules.

pub mod ask;
pub mod ingest;
pub mod sessions;
pub mod sources;
pub mod stats;

// Re-export command types for convenience
pub use ask::AskCommand;
pub use ingest::IngestCommand;
pub use sessions::SessionsCommand;
pub use sources::SourcesCommand;
pub use stats::StatsCommand;
