//! Ragdesk chat layer.
//!
//! Conversation history persistence, prompt assembly with the grounding
//! protocol, and the query service that turns a question plus session id
//! into a grounded, streamed, history-aware answer.

pub mod history;
pub mod prompt;
pub mod service;

pub use history::{ChatTurn, FileHistoryStore, HistoryStore, TurnRole};
pub use prompt::{PromptAssembler, NO_CONTEXT_FALLBACK};
pub use service::{PendingAnswer, QueryAnswer, QueryService};
