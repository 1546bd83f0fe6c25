//! Embedding gateway.
//!
//! External collaborator boundary: maps text to fixed-size vectors through
//! the `EmbeddingProvider` trait, with concrete providers under
//! [`providers`].

pub mod provider;
pub mod providers;

pub use provider::{create_provider, EmbeddingProvider};
pub use providers::hash::HashEmbedder;
pub use providers::ollama::OllamaEmbedder;
