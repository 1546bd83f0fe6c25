//! Ragdesk Generation Gateway
//!
//! Chat-completion provider abstraction: structured multi-turn requests,
//! streaming responses, and concrete provider implementations.

pub mod client;
pub mod factory;
pub mod providers;

pub use client::{
    ChatMessage, ChatRequest, ChatResponse, ChatStream, ChatStreamChunk, LlmClient, LlmUsage, Role,
};
pub use factory::create_client;
