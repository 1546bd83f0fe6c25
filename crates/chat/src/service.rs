//! Query service: the "answer question" use case.
//!
//! One call runs the whole grounded turn: load the session history, retrieve
//! evidence for the raw question, assemble the generation request, stream
//! the response, and only once the stream completed append the question
//! and the fully-accumulated answer to the session history. A mid-stream
//! failure surfaces as an error and appends nothing; partial output is never
//! persisted.
//!
//! Requests within one session are serialized through a per-session mutex;
//! different sessions proceed fully in parallel.

use crate::history::{ChatTurn, HistoryStore};
use crate::prompt::PromptAssembler;
use futures::StreamExt;
use ragdesk_core::{AppError, AppResult};
use ragdesk_knowledge::{HybridRetriever, ScoredChunk};
use ragdesk_llm::{ChatStream, LlmClient};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Final answer plus the retrieval result that grounded it.
#[derive(Debug, Clone)]
pub struct QueryAnswer {
    pub answer: String,
    pub sources: Vec<ScoredChunk>,
}

/// Orchestrates retrieval, prompt assembly, generation and history.
pub struct QueryService {
    retriever: Arc<HybridRetriever>,
    history: Arc<dyn HistoryStore>,
    client: Arc<dyn LlmClient>,
    assembler: PromptAssembler,
    fan_out: usize,
    session_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl QueryService {
    pub fn new(
        retriever: Arc<HybridRetriever>,
        history: Arc<dyn HistoryStore>,
        client: Arc<dyn LlmClient>,
        assembler: PromptAssembler,
        fan_out: usize,
    ) -> Self {
        Self {
            retriever,
            history,
            client,
            assembler,
            fan_out,
            session_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Answer a question in a session, accumulating the stream internally.
    pub async fn ask(&self, question: &str, session_id: &str) -> AppResult<QueryAnswer> {
        let pending = self.ask_streaming(question, session_id).await?;
        let sources = pending.sources.clone();
        let answer = pending.collect(|_| {}).await?;

        Ok(QueryAnswer { answer, sources })
    }

    /// Start answering a question, returning the retrieval result and the
    /// open generation stream.
    ///
    /// The caller drives the stream through [`PendingAnswer::collect`];
    /// history is written only after the stream completes successfully.
    pub async fn ask_streaming(
        &self,
        question: &str,
        session_id: &str,
    ) -> AppResult<PendingAnswer> {
        if question.trim().is_empty() {
            return Err(AppError::Other("Question must not be empty".to_string()));
        }

        let guard = self.acquire_session(session_id).await;

        let history_turns = self.history.load(session_id)?;

        // Retrieval sees only the raw question, never the history.
        let sources = self.retriever.retrieve(question, self.fan_out).await?;

        tracing::info!(
            "Answering in session '{}': {} history turns, {} grounding chunks",
            session_id,
            history_turns.len(),
            sources.len()
        );

        let request = self
            .assembler
            .build_request(question, &history_turns, &sources)?
            .with_streaming();

        let stream = self.client.stream(&request).await?;

        Ok(PendingAnswer {
            sources,
            stream,
            history: self.history.clone(),
            session_id: session_id.to_string(),
            question: question.to_string(),
            _guard: guard,
        })
    }

    /// Clear a session's history.
    pub fn clear_session(&self, session_id: &str) -> AppResult<()> {
        self.history.clear(session_id)
    }

    /// Acquire (creating lazily) the per-session lock.
    async fn acquire_session(&self, session_id: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.session_locks.lock().await;
            locks
                .entry(session_id.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };

        lock.lock_owned().await
    }
}

/// An in-flight answer: the retrieval result is already known, the response
/// stream is still open.
pub struct PendingAnswer {
    /// Chunks the answer will be grounded on, in fused rank order.
    pub sources: Vec<ScoredChunk>,

    stream: ChatStream,
    history: Arc<dyn HistoryStore>,
    session_id: String,
    question: String,
    _guard: OwnedMutexGuard<()>,
}

impl PendingAnswer {
    /// Drain the stream, invoking `render` for every fragment.
    ///
    /// On successful completion the question and the fully-accumulated
    /// answer are appended to the session history in one write, and the
    /// final text is returned. On a mid-stream error (or a stream that
    /// ends without its completion marker) the error is returned and no
    /// turn is appended.
    pub async fn collect<F>(mut self, mut render: F) -> AppResult<String>
    where
        F: FnMut(&str),
    {
        let mut full = String::new();
        let mut completed = false;

        while let Some(result) = self.stream.next().await {
            let chunk = result?;

            if !chunk.content.is_empty() {
                full.push_str(&chunk.content);
                render(&chunk.content);
            }

            if chunk.done {
                completed = true;
                break;
            }
        }

        if !completed {
            return Err(AppError::Llm(
                "Generation stream ended before completion".to_string(),
            ));
        }

        self.history.append(
            &self.session_id,
            &[
                ChatTurn::user(self.question.clone()),
                ChatTurn::assistant(full.clone()),
            ],
        )?;

        tracing::info!(
            "Completed answer for session '{}' ({} chars)",
            self.session_id,
            full.chars().count()
        );

        Ok(full)
    }
}
