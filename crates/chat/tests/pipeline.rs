//! End-to-end pipeline tests with a scripted generation gateway.
//!
//! The full stack (dedup, chunking, hash embeddings, SQLite vector store,
//! hybrid retrieval, prompt assembly, streaming accumulation, history) runs
//! against a stub LLM client that records the requests it receives.

use ragdesk_chat::{
    FileHistoryStore, HistoryStore, PromptAssembler, QueryService, TurnRole, NO_CONTEXT_FALLBACK,
};
use ragdesk_core::{AppError, AppResult};
use ragdesk_knowledge::{
    FingerprintLedger, FusionWeights, HashEmbedder, HybridRetriever, IngestOutcome,
    IngestionService, SqliteVectorStore, TextChunker,
};
use ragdesk_llm::{ChatRequest, ChatResponse, ChatStream, ChatStreamChunk, LlmClient, LlmUsage};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

/// Scripted gateway: streams canned fragments and records every request.
struct StubClient {
    fragments: Vec<String>,
    /// Yield an error after this many fragments
    fail_after: Option<usize>,
    /// End the stream without a completion marker
    omit_done: bool,
    requests: Mutex<Vec<ChatRequest>>,
}

impl StubClient {
    fn answering(fragments: &[&str]) -> Self {
        Self {
            fragments: fragments.iter().map(|s| s.to_string()).collect(),
            fail_after: None,
            omit_done: false,
            requests: Mutex::new(Vec::new()),
        }
    }

    fn failing_after(fragments: &[&str], after: usize) -> Self {
        Self {
            fail_after: Some(after),
            ..Self::answering(fragments)
        }
    }

    fn never_completing(fragments: &[&str]) -> Self {
        Self {
            omit_done: true,
            ..Self::answering(fragments)
        }
    }

    fn recorded_requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl LlmClient for StubClient {
    fn provider_name(&self) -> &str {
        "stub"
    }

    async fn complete(&self, request: &ChatRequest) -> AppResult<ChatResponse> {
        self.requests.lock().unwrap().push(request.clone());
        Ok(ChatResponse {
            content: self.fragments.concat(),
            model: request.model.clone(),
            usage: LlmUsage::default(),
            done: true,
        })
    }

    async fn stream(&self, request: &ChatRequest) -> AppResult<ChatStream> {
        self.requests.lock().unwrap().push(request.clone());

        let mut items: Vec<AppResult<ChatStreamChunk>> = Vec::new();

        for (i, fragment) in self.fragments.iter().enumerate() {
            if self.fail_after == Some(i) {
                items.push(Err(AppError::Llm("connection reset mid-stream".to_string())));
                return Ok(Box::pin(futures::stream::iter(items)));
            }

            items.push(Ok(ChatStreamChunk {
                content: fragment.clone(),
                model: request.model.clone(),
                done: false,
                usage: None,
            }));
        }

        if !self.omit_done {
            items.push(Ok(ChatStreamChunk {
                content: String::new(),
                model: request.model.clone(),
                done: true,
                usage: Some(LlmUsage::default()),
            }));
        }

        Ok(Box::pin(futures::stream::iter(items)))
    }
}

struct TestStack {
    ingestion: IngestionService,
    query: QueryService,
    history: Arc<FileHistoryStore>,
    client: Arc<StubClient>,
    _dir: TempDir,
}

fn stack(client: StubClient) -> TestStack {
    let dir = TempDir::new().unwrap();

    let store = Arc::new(SqliteVectorStore::open(&dir.path().join("store"), "rag").unwrap());
    let embedder = Arc::new(HashEmbedder::new(384));

    let chunker = TextChunker::new(
        1024,
        100,
        vec!["\n\n".into(), "\n".into(), "。".into(), "，".into()],
        1000,
    );
    let ledger = FingerprintLedger::open(dir.path().join("fingerprints.txt")).unwrap();

    let ingestion = IngestionService::new(
        store.clone(),
        embedder.clone(),
        chunker,
        ledger,
        "小刘",
    );

    let retriever = Arc::new(HybridRetriever::new(
        store,
        embedder,
        FusionWeights::default(),
    ));
    let history = Arc::new(FileHistoryStore::new(dir.path().join("chat_history")).unwrap());
    let client = Arc::new(client);
    let assembler = PromptAssembler::new("qwen2.5").unwrap();

    let query = QueryService::new(
        retriever,
        history.clone(),
        client.clone(),
        assembler,
        3,
    );

    TestStack {
        ingestion,
        query,
        history,
        client,
        _dir: dir,
    }
}

#[tokio::test]
async fn test_warranty_scenario_end_to_end() {
    let stack = stack(StubClient::answering(&["产品保修期", "为一年。"]));

    // Ingest the policy document
    let first = stack
        .ingestion
        .ingest_text("产品保修期为一年。", "policy.txt")
        .await
        .unwrap();
    assert_eq!(first, IngestOutcome::Ingested { chunks: 1 });

    // Re-ingesting identical text reports a skip, store unchanged
    let second = stack
        .ingestion
        .ingest_text("产品保修期为一年。", "policy.txt")
        .await
        .unwrap();
    assert_eq!(second, IngestOutcome::DuplicateSkipped);
    assert_eq!(stack.ingestion.stats().unwrap().chunk_count, 1);

    // Ask the warranty question
    let answer = stack.query.ask("保修期多久？", "user_001").await.unwrap();

    // The retrieval result includes the policy chunk and came back to the
    // caller as an explicit return value
    assert!(!answer.sources.is_empty());
    assert_eq!(answer.sources[0].chunk.text, "产品保修期为一年。");
    assert_eq!(answer.answer, "产品保修期为一年。");

    // The generation request carried the policy text in its context block
    let requests = stack.client.recorded_requests();
    assert_eq!(requests.len(), 1);
    assert!(requests[0].messages[0].content.contains("产品保修期为一年。"));
    assert!(requests[0].messages[0].content.contains("policy.txt"));

    // Both turns landed in the session history, in order
    let turns = stack.history.load("user_001").unwrap();
    assert_eq!(turns.len(), 2);
    assert_eq!(turns[0].role, TurnRole::User);
    assert_eq!(turns[0].content, "保修期多久？");
    assert_eq!(turns[1].role, TurnRole::Assistant);
    assert_eq!(turns[1].content, "产品保修期为一年。");
}

#[tokio::test]
async fn test_empty_corpus_uses_fallback_context() {
    let stack = stack(StubClient::answering(&["根据现有资料无法回答此问题。"]));

    let answer = stack.query.ask("保修期多久？", "user_002").await.unwrap();

    assert!(answer.sources.is_empty());

    let requests = stack.client.recorded_requests();
    assert!(requests[0].messages[0].content.contains(NO_CONTEXT_FALLBACK));
}

#[tokio::test]
async fn test_history_flows_into_next_turn() {
    let stack = stack(StubClient::answering(&["回答"]));

    stack
        .ingestion
        .ingest_text("产品保修期为一年。", "policy.txt")
        .await
        .unwrap();

    stack.query.ask("保修期多久？", "user_003").await.unwrap();
    stack.query.ask("那退货呢？", "user_003").await.unwrap();

    let requests = stack.client.recorded_requests();
    assert_eq!(requests.len(), 2);

    // The second request replays the first turn's question and answer
    // between the history header and the new question
    let second = &requests[1];
    let contents: Vec<&str> = second.messages.iter().map(|m| m.content.as_str()).collect();
    assert!(contents.contains(&"保修期多久？"));
    assert!(contents.contains(&"回答"));
    assert!(second.messages.last().unwrap().content.contains("那退货呢？"));
}

#[tokio::test]
async fn test_mid_stream_failure_appends_nothing() {
    let stack = stack(StubClient::failing_after(&["部分", "输出"], 1));

    stack
        .ingestion
        .ingest_text("产品保修期为一年。", "policy.txt")
        .await
        .unwrap();

    let result = stack.query.ask("保修期多久？", "user_004").await;
    assert!(result.is_err());

    // Partial output must not be persisted as if complete
    assert!(stack.history.load("user_004").unwrap().is_empty());
}

#[tokio::test]
async fn test_stream_without_completion_marker_is_an_error() {
    let stack = stack(StubClient::never_completing(&["悬空的输出"]));

    let result = stack.query.ask("问题", "user_005").await;
    assert!(result.is_err());
    assert!(stack.history.load("user_005").unwrap().is_empty());
}

#[tokio::test]
async fn test_streaming_renders_fragments_in_order() {
    let stack = stack(StubClient::answering(&["第一", "第二", "第三"]));

    let pending = stack
        .query
        .ask_streaming("问题", "user_006")
        .await
        .unwrap();

    let mut seen: Vec<String> = Vec::new();
    let full = pending.collect(|fragment| seen.push(fragment.to_string())).await.unwrap();

    assert_eq!(seen, vec!["第一", "第二", "第三"]);
    assert_eq!(full, "第一第二第三");
}

#[tokio::test]
async fn test_sessions_do_not_share_history() {
    let stack = stack(StubClient::answering(&["答"]));

    stack.query.ask("问题甲", "alice").await.unwrap();
    stack.query.ask("问题乙", "bob").await.unwrap();

    let alice = stack.history.load("alice").unwrap();
    let bob = stack.history.load("bob").unwrap();

    assert_eq!(alice.len(), 2);
    assert_eq!(bob.len(), 2);
    assert_eq!(alice[0].content, "问题甲");
    assert_eq!(bob[0].content, "问题乙");
}

#[tokio::test]
async fn test_clear_session() {
    let stack = stack(StubClient::answering(&["答"]));

    stack.query.ask("问题", "user_007").await.unwrap();
    assert_eq!(stack.history.load("user_007").unwrap().len(), 2);

    stack.query.clear_session("user_007").unwrap();
    assert!(stack.history.load("user_007").unwrap().is_empty());
}
