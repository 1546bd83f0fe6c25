//! Component stack wiring.
//!
//! Builds the concrete pipeline (vector store, embedder, chunker, ledger,
//! retriever, history store, chat client) from one `AppConfig`. Every
//! component receives its configuration explicitly through its constructor.

use ragdesk_chat::{FileHistoryStore, PromptAssembler, QueryService};
use ragdesk_core::{AppConfig, AppError, AppResult};
use ragdesk_knowledge::{
    create_provider, FingerprintLedger, FusionWeights, HybridRetriever, IngestionService,
    SqliteVectorStore, TextChunker,
};
use std::sync::Arc;

/// The assembled application stack.
pub struct Runtime {
    pub ingestion: IngestionService,
    pub query: QueryService,
}

impl Runtime {
    /// Wire the full stack from configuration.
    pub fn build(config: &AppConfig, operator: &str) -> AppResult<Runtime> {
        config.ensure_data_dir()?;

        let store = Arc::new(SqliteVectorStore::open(
            &config.persist_directory(),
            &config.storage.collection_name,
        )?);

        let embedder = create_provider(
            &config.provider,
            &config.embedding_model,
            config.embedding_dimensions,
            config.endpoint.as_deref(),
        )?;

        let chunker = TextChunker::new(
            config.chunking.chunk_size,
            config.chunking.chunk_overlap,
            config.chunking.boundary_markers.clone(),
            config.chunking.max_unsplit_len,
        );

        let ledger = FingerprintLedger::open(config.fingerprint_path())?;

        let ingestion = IngestionService::new(
            store.clone(),
            embedder.clone(),
            chunker,
            ledger,
            operator,
        );

        let retriever = Arc::new(HybridRetriever::new(
            store,
            embedder,
            FusionWeights {
                semantic: config.retrieval.semantic_weight,
                lexical: config.retrieval.lexical_weight,
            },
        ));

        let history = Arc::new(FileHistoryStore::new(config.history_dir())?);

        let client = ragdesk_llm::create_client(
            &config.provider,
            config.endpoint.as_deref(),
            config.api_key.as_deref(),
        )
        .map_err(AppError::Config)?;

        let assembler = PromptAssembler::new(config.chat_model.as_str())?;

        let query = QueryService::new(
            retriever,
            history,
            client,
            assembler,
            config.retrieval.fan_out,
        );

        Ok(Runtime { ingestion, query })
    }
}
