//! Ingestion service: dedup → chunk → embed → store.
//!
//! Each document flows through the content deduplicator first; only unseen
//! content is chunked, embedded and inserted into the vector index, after
//! which its fingerprint is recorded. Batch ingestion isolates items: one
//! document's failure never aborts the rest.

use crate::chunker::TextChunker;
use crate::embeddings::EmbeddingProvider;
use crate::fingerprint::FingerprintLedger;
use crate::store::VectorIndex;
use crate::types::{
    BatchItem, BatchReport, ChunkMetadata, IngestOutcome, RawDocument, StoreStats, StoredChunk,
};
use chrono::Utc;
use ragdesk_core::AppResult;
use std::sync::{Arc, Mutex};

/// Orchestrates the "add document" use case.
pub struct IngestionService {
    store: Arc<dyn VectorIndex>,
    embedder: Arc<dyn EmbeddingProvider>,
    chunker: TextChunker,
    ledger: Mutex<FingerprintLedger>,
    operator: String,
}

impl IngestionService {
    pub fn new(
        store: Arc<dyn VectorIndex>,
        embedder: Arc<dyn EmbeddingProvider>,
        chunker: TextChunker,
        ledger: FingerprintLedger,
        operator: impl Into<String>,
    ) -> Self {
        Self {
            store,
            embedder,
            chunker,
            ledger: Mutex::new(ledger),
            operator: operator.into(),
        }
    }

    /// Ingest one document's text under a source name.
    ///
    /// Duplicate and empty content are normal outcomes, not errors; the
    /// duplicate check always precedes the store insert, and the
    /// fingerprint is recorded only after a successful insert.
    pub async fn ingest_text(&self, text: &str, source: &str) -> AppResult<IngestOutcome> {
        if text.trim().is_empty() {
            tracing::warn!("Skipping empty document '{}'", source);
            return Ok(IngestOutcome::EmptySkipped);
        }

        {
            let ledger = self
                .ledger
                .lock()
                .map_err(|_| ragdesk_core::AppError::Knowledge("Ledger lock poisoned".into()))?;
            if ledger.is_duplicate(text) {
                tracing::info!("Skipping duplicate content for '{}'", source);
                return Ok(IngestOutcome::DuplicateSkipped);
            }
        }

        let pieces = self.chunker.split(text);
        if pieces.is_empty() {
            return Ok(IngestOutcome::EmptySkipped);
        }

        let embeddings = self.embedder.embed_batch(&pieces).await?;

        let created_at = Utc::now();
        let chunks: Vec<StoredChunk> = pieces
            .into_iter()
            .map(|piece| StoredChunk {
                id: uuid::Uuid::new_v4().to_string(),
                text: piece,
                metadata: ChunkMetadata {
                    source: source.to_string(),
                    created_at,
                    operator: self.operator.clone(),
                },
            })
            .collect();

        let chunk_count = chunks.len();
        self.store.insert(chunks, embeddings)?;

        self.ledger
            .lock()
            .map_err(|_| ragdesk_core::AppError::Knowledge("Ledger lock poisoned".into()))?
            .record(text)?;

        tracing::info!("Ingested '{}' as {} chunks", source, chunk_count);

        Ok(IngestOutcome::Ingested {
            chunks: chunk_count,
        })
    }

    /// Ingest a batch of raw documents.
    ///
    /// Per-item isolation: undecodable bytes, empty content or a gateway
    /// failure for one document are reported in the item's slot while the
    /// remaining documents still run.
    pub async fn ingest_batch(&self, documents: Vec<RawDocument>) -> BatchReport {
        let mut report = BatchReport::default();

        for document in documents {
            let result = match String::from_utf8(document.bytes) {
                Ok(text) => self
                    .ingest_text(&text, &document.name)
                    .await
                    .map_err(|e| e.to_string()),
                Err(_) => Err("content is not valid UTF-8".to_string()),
            };

            if let Err(ref e) = result {
                tracing::error!("Failed to ingest '{}': {}", document.name, e);
            }

            report.items.push(BatchItem {
                name: document.name,
                result,
            });
        }

        tracing::info!(
            "Batch complete: {} ingested, {} skipped, {} failed",
            report.ingested_count(),
            report.skipped_count(),
            report.failed_count()
        );

        report
    }

    /// Delete every chunk of a source document.
    ///
    /// The fingerprint ledger is intentionally left untouched: it is
    /// append-only and never pruned, so re-ingesting identical content
    /// after a delete still reports a duplicate skip.
    pub fn delete_source(&self, source: &str) -> AppResult<usize> {
        self.store.delete_by_source(source)
    }

    /// Remove all chunks from the store. The ledger is never pruned.
    pub fn clear_all(&self) -> AppResult<()> {
        self.store.clear()
    }

    /// Store statistics.
    pub fn stats(&self) -> AppResult<StoreStats> {
        self.store.stats()
    }

    /// Distinct source names currently in the store.
    pub fn sources(&self) -> AppResult<Vec<String>> {
        self.store.sources()
    }

    /// Chunks stored for one source.
    pub fn chunks_for_source(&self, source: &str) -> AppResult<Vec<StoredChunk>> {
        self.store.get_by_source(source)
    }
}
