//! Knowledge system type definitions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Metadata attached to every stored chunk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkMetadata {
    /// Source document name (e.g., the uploaded file name)
    pub source: String,

    /// When the chunk was ingested
    pub created_at: DateTime<Utc>,

    /// Who ingested it
    pub operator: String,
}

/// A stored document chunk. Immutable once written; removed only by
/// deleting its source or clearing the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredChunk {
    /// Unique chunk identifier
    pub id: String,

    /// Text content
    pub text: String,

    /// Ingestion metadata
    pub metadata: ChunkMetadata,
}

/// A chunk paired with a relevance score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredChunk {
    pub chunk: StoredChunk,
    pub score: f32,
}

/// Statistics for the knowledge store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreStats {
    /// Number of stored chunks
    pub chunk_count: usize,

    /// Number of distinct source documents
    pub source_count: usize,
}

/// Outcome of ingesting a single document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum IngestOutcome {
    /// Content was chunked, embedded and stored
    Ingested { chunks: usize },

    /// Identical content was ingested before; nothing was stored
    DuplicateSkipped,

    /// Content was empty after normalization; nothing was stored
    EmptySkipped,
}

/// A raw document handed to batch ingestion before decoding.
#[derive(Debug, Clone)]
pub struct RawDocument {
    /// Display name (file name)
    pub name: String,

    /// Raw bytes, expected to be UTF-8
    pub bytes: Vec<u8>,
}

/// Per-item result within a batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchItem {
    /// Document name
    pub name: String,

    /// Outcome, or a per-item error message
    pub result: Result<IngestOutcome, String>,
}

/// Aggregated report for a batch ingestion.
///
/// One document's failure never aborts the rest of the batch; every item
/// is accounted for here.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchReport {
    pub items: Vec<BatchItem>,
}

impl BatchReport {
    pub fn ingested_count(&self) -> usize {
        self.items
            .iter()
            .filter(|i| matches!(i.result, Ok(IngestOutcome::Ingested { .. })))
            .count()
    }

    pub fn skipped_count(&self) -> usize {
        self.items
            .iter()
            .filter(|i| {
                matches!(
                    i.result,
                    Ok(IngestOutcome::DuplicateSkipped) | Ok(IngestOutcome::EmptySkipped)
                )
            })
            .count()
    }

    pub fn failed_count(&self) -> usize {
        self.items.iter().filter(|i| i.result.is_err()).count()
    }
}
