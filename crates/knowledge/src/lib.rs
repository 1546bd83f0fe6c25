//! Ragdesk knowledge base.
//!
//! The retrieval-and-grounding pipeline: content-addressed deduplication,
//! boundary-aware chunking, embedding, a SQLite-backed vector index, an
//! in-memory BM25 lexical index, and hybrid retrieval with weighted rank
//! fusion.

pub mod chunker;
pub mod embeddings;
pub mod fingerprint;
pub mod ingest;
pub mod lexical;
pub mod retriever;
pub mod store;
pub mod types;

// Re-export commonly used types
pub use chunker::TextChunker;
pub use embeddings::{create_provider, EmbeddingProvider, HashEmbedder, OllamaEmbedder};
pub use fingerprint::FingerprintLedger;
pub use ingest::IngestionService;
pub use lexical::LexicalIndex;
pub use retriever::{FusionWeights, HybridRetriever};
pub use store::{SqliteVectorStore, VectorIndex};
pub use types::{
    BatchItem, BatchReport, ChunkMetadata, IngestOutcome, RawDocument, ScoredChunk, StoreStats,
    StoredChunk,
};
