//! Hybrid retrieval with weighted rank fusion.
//!
//! Two independent sub-queries per retrieval: a semantic nearest-neighbor
//! query against the vector index and a BM25 ranking against the in-memory
//! lexical index. Both candidate lists are min-max normalized to [0, 1] and
//! fused with configurable weights (semantic 0.7 / lexical 0.3 by default);
//! an item missing from one list contributes 0 from that list. Ties break
//! toward the earlier semantic rank.
//!
//! The lexical index is a cache over the store's current contents, rebuilt
//! lazily on the first retrieval after a store mutation. Rebuild-vs-query
//! access is serialized through a read-write lock; a failed rebuild (e.g.
//! empty corpus) degrades retrieval to semantic-only with a warning, never
//! an error.

use crate::embeddings::EmbeddingProvider;
use crate::lexical::LexicalIndex;
use crate::store::VectorIndex;
use crate::types::{ScoredChunk, StoredChunk};
use ragdesk_core::AppResult;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Fusion weights for combining the two rankings.
#[derive(Debug, Clone, Copy)]
pub struct FusionWeights {
    pub semantic: f32,
    pub lexical: f32,
}

impl Default for FusionWeights {
    fn default() -> Self {
        Self {
            semantic: 0.7,
            lexical: 0.3,
        }
    }
}

/// Cached lexical snapshot, tagged with the store revision it was built
/// from.
struct LexicalCache {
    revision: u64,
    index: Option<LexicalIndex>,
    chunks: HashMap<String, StoredChunk>,
}

/// Hybrid retriever over a vector index and a lexical cache.
pub struct HybridRetriever {
    store: Arc<dyn VectorIndex>,
    embedder: Arc<dyn EmbeddingProvider>,
    weights: FusionWeights,
    lexical: RwLock<Option<LexicalCache>>,
}

impl HybridRetriever {
    pub fn new(
        store: Arc<dyn VectorIndex>,
        embedder: Arc<dyn EmbeddingProvider>,
        weights: FusionWeights,
    ) -> Self {
        Self {
            store,
            embedder,
            weights,
            lexical: RwLock::new(None),
        }
    }

    /// Retrieve the top `fan_out` chunks for a query.
    ///
    /// An empty corpus yields an empty result; the caller treats that as
    /// "no grounding available", not an error.
    pub async fn retrieve(&self, query: &str, fan_out: usize) -> AppResult<Vec<ScoredChunk>> {
        if fan_out == 0 || query.trim().is_empty() {
            return Ok(Vec::new());
        }

        // Each sub-query fetches twice the fan-out so fusion has slack to
        // reorder before truncation.
        let candidate_k = fan_out * 2;

        let query_embedding = self.embedder.embed(query).await?;
        let semantic = self.store.query(&query_embedding, candidate_k)?;

        let lexical = self.lexical_search(query, candidate_k).await?;

        let fused = fuse(semantic, lexical, self.weights, fan_out);

        tracing::debug!(
            "Hybrid retrieval returned {} chunks (fan_out {})",
            fused.len(),
            fan_out
        );

        Ok(fused)
    }

    /// Run the lexical sub-query against a fresh snapshot, rebuilding the
    /// cached index if the store mutated since the last build.
    ///
    /// Returns `None` entries when no lexical ranking is available.
    async fn lexical_search(
        &self,
        query: &str,
        top_k: usize,
    ) -> AppResult<Option<Vec<(StoredChunk, f32)>>> {
        let revision = self.store.revision();

        // Fast path: cache is fresh, query under the read lock.
        {
            let cache = self.lexical.read().await;
            if let Some(cache) = cache.as_ref() {
                if cache.revision == revision {
                    return Ok(run_lexical_query(cache, query, top_k));
                }
            }
        }

        // Stale or missing: rebuild under the write lock. Re-check after
        // acquisition so concurrent retrievals trigger at most one rebuild.
        let mut cache = self.lexical.write().await;
        let revision = self.store.revision();
        if cache.as_ref().map(|c| c.revision) != Some(revision) {
            *cache = Some(self.rebuild_cache(revision)?);
        }

        let hits = match cache.as_ref() {
            Some(fresh) => run_lexical_query(fresh, query, top_k),
            None => None,
        };

        Ok(hits)
    }

    fn rebuild_cache(&self, revision: u64) -> AppResult<LexicalCache> {
        let all = self.store.get_all()?;

        let entries: Vec<(String, String)> = all
            .iter()
            .map(|c| (c.id.clone(), c.text.clone()))
            .collect();

        let index = match LexicalIndex::build(&entries) {
            Ok(index) => Some(index),
            Err(e) => {
                tracing::warn!(
                    "Lexical index rebuild failed, degrading to semantic-only retrieval: {}",
                    e
                );
                None
            }
        };

        Ok(LexicalCache {
            revision,
            index,
            chunks: all.into_iter().map(|c| (c.id.clone(), c)).collect(),
        })
    }
}

fn run_lexical_query(
    cache: &LexicalCache,
    query: &str,
    top_k: usize,
) -> Option<Vec<(StoredChunk, f32)>> {
    let index = cache.index.as_ref()?;

    let hits = index
        .search(query, top_k)
        .into_iter()
        .filter_map(|(id, score)| cache.chunks.get(&id).map(|c| (c.clone(), score)))
        .collect();

    Some(hits)
}

/// Min-max normalize raw scores to [0, 1]. All-equal scores normalize to 1.
fn normalize(scores: &[f32]) -> Vec<f32> {
    if scores.is_empty() {
        return Vec::new();
    }

    let min = scores.iter().copied().fold(f32::INFINITY, f32::min);
    let max = scores.iter().copied().fold(f32::NEG_INFINITY, f32::max);

    scores
        .iter()
        .map(|&s| {
            if (max - min).abs() < f32::EPSILON {
                1.0
            } else {
                (s - min) / (max - min)
            }
        })
        .collect()
}

/// Fuse the two candidate lists into one ranked, deduplicated list of at
/// most `fan_out` chunks.
fn fuse(
    semantic: Vec<ScoredChunk>,
    lexical: Option<Vec<(StoredChunk, f32)>>,
    weights: FusionWeights,
    fan_out: usize,
) -> Vec<ScoredChunk> {
    let lexical = lexical.unwrap_or_default();

    if semantic.is_empty() && lexical.is_empty() {
        return Vec::new();
    }

    let semantic_norm = normalize(&semantic.iter().map(|s| s.score).collect::<Vec<_>>());
    let lexical_norm = normalize(&lexical.iter().map(|(_, s)| *s).collect::<Vec<_>>());

    struct Fused {
        chunk: StoredChunk,
        score: f32,
        semantic_rank: usize,
    }

    let mut by_id: HashMap<String, Fused> = HashMap::new();

    for (rank, (scored, norm)) in semantic.iter().zip(semantic_norm.iter()).enumerate() {
        by_id.insert(
            scored.chunk.id.clone(),
            Fused {
                chunk: scored.chunk.clone(),
                score: weights.semantic * norm,
                semantic_rank: rank,
            },
        );
    }

    for ((chunk, _), norm) in lexical.iter().zip(lexical_norm.iter()) {
        let contribution = weights.lexical * norm;
        match by_id.get_mut(&chunk.id) {
            Some(fused) => fused.score += contribution,
            None => {
                // Lexical-only item: no semantic rank, ties last.
                by_id.insert(
                    chunk.id.clone(),
                    Fused {
                        chunk: chunk.clone(),
                        score: contribution,
                        semantic_rank: usize::MAX,
                    },
                );
            }
        }
    }

    let mut fused: Vec<Fused> = by_id.into_values().collect();
    fused.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.semantic_rank.cmp(&b.semantic_rank))
            .then_with(|| a.chunk.id.cmp(&b.chunk.id))
    });
    fused.truncate(fan_out);

    fused
        .into_iter()
        .map(|f| ScoredChunk {
            chunk: f.chunk,
            score: f.score,
        })
        .collect()
}
