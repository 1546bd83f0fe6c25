//! Deterministic hash-based embedding provider.
//!
//! Produces content-aware vectors from character trigram frequencies,
//! normalized to unit length. No network, no model weights: the same text
//! always maps to the same vector, which makes this provider the backbone of
//! the test suite and a usable offline fallback. Works for CJK text as well
//! since trigrams are taken over characters, not whitespace-split words.

use crate::embeddings::provider::EmbeddingProvider;
use ragdesk_core::AppResult;
use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct HashEmbedder {
    dimensions: usize,
}

impl HashEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.max(1),
        }
    }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        let dim = self.dimensions;
        let mut embedding = vec![0.0f32; dim];

        let lower = text.to_lowercase();
        let chars: Vec<char> = lower.chars().filter(|c| !c.is_whitespace()).collect();

        // Character trigrams spread each text across several dimensions
        for window in chars.windows(3) {
            let mut hash = 0u64;
            for &c in window {
                hash = hash.wrapping_mul(37).wrapping_add(c as u64);
            }
            embedding[(hash as usize) % dim] += 1.0;
        }

        // Whole-word signal for space-separated scripts
        let mut word_freq: HashMap<&str, u32> = HashMap::new();
        for word in lower.split_whitespace().filter(|w| w.chars().count() > 1) {
            *word_freq.entry(word).or_insert(0) += 1;
        }
        for (word, freq) in word_freq {
            let hash = word
                .bytes()
                .fold(0u64, |acc, b| acc.wrapping_mul(31).wrapping_add(b as u64));
            embedding[(hash as usize) % dim] += (freq as f32).sqrt();
        }

        // Normalize to unit vector
        let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut embedding {
                *v /= norm;
            }
        }

        embedding
    }
}

#[async_trait::async_trait]
impl EmbeddingProvider for HashEmbedder {
    fn provider_name(&self) -> &str {
        "hash"
    }

    fn model_name(&self) -> &str {
        "hash-trigram"
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }
}
