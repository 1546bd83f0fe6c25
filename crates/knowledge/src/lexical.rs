//! In-memory lexical index (BM25).
//!
//! Built from a snapshot of the vector store's current contents and used as
//! the keyword-overlap half of hybrid retrieval. Standard BM25 parameters
//! (k1 = 1.2, b = 0.75) over an inverted index.
//!
//! Tokenization uses Unicode word segmentation, lowercased. CJK text
//! segments into per-character tokens, which is exactly the overlap
//! granularity we want for keyword matching against Chinese documents.

use ragdesk_core::{AppError, AppResult};
use std::collections::HashMap;
use unicode_segmentation::UnicodeSegmentation;

const K1: f32 = 1.2;
const B: f32 = 0.75;

/// Tokenize text for lexical matching.
pub fn tokenize(text: &str) -> Vec<String> {
    text.unicode_words().map(|w| w.to_lowercase()).collect()
}

/// BM25 inverted index over a corpus snapshot.
#[derive(Debug)]
pub struct LexicalIndex {
    /// term -> [(doc index, term frequency)]
    postings: HashMap<String, Vec<(usize, u32)>>,

    /// doc index -> chunk id
    doc_ids: Vec<String>,

    /// doc index -> token count
    doc_lens: Vec<usize>,

    /// average token count across documents
    avg_doc_len: f32,
}

impl LexicalIndex {
    /// Build the index from `(chunk_id, text)` entries.
    ///
    /// Building from an empty corpus is an error; the retriever treats it
    /// as "no lexical ranking available" and degrades to semantic-only.
    pub fn build(entries: &[(String, String)]) -> AppResult<Self> {
        if entries.is_empty() {
            return Err(AppError::Knowledge(
                "Cannot build lexical index over an empty corpus".to_string(),
            ));
        }

        let mut postings: HashMap<String, Vec<(usize, u32)>> = HashMap::new();
        let mut doc_ids = Vec::with_capacity(entries.len());
        let mut doc_lens = Vec::with_capacity(entries.len());

        for (doc_idx, (id, text)) in entries.iter().enumerate() {
            let tokens = tokenize(text);
            doc_ids.push(id.clone());
            doc_lens.push(tokens.len());

            let mut term_freq: HashMap<String, u32> = HashMap::new();
            for token in tokens {
                *term_freq.entry(token).or_insert(0) += 1;
            }

            for (term, freq) in term_freq {
                postings.entry(term).or_default().push((doc_idx, freq));
            }
        }

        let total: usize = doc_lens.iter().sum();
        let avg_doc_len = (total as f32 / doc_lens.len() as f32).max(1.0);

        tracing::debug!(
            "Built lexical index: {} docs, {} terms",
            doc_ids.len(),
            postings.len()
        );

        Ok(Self {
            postings,
            doc_ids,
            doc_lens,
            avg_doc_len,
        })
    }

    /// Number of indexed documents.
    pub fn len(&self) -> usize {
        self.doc_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.doc_ids.is_empty()
    }

    /// Rank documents by BM25 score against the query.
    ///
    /// Returns up to `top_k` `(chunk_id, score)` pairs, descending; only
    /// documents sharing at least one term with the query appear.
    pub fn search(&self, query: &str, top_k: usize) -> Vec<(String, f32)> {
        let query_terms = tokenize(query);
        if query_terms.is_empty() || top_k == 0 {
            return Vec::new();
        }

        let n = self.doc_ids.len() as f32;
        let mut scores: HashMap<usize, f32> = HashMap::new();

        for term in &query_terms {
            let Some(posting) = self.postings.get(term) else {
                continue;
            };

            let df = posting.len() as f32;
            let idf = ((n - df + 0.5) / (df + 0.5) + 1.0).ln();

            for &(doc_idx, tf) in posting {
                let tf = tf as f32;
                let len_norm = 1.0 - B + B * (self.doc_lens[doc_idx] as f32 / self.avg_doc_len);
                let term_score = idf * (tf * (K1 + 1.0)) / (tf + K1 * len_norm);
                *scores.entry(doc_idx).or_insert(0.0) += term_score;
            }
        }

        let mut ranked: Vec<(String, f32)> = scores
            .into_iter()
            .map(|(doc_idx, score)| (self.doc_ids[doc_idx].clone(), score))
            .collect();

        ranked.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        ranked.truncate(top_k);

        ranked
    }
}
