//! Text chunking along semantic boundaries.
//!
//! Long documents are split recursively: the splitter tries the
//! highest-priority boundary marker first (paragraph break, then line break,
//! then sentence-ending punctuation, then clause punctuation) and only falls
//! back to a hard character cut when no marker keeps a piece within the
//! configured size. Adjacent chunks carry an overlapping tail of the
//! preceding chunk to preserve cross-boundary context for retrieval.
//!
//! All lengths are counted in characters, not bytes, so CJK text is sized
//! the same way as ASCII.

/// Configurable document splitter.
#[derive(Debug, Clone)]
pub struct TextChunker {
    /// Maximum piece length in characters (before the overlap prefix)
    max_chunk_size: usize,

    /// Characters of the preceding piece's tail prepended to each chunk
    overlap: usize,

    /// Boundary markers, highest priority first
    boundary_markers: Vec<String>,

    /// Inputs at or below this length are returned as a single chunk
    max_unsplit_len: usize,
}

impl TextChunker {
    pub fn new(
        max_chunk_size: usize,
        overlap: usize,
        boundary_markers: Vec<String>,
        max_unsplit_len: usize,
    ) -> Self {
        Self {
            max_chunk_size: max_chunk_size.max(1),
            overlap,
            boundary_markers,
            max_unsplit_len,
        }
    }

    /// Split a document into chunks, in document order.
    ///
    /// Empty input yields an empty sequence; input at or below the
    /// short-circuit threshold is returned whole.
    pub fn split(&self, text: &str) -> Vec<String> {
        if text.is_empty() {
            return Vec::new();
        }

        if char_len(text) <= self.max_unsplit_len {
            return vec![text.to_string()];
        }

        let pieces = self.split_pieces(text, 0);

        tracing::debug!(
            "Chunked {} chars into {} pieces (size: {}, overlap: {})",
            char_len(text),
            pieces.len(),
            self.max_chunk_size,
            self.overlap
        );

        self.apply_overlap(pieces)
    }

    /// Recursively split `text` into pieces of at most `max_chunk_size`
    /// characters, trying markers in priority order.
    fn split_pieces(&self, text: &str, marker_idx: usize) -> Vec<String> {
        if text.is_empty() {
            return Vec::new();
        }

        if char_len(text) <= self.max_chunk_size {
            return vec![text.to_string()];
        }

        // No marker left: hard cut every max_chunk_size characters.
        let Some(marker) = self.boundary_markers.get(marker_idx) else {
            return hard_cut(text, self.max_chunk_size);
        };

        if !text.contains(marker.as_str()) {
            return self.split_pieces(text, marker_idx + 1);
        }

        let parts = split_keeping_marker(text, marker);

        // Greedily merge adjacent parts while they fit; recurse into parts
        // that are oversized on their own.
        let mut pieces: Vec<String> = Vec::new();
        let mut current = String::new();
        let mut current_len = 0usize;

        for part in parts {
            let part_len = char_len(&part);

            if part_len > self.max_chunk_size {
                if !current.is_empty() {
                    pieces.push(std::mem::take(&mut current));
                    current_len = 0;
                }
                pieces.extend(self.split_pieces(&part, marker_idx + 1));
                continue;
            }

            if current_len + part_len <= self.max_chunk_size {
                current.push_str(&part);
                current_len += part_len;
            } else {
                pieces.push(std::mem::take(&mut current));
                current = part;
                current_len = part_len;
            }
        }

        if !current.is_empty() {
            pieces.push(current);
        }

        pieces
    }

    /// Prefix each piece (after the first) with the tail of its predecessor.
    fn apply_overlap(&self, pieces: Vec<String>) -> Vec<String> {
        if self.overlap == 0 || pieces.len() < 2 {
            return pieces;
        }

        let mut chunks = Vec::with_capacity(pieces.len());
        let mut prev_tail: Option<String> = None;

        for piece in pieces {
            let chunk = match prev_tail.take() {
                Some(tail) => format!("{}{}", tail, piece),
                None => piece.clone(),
            };
            prev_tail = Some(char_tail(&piece, self.overlap).to_string());
            chunks.push(chunk);
        }

        chunks
    }
}

/// Character count of a string.
fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// The last `n` characters of a string.
fn char_tail(s: &str, n: usize) -> &str {
    if n == 0 {
        return "";
    }
    match s.char_indices().rev().nth(n - 1) {
        Some((idx, _)) => &s[idx..],
        None => s,
    }
}

/// Split on a marker, keeping the marker attached to the preceding part so
/// that concatenating all parts reproduces the input exactly.
fn split_keeping_marker(text: &str, marker: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut start = 0;

    for (idx, _) in text.match_indices(marker) {
        let end = idx + marker.len();
        parts.push(text[start..end].to_string());
        start = end;
    }

    if start < text.len() {
        parts.push(text[start..].to_string());
    }

    parts
}

/// Cut every `size` characters at char boundaries.
fn hard_cut(text: &str, size: usize) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut iter = text.char_indices().step_by(size).map(|(i, _)| i).peekable();

    while let Some(start) = iter.next() {
        let end = iter.peek().copied().unwrap_or(text.len());
        pieces.push(text[start..end].to_string());
    }

    pieces
}

#[cfg(test)]
mod tests {
    use super::*;

    fn markers() -> Vec<String> {
        ["\n\n", "\n", "。", "！", "？", ". ", "；", "，"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    fn chunker(size: usize, overlap: usize, threshold: usize) -> TextChunker {
        TextChunker::new(size, overlap, markers(), threshold)
    }

    /// Reconstruct the original text from overlapping chunks by trimming
    /// the longest shared suffix/prefix between neighbors.
    fn reconstruct(chunks: &[String], max_overlap: usize) -> String {
        let mut out = String::new();
        for chunk in chunks {
            let out_chars: Vec<char> = out.chars().collect();
            let chunk_chars: Vec<char> = chunk.chars().collect();
            let limit = max_overlap.min(out_chars.len()).min(chunk_chars.len());

            let mut shared = 0;
            for k in (1..=limit).rev() {
                if out_chars[out_chars.len() - k..] == chunk_chars[..k] {
                    shared = k;
                    break;
                }
            }
            out.push_str(&chunk_chars[shared..].iter().collect::<String>());
        }
        out
    }

    #[test]
    fn test_empty_input() {
        assert!(chunker(100, 10, 50).split("").is_empty());
    }

    #[test]
    fn test_short_document_bypass() {
        let text = "产品保修期为一年。";
        let chunks = chunker(100, 10, 50).split(text);
        assert_eq!(chunks, vec![text.to_string()]);
    }

    #[test]
    fn test_threshold_boundary_is_inclusive() {
        let text = "a".repeat(50);
        let chunks = chunker(100, 10, 50).split(&text);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0], text);
    }

    #[test]
    fn test_splits_at_paragraph_boundary() {
        let para1 = "First paragraph sentence one. First paragraph sentence two.";
        let para2 = "Second paragraph goes here with more words in it than before.";
        let text = format!("{}\n\n{}", para1, para2);

        let chunks = chunker(70, 0, 10).split(&text);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0], format!("{}\n\n", para1));
        assert_eq!(chunks[1], para2);
    }

    #[test]
    fn test_splits_at_cjk_sentence_boundary() {
        let text = "产品保修期为一年。保修范围包括主要部件。人为损坏不在保修范围内。退货需在七天内提出申请。";
        let chunks = chunker(20, 0, 10).split(text);

        assert!(chunks.len() > 1);
        // Every piece ends at a sentence boundary except possibly the last
        for chunk in &chunks[..chunks.len() - 1] {
            assert!(chunk.ends_with('。'), "piece should end at 。: {:?}", chunk);
        }
        assert_eq!(chunks.concat(), text);
    }

    #[test]
    fn test_hard_cut_fallback() {
        // No boundary markers present anywhere
        let text = "x".repeat(250);
        let chunks = chunker(100, 0, 50).split(&text);

        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].chars().count(), 100);
        assert_eq!(chunks[2].chars().count(), 50);
        assert_eq!(chunks.concat(), text);
    }

    #[test]
    fn test_piece_size_bound() {
        let text = "词语，".repeat(200);
        let size = 30;
        let overlap = 8;
        let chunks = chunker(size, overlap, 10).split(&text);

        for chunk in &chunks {
            assert!(
                chunk.chars().count() <= size + overlap,
                "chunk exceeds size+overlap: {}",
                chunk.chars().count()
            );
        }
    }

    #[test]
    fn test_overlap_bound_and_coverage() {
        let sentences: Vec<String> = (0..40)
            .map(|i| format!("Sentence number {} talks about topic {}. ", i, i * 7))
            .collect();
        let text = sentences.concat();
        let overlap = 15;

        let chunks = chunker(80, overlap, 10).split(&text);
        assert!(chunks.len() > 2);

        // Overlap between neighbors never exceeds the configured bound
        for pair in chunks.windows(2) {
            let prev: Vec<char> = pair[0].chars().collect();
            let next: Vec<char> = pair[1].chars().collect();
            let limit = overlap.min(prev.len()).min(next.len());

            let mut shared = 0;
            for k in (1..=limit).rev() {
                if prev[prev.len() - k..] == next[..k] {
                    shared = k;
                    break;
                }
            }
            assert!(shared <= overlap);
        }

        // Concatenating chunks minus overlaps reconstructs the document
        assert_eq!(reconstruct(&chunks, overlap), text);
    }

    #[test]
    fn test_zero_overlap_concat_is_identity() {
        let text = "行一\n行二\n行三\n行四\n行五\n行六\n行七\n行八\n行九\n行十\n";
        let chunks = chunker(8, 0, 4).split(text);
        assert_eq!(chunks.concat(), text);
    }

    #[test]
    fn test_document_order() {
        let text = (0..30)
            .map(|i| format!("段落{}的内容。", i))
            .collect::<String>();
        let chunks = chunker(25, 5, 10).split(&text);

        // First chunk starts the document, last chunk ends it
        assert!(text.starts_with(chunks.first().unwrap().as_str()));
        assert!(text.ends_with(
            chunks
                .last()
                .unwrap()
                .chars()
                .skip(5)
                .collect::<String>()
                .as_str()
        ) || text.ends_with(chunks.last().unwrap().as_str()));
    }

    #[test]
    fn test_char_tail() {
        assert_eq!(char_tail("hello", 3), "llo");
        assert_eq!(char_tail("你好世界", 2), "世界");
        assert_eq!(char_tail("ab", 10), "ab");
        assert_eq!(char_tail("ab", 0), "");
    }
}
