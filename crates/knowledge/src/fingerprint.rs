//! Content-addressed deduplication.
//!
//! Every ingested document is fingerprinted with SHA-256 over the UTF-8
//! bytes of its trimmed text. Fingerprints are persisted to an append-only
//! ledger file, one lowercase hex digest per line; the membership check must
//! run before any vector store insert.

use ragdesk_core::{AppError, AppResult};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Append-only ledger of content fingerprints.
///
/// The in-memory set mirrors the persisted file: it is populated at open and
/// updated on every successful append, so checks never race persisted state.
#[derive(Debug)]
pub struct FingerprintLedger {
    path: PathBuf,
    seen: HashSet<String>,
}

impl FingerprintLedger {
    /// Open the ledger, creating the file (and parent directories) when it
    /// does not exist yet.
    pub fn open(path: impl AsRef<Path>) -> AppResult<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                AppError::Knowledge(format!("Failed to create ledger directory: {}", e))
            })?;
        }

        let seen = if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .map_err(|e| AppError::Knowledge(format!("Failed to read ledger: {}", e)))?;
            contents
                .lines()
                .map(|line| line.trim().to_string())
                .filter(|line| !line.is_empty())
                .collect()
        } else {
            std::fs::File::create(&path)
                .map_err(|e| AppError::Knowledge(format!("Failed to create ledger: {}", e)))?;
            HashSet::new()
        };

        tracing::debug!("Opened fingerprint ledger at {:?} ({} entries)", path, seen.len());

        Ok(Self { path, seen })
    }

    /// Compute the fingerprint of a document text.
    ///
    /// Deterministic and stable across process restarts: SHA-256 over the
    /// UTF-8 bytes of the trimmed text, rendered as lowercase hex.
    pub fn fingerprint(text: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(text.trim().as_bytes());
        format!("{:x}", hasher.finalize())
    }

    /// Check whether identical content was recorded before.
    pub fn is_duplicate(&self, text: &str) -> bool {
        self.seen.contains(&Self::fingerprint(text))
    }

    /// Record content as seen.
    ///
    /// Idempotent: re-recording already-seen content is a no-op and keeps the
    /// ledger minimal. Returns `true` when a new entry was appended. Existing
    /// entries are never rewritten or removed.
    pub fn record(&mut self, text: &str) -> AppResult<bool> {
        let digest = Self::fingerprint(text);
        if self.seen.contains(&digest) {
            return Ok(false);
        }

        let mut file = std::fs::OpenOptions::new()
            .append(true)
            .open(&self.path)
            .map_err(|e| AppError::Knowledge(format!("Failed to open ledger: {}", e)))?;

        writeln!(file, "{}", digest)
            .map_err(|e| AppError::Knowledge(format!("Failed to append to ledger: {}", e)))?;

        self.seen.insert(digest);
        Ok(true)
    }

    /// Number of recorded fingerprints.
    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_fingerprint_deterministic() {
        let a = FingerprintLedger::fingerprint("周杰伦");
        let b = FingerprintLedger::fingerprint("周杰伦");
        let c = FingerprintLedger::fingerprint("蔡依林");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_fingerprint_ignores_surrounding_whitespace() {
        let a = FingerprintLedger::fingerprint("hello world");
        let b = FingerprintLedger::fingerprint("  hello world\n");
        assert_eq!(a, b);
    }

    #[test]
    fn test_open_creates_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("fingerprints.txt");

        let ledger = FingerprintLedger::open(&path).unwrap();
        assert!(path.exists());
        assert!(ledger.is_empty());
        assert!(!ledger.is_duplicate("anything"));
    }

    #[test]
    fn test_record_then_duplicate() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("fingerprints.txt");

        let mut ledger = FingerprintLedger::open(&path).unwrap();
        assert!(!ledger.is_duplicate("产品保修期为一年。"));

        assert!(ledger.record("产品保修期为一年。").unwrap());
        assert!(ledger.is_duplicate("产品保修期为一年。"));
        assert!(!ledger.is_duplicate("其他内容"));
    }

    #[test]
    fn test_record_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("fingerprints.txt");

        let mut ledger = FingerprintLedger::open(&path).unwrap();
        assert!(ledger.record("same text").unwrap());
        assert!(!ledger.record("same text").unwrap());
        assert_eq!(ledger.len(), 1);

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().count(), 1);
    }

    #[test]
    fn test_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("fingerprints.txt");

        {
            let mut ledger = FingerprintLedger::open(&path).unwrap();
            ledger.record("persisted content").unwrap();
        }

        let reopened = FingerprintLedger::open(&path).unwrap();
        assert_eq!(reopened.len(), 1);
        assert!(reopened.is_duplicate("persisted content"));
    }
}
