//! Per-session conversation history.
//!
//! History is owned by the store, keyed by an opaque session id. The
//! capability interface is small (load, append, clear) and
//! the file-backed implementation persists each session as one JSON file,
//! replaced atomically (write-to-temp-then-rename) so a writer crash leaves
//! either the old complete history or the new complete history, never a
//! truncated file.

use ragdesk_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Role of a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    User,
    Assistant,
}

/// One turn of a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: TurnRole,
    pub content: String,
}

impl ChatTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: TurnRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: TurnRole::Assistant,
            content: content.into(),
        }
    }
}

/// Capability interface for conversation history backends.
pub trait HistoryStore: Send + Sync {
    /// Ordered turns for a session; a session with no prior storage loads
    /// as empty, not as an error.
    fn load(&self, session_id: &str) -> AppResult<Vec<ChatTurn>>;

    /// Append turns, persisting the complete updated sequence atomically
    /// relative to this session's storage.
    fn append(&self, session_id: &str, turns: &[ChatTurn]) -> AppResult<()>;

    /// Replace the stored sequence with the empty sequence.
    fn clear(&self, session_id: &str) -> AppResult<()>;
}

/// File-backed history store: one JSON file per session.
#[derive(Debug, Clone)]
pub struct FileHistoryStore {
    dir: PathBuf,
}

impl FileHistoryStore {
    /// Create the store, ensuring the storage directory exists.
    pub fn new(dir: impl AsRef<Path>) -> AppResult<Self> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)
            .map_err(|e| AppError::History(format!("Failed to create history directory: {}", e)))?;
        Ok(Self { dir })
    }

    /// Resolve the storage file for a session id.
    ///
    /// Session ids are opaque keys but become file names here, so they are
    /// restricted to a safe charset.
    fn session_path(&self, session_id: &str) -> AppResult<PathBuf> {
        if session_id.is_empty()
            || !session_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
            || session_id.chars().all(|c| c == '.')
        {
            return Err(AppError::History(format!(
                "Invalid session id '{}': use ASCII letters, digits, '-', '_' and '.'",
                session_id
            )));
        }

        Ok(self.dir.join(format!("{}.json", session_id)))
    }

    /// Persist the full turn sequence for a session atomically.
    fn write_atomic(&self, path: &Path, turns: &[ChatTurn]) -> AppResult<()> {
        let json = serde_json::to_string(turns)
            .map_err(|e| AppError::History(format!("Failed to serialize history: {}", e)))?;

        let tmp_path = path.with_extension("json.tmp");
        std::fs::write(&tmp_path, json)
            .map_err(|e| AppError::History(format!("Failed to write history: {}", e)))?;

        std::fs::rename(&tmp_path, path)
            .map_err(|e| AppError::History(format!("Failed to commit history: {}", e)))?;

        Ok(())
    }
}

impl HistoryStore for FileHistoryStore {
    fn load(&self, session_id: &str) -> AppResult<Vec<ChatTurn>> {
        let path = self.session_path(session_id)?;

        let contents = match std::fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(AppError::History(format!(
                    "Failed to read history for '{}': {}",
                    session_id, e
                )))
            }
        };

        if contents.trim().is_empty() {
            return Ok(Vec::new());
        }

        // Corrupted content fails open as empty history: the session keeps
        // working, it just forgets.
        match serde_json::from_str(&contents) {
            Ok(turns) => Ok(turns),
            Err(e) => {
                tracing::warn!(
                    "Corrupted history for session '{}', treating as empty: {}",
                    session_id,
                    e
                );
                Ok(Vec::new())
            }
        }
    }

    fn append(&self, session_id: &str, turns: &[ChatTurn]) -> AppResult<()> {
        let path = self.session_path(session_id)?;

        let mut all = self.load(session_id)?;
        all.extend_from_slice(turns);

        self.write_atomic(&path, &all)?;

        tracing::debug!(
            "Appended {} turns to session '{}' ({} total)",
            turns.len(),
            session_id,
            all.len()
        );

        Ok(())
    }

    fn clear(&self, session_id: &str) -> AppResult<()> {
        let path = self.session_path(session_id)?;
        self.write_atomic(&path, &[])?;

        tracing::info!("Cleared history for session '{}'", session_id);

        Ok(())
    }
}
