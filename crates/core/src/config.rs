//! Configuration management for ragdesk.
//!
//! This module handles loading and merging configuration from multiple
//! sources:
//! - Built-in defaults
//! - Config files (.ragdesk/config.yaml)
//! - Environment variables
//! - Command-line flags
//!
//! The configuration is a single explicit struct constructed once and
//! handed to each component's constructor; there is no ambient global
//! state anywhere in the workspace.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{AppError, AppResult};

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to the workspace root (contains .ragdesk/)
    pub workspace: PathBuf,

    /// Optional config file path
    pub config_file: Option<PathBuf>,

    /// Model provider (e.g., "ollama")
    pub provider: String,

    /// Chat model identifier
    pub chat_model: String,

    /// Embedding model identifier
    pub embedding_model: String,

    /// Expected embedding vector dimension
    pub embedding_dimensions: usize,

    /// Provider endpoint override
    pub endpoint: Option<String>,

    /// API key for hosted providers
    pub api_key: Option<String>,

    /// Log level override
    pub log_level: Option<String>,

    /// Verbose mode (enables debug logging)
    pub verbose: bool,

    /// Disable colored output
    pub no_color: bool,

    /// Chunking policy
    pub chunking: ChunkingConfig,

    /// Retrieval tuning
    pub retrieval: RetrievalConfig,

    /// On-disk layout of the knowledge store
    pub storage: StorageConfig,
}

/// Chunking policy options.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkingConfig {
    /// Maximum chunk length in characters
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Overlap carried from the previous chunk's tail, in characters
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,

    /// Documents at or below this length are stored as a single chunk
    #[serde(default = "default_max_unsplit_len")]
    pub max_unsplit_len: usize,

    /// Split boundary markers, highest priority first
    #[serde(default = "default_boundary_markers")]
    pub boundary_markers: Vec<String>,
}

fn default_chunk_size() -> usize {
    1024
}

fn default_chunk_overlap() -> usize {
    100
}

fn default_max_unsplit_len() -> usize {
    1000
}

fn default_boundary_markers() -> Vec<String> {
    // Paragraph break, line break, sentence-ending punctuation, then
    // clause punctuation. Covers both CJK and ASCII punctuation.
    [
        "\n\n", "\n", "。", "！", "？", ". ", "! ", "? ", "；", "，", "、", "; ", ", ", ":",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            max_unsplit_len: default_max_unsplit_len(),
            boundary_markers: default_boundary_markers(),
        }
    }
}

/// Retrieval tuning options.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Number of top-ranked chunks returned per retrieval
    #[serde(default = "default_fan_out")]
    pub fan_out: usize,

    /// Weight of the semantic (vector) ranking in fusion
    #[serde(default = "default_semantic_weight")]
    pub semantic_weight: f32,

    /// Weight of the lexical (keyword) ranking in fusion
    #[serde(default = "default_lexical_weight")]
    pub lexical_weight: f32,
}

fn default_fan_out() -> usize {
    3
}

fn default_semantic_weight() -> f32 {
    0.7
}

fn default_lexical_weight() -> f32 {
    0.3
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            fan_out: default_fan_out(),
            semantic_weight: default_semantic_weight(),
            lexical_weight: default_lexical_weight(),
        }
    }
}

/// On-disk layout of the knowledge store and conversation history.
///
/// Relative paths are resolved against the `.ragdesk/` data directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Vector store collection name
    #[serde(default = "default_collection_name")]
    pub collection_name: String,

    /// Vector store persistence directory
    #[serde(default = "default_persist_directory")]
    pub persist_directory: PathBuf,

    /// Fingerprint ledger file
    #[serde(default = "default_fingerprint_file")]
    pub fingerprint_file: PathBuf,

    /// Conversation history directory
    #[serde(default = "default_history_dir")]
    pub history_dir: PathBuf,
}

fn default_collection_name() -> String {
    "rag".to_string()
}

fn default_persist_directory() -> PathBuf {
    PathBuf::from("vector_store")
}

fn default_fingerprint_file() -> PathBuf {
    PathBuf::from("fingerprints.txt")
}

fn default_history_dir() -> PathBuf {
    PathBuf::from("chat_history")
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            collection_name: default_collection_name(),
            persist_directory: default_persist_directory(),
            fingerprint_file: default_fingerprint_file(),
            history_dir: default_history_dir(),
        }
    }
}

/// Full configuration file structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ConfigFile {
    provider: Option<String>,
    chat_model: Option<String>,
    embedding_model: Option<String>,
    embedding_dimensions: Option<usize>,
    endpoint: Option<String>,
    chunking: Option<ChunkingConfig>,
    retrieval: Option<RetrievalConfig>,
    storage: Option<StorageConfig>,
    logging: Option<LoggingConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LoggingConfig {
    level: Option<String>,
    color: Option<bool>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            workspace: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            config_file: None,
            provider: "ollama".to_string(), // Local-first default
            chat_model: "qwen2.5".to_string(),
            embedding_model: "nomic-embed-text".to_string(),
            embedding_dimensions: 768,
            endpoint: None,
            api_key: None,
            log_level: None,
            verbose: false,
            no_color: false,
            chunking: ChunkingConfig::default(),
            retrieval: RetrievalConfig::default(),
            storage: StorageConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables and defaults.
    ///
    /// Environment variables:
    /// - `RAGDESK_WORKSPACE`: Override workspace path
    /// - `RAGDESK_CONFIG`: Path to config file
    /// - `RAGDESK_PROVIDER`: Model provider
    /// - `RAGDESK_CHAT_MODEL`: Chat model identifier
    /// - `RAGDESK_EMBEDDING_MODEL`: Embedding model identifier
    /// - `RAGDESK_ENDPOINT`: Provider endpoint
    /// - `RAGDESK_API_KEY`: API key
    /// - `RUST_LOG`: Log level
    /// - `NO_COLOR`: Disable colored output
    pub fn load() -> AppResult<Self> {
        let mut config = Self::default();

        if let Ok(workspace) = std::env::var("RAGDESK_WORKSPACE") {
            config.workspace = PathBuf::from(workspace);
        }

        if let Ok(config_file) = std::env::var("RAGDESK_CONFIG") {
            config.config_file = Some(PathBuf::from(config_file));
        }

        if !config.workspace.exists() {
            return Err(AppError::Config(format!(
                "Workspace directory does not exist: {:?}",
                config.workspace
            )));
        }

        let config_path = if let Some(ref cf) = config.config_file {
            cf.clone()
        } else {
            config.workspace.join(".ragdesk/config.yaml")
        };

        if config_path.exists() {
            config = config.merge_yaml(&config_path)?;
        }

        // Environment variables override YAML config
        if let Ok(provider) = std::env::var("RAGDESK_PROVIDER") {
            config.provider = provider;
        }

        if let Ok(model) = std::env::var("RAGDESK_CHAT_MODEL") {
            config.chat_model = model;
        }

        if let Ok(model) = std::env::var("RAGDESK_EMBEDDING_MODEL") {
            config.embedding_model = model;
        }

        if let Ok(endpoint) = std::env::var("RAGDESK_ENDPOINT") {
            config.endpoint = Some(endpoint);
        }

        config.api_key = std::env::var("RAGDESK_API_KEY").ok();
        config.log_level = std::env::var("RUST_LOG").ok();

        if std::env::var("NO_COLOR").is_ok() {
            config.no_color = true;
        }

        Ok(config)
    }

    /// Merge a YAML configuration file into this config.
    fn merge_yaml(&mut self, path: &PathBuf) -> AppResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        let config_file: ConfigFile = serde_yaml::from_str(&contents).map_err(|e| {
            AppError::Config(format!("Failed to parse config file {:?}: {}", path, e))
        })?;

        let mut result = self.clone();

        if let Some(provider) = config_file.provider {
            result.provider = provider;
        }
        if let Some(model) = config_file.chat_model {
            result.chat_model = model;
        }
        if let Some(model) = config_file.embedding_model {
            result.embedding_model = model;
        }
        if let Some(dims) = config_file.embedding_dimensions {
            result.embedding_dimensions = dims;
        }
        if let Some(endpoint) = config_file.endpoint {
            result.endpoint = Some(endpoint);
        }
        if let Some(chunking) = config_file.chunking {
            result.chunking = chunking;
        }
        if let Some(retrieval) = config_file.retrieval {
            result.retrieval = retrieval;
        }
        if let Some(storage) = config_file.storage {
            result.storage = storage;
        }
        if let Some(logging) = config_file.logging {
            if let Some(level) = logging.level {
                result.log_level = Some(level);
            }
            if let Some(color) = logging.color {
                result.no_color = !color;
            }
        }

        Ok(result)
    }

    /// Apply CLI overrides to the configuration.
    ///
    /// CLI flags take precedence over environment variables and files.
    #[allow(clippy::too_many_arguments)]
    pub fn with_overrides(
        mut self,
        workspace: Option<PathBuf>,
        config_file: Option<PathBuf>,
        provider: Option<String>,
        chat_model: Option<String>,
        log_level: Option<String>,
        verbose: bool,
        no_color: bool,
    ) -> Self {
        if let Some(workspace) = workspace {
            self.workspace = workspace;
        }

        if let Some(config_file) = config_file {
            self.config_file = Some(config_file);
        }

        if let Some(provider) = provider {
            self.provider = provider;
        }

        if let Some(chat_model) = chat_model {
            self.chat_model = chat_model;
        }

        if let Some(log_level) = log_level {
            self.log_level = Some(log_level);
        }

        if verbose {
            self.verbose = true;
            // Verbose mode implies debug logging
            if self.log_level.is_none() {
                self.log_level = Some("debug".to_string());
            }
        }

        if no_color {
            self.no_color = true;
        }

        self
    }

    /// Get the path to the .ragdesk data directory.
    pub fn data_dir(&self) -> PathBuf {
        self.workspace.join(".ragdesk")
    }

    /// Ensure the .ragdesk data directory exists.
    pub fn ensure_data_dir(&self) -> AppResult<()> {
        let data_dir = self.data_dir();
        if !data_dir.exists() {
            std::fs::create_dir_all(&data_dir).map_err(|e| {
                AppError::Config(format!("Failed to create .ragdesk directory: {}", e))
            })?;
        }
        Ok(())
    }

    /// Resolve a storage path against the data directory.
    fn resolve(&self, path: &PathBuf) -> PathBuf {
        if path.is_absolute() {
            path.clone()
        } else {
            self.data_dir().join(path)
        }
    }

    /// Absolute path of the vector store persistence directory.
    pub fn persist_directory(&self) -> PathBuf {
        self.resolve(&self.storage.persist_directory)
    }

    /// Absolute path of the fingerprint ledger file.
    pub fn fingerprint_path(&self) -> PathBuf {
        self.resolve(&self.storage.fingerprint_file)
    }

    /// Absolute path of the conversation history directory.
    pub fn history_dir(&self) -> PathBuf {
        self.resolve(&self.storage.history_dir)
    }

    /// Validate configuration for the active provider.
    pub fn validate(&self) -> AppResult<()> {
        let known_providers = ["ollama", "openai"];

        if !known_providers.contains(&self.provider.as_str()) {
            return Err(AppError::Config(format!(
                "Unknown provider: {}. Supported: {}",
                self.provider,
                known_providers.join(", ")
            )));
        }

        if self.provider == "openai" && self.api_key.is_none() {
            return Err(AppError::Config(
                "Provider 'openai' requires RAGDESK_API_KEY".to_string(),
            ));
        }

        if self.retrieval.semantic_weight < 0.0 || self.retrieval.lexical_weight < 0.0 {
            return Err(AppError::Config(
                "Fusion weights must be non-negative".to_string(),
            ));
        }

        if self.chunking.chunk_overlap >= self.chunking.chunk_size {
            return Err(AppError::Config(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                self.chunking.chunk_overlap, self.chunking.chunk_size
            )));
        }

        Ok(())
    }
}
