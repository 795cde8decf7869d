//! Configuration for the ingestion and retrieval engine

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Environment variable naming a TOML config file
pub const CONFIG_PATH_ENV: &str = "DOC_RAG_CONFIG";

/// Main configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RagConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,
    /// Where documents and the database live
    #[serde(default)]
    pub storage: StorageConfig,
    /// Chunking configuration
    #[serde(default)]
    pub chunking: ChunkingConfig,
    /// Embedding configuration
    #[serde(default)]
    pub embeddings: EmbeddingConfig,
    /// Search defaults
    #[serde(default)]
    pub search: SearchConfig,
    /// Upload handling
    #[serde(default)]
    pub ingestion: IngestionConfig,
}

impl RagConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let config: RagConfig = toml::from_str(&raw)
            .map_err(|e| Error::Config(format!("Invalid config {}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `DOC_RAG_CONFIG` if set, otherwise defaults, then apply env overrides
    pub fn load() -> Result<Self> {
        let mut config = match std::env::var(CONFIG_PATH_ENV) {
            Ok(path) if !path.trim().is_empty() => Self::from_file(path)?,
            _ => Self::default(),
        };
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `DOC_RAG_*` environment overrides
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(host) = std::env::var("DOC_RAG_HOST") {
            self.server.host = host;
        }
        if let Ok(port) = std::env::var("DOC_RAG_PORT") {
            self.server.port = port
                .parse()
                .map_err(|_| Error::Config(format!("Invalid DOC_RAG_PORT: {}", port)))?;
        }
        if let Ok(dir) = std::env::var("DOC_RAG_DATA_DIR") {
            self.storage.data_dir = PathBuf::from(dir);
        }
        if let Ok(url) = std::env::var("DOC_RAG_OLLAMA_URL") {
            self.embeddings.base_url = url;
        }
        Ok(())
    }

    /// Reject settings the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.chunking.chunk_size == 0 {
            return Err(Error::Config("chunking.chunk_size must be greater than 0".to_string()));
        }
        if self.embeddings.dimensions == 0 {
            return Err(Error::Config("embeddings.dimensions must be greater than 0".to_string()));
        }
        if self.search.max_limit == 0 {
            return Err(Error::Config("search.max_limit must be greater than 0".to_string()));
        }
        if self.ingestion.allowed_extensions.is_empty() {
            return Err(Error::Config("ingestion.allowed_extensions cannot be empty".to_string()));
        }
        Ok(())
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host address
    pub host: String,
    /// Port number
    pub port: u16,
    /// Enable CORS
    pub enable_cors: bool,
    /// Maximum upload size in bytes (default: 50MB)
    pub max_upload_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            enable_cors: true,
            max_upload_size: 50 * 1024 * 1024,
        }
    }
}

/// Storage locations
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Root directory for the database and uploaded files
    pub data_dir: PathBuf,
    /// SQLite file name inside `data_dir`
    pub database_file: String,
    /// Upload directory name inside `data_dir`
    pub uploads_dir: String,
}

impl StorageConfig {
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join(&self.database_file)
    }

    pub fn uploads_path(&self) -> PathBuf {
        self.data_dir.join(&self.uploads_dir)
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("doc-rag");

        Self {
            data_dir,
            database_file: "documents.db".to_string(),
            uploads_dir: "uploads".to_string(),
        }
    }
}

/// Text chunking configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Maximum window length in characters
    pub chunk_size: usize,
    /// Overlap budget in characters; `chunk_overlap / 10` words are carried over
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
        }
    }
}

/// Embedding configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Probe for an embedder at startup; `false` forces lexical search
    pub enabled: bool,
    /// Ollama base URL
    pub base_url: String,
    /// Embedding model name
    pub model: String,
    /// Embedding dimensions (768 for nomic-embed-text)
    pub dimensions: usize,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Number of retries for failed requests
    pub max_retries: u32,
    /// Concurrent embedding requests per batch (default: CPU count, max 4)
    pub parallel_requests: Option<usize>,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: "http://localhost:11434".to_string(),
            model: "nomic-embed-text".to_string(),
            dimensions: 768,
            timeout_secs: 60,
            max_retries: 2,
            parallel_requests: None,
        }
    }
}

impl EmbeddingConfig {
    pub fn parallelism(&self) -> usize {
        self.parallel_requests
            .unwrap_or_else(|| num_cpus::get().min(4))
            .max(1)
    }
}

/// Search defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Results returned when the client gives no limit
    pub default_limit: usize,
    /// Upper bound on client-supplied limits
    pub max_limit: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_limit: 5,
            max_limit: 50,
        }
    }
}

/// Upload handling
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestionConfig {
    /// Accepted file extensions (lowercase, no dot)
    pub allowed_extensions: Vec<String>,
    /// Category recorded when the uploader gives none
    pub default_category: String,
    /// Uploader recorded when none is given
    pub default_uploaded_by: String,
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            allowed_extensions: ["pdf", "txt", "doc", "docx"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            default_category: "policy".to_string(),
            default_uploaded_by: "admin".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = RagConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.chunking.chunk_size, 1000);
        assert_eq!(config.chunking.chunk_overlap, 200);
        assert_eq!(config.search.default_limit, 5);
        assert_eq!(config.ingestion.allowed_extensions, vec!["pdf", "txt", "doc", "docx"]);
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config: RagConfig = toml::from_str(
            r#"
            [chunking]
            chunk_size = 400
            chunk_overlap = 50

            [embeddings]
            enabled = false
            base_url = "http://embedder:11434"
            model = "all-minilm"
            dimensions = 384
            timeout_secs = 10
            max_retries = 0
            "#,
        )
        .unwrap();

        assert_eq!(config.chunking.chunk_size, 400);
        assert!(!config.embeddings.enabled);
        assert_eq!(config.embeddings.dimensions, 384);
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.ingestion.default_category, "policy");
    }

    #[test]
    fn test_section_with_single_field() {
        let config: RagConfig = toml::from_str("[chunking]\nchunk_size = 400\n").unwrap();
        assert_eq!(config.chunking.chunk_size, 400);
        assert_eq!(config.chunking.chunk_overlap, 200);

        let config: RagConfig = toml::from_str("[server]\nport = 9000\n").unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host, "0.0.0.0");
        assert!(config.server.enable_cors);

        let config: RagConfig =
            toml::from_str("[embeddings]\nenabled = false\n[search]\nmax_limit = 20\n").unwrap();
        assert!(!config.embeddings.enabled);
        assert_eq!(config.embeddings.model, "nomic-embed-text");
        assert_eq!(config.search.max_limit, 20);
        assert_eq!(config.search.default_limit, 5);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_chunk_size_rejected() {
        let mut config = RagConfig::default();
        config.chunking.chunk_size = 0;
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc-rag.toml");
        std::fs::write(&path, "[server]\nhost = \"127.0.0.1\"\nport = 9000\nenable_cors = false\nmax_upload_size = 1024\n").unwrap();

        let config = RagConfig::from_file(&path).unwrap();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.storage.database_file, "documents.db");
    }
}
