use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::domain::Metric;
use crate::error::{MineRagError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub index_path: PathBuf,
    pub corpus_dir: PathBuf,
    pub openai_api_key: Option<String>,
    pub chunking: ChunkingConfig,
    pub embedding: EmbeddingConfig,
    pub generation: GenerationConfig,
    pub retrieval: RetrievalConfig,
    pub query: QueryConfig,
    pub hazard: HazardConfig,
    pub server: ServerConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            index_path: PathBuf::from("data/index/minesafe-index.json"),
            corpus_dir: PathBuf::from("data/processed"),
            openai_api_key: None,
            chunking: ChunkingConfig::default(),
            embedding: EmbeddingConfig::default(),
            generation: GenerationConfig::default(),
            retrieval: RetrievalConfig::default(),
            query: QueryConfig::default(),
            hazard: HazardConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Maximum characters per chunk.
    pub chunk_size: usize,
    /// Characters shared by consecutive chunks of a page.
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 800,
            chunk_overlap: 200,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProvider {
    #[default]
    Hashing,
    OpenAi,
    FastEmbed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub provider: EmbeddingProvider,
    pub model: String,
    pub dimensions: usize,
    pub base_url: String,
    pub batch_size: usize,
    pub timeout_secs: u64,
    /// Retries after the first request on 429, 5xx and transport errors.
    pub max_retries: usize,
    /// Query embeddings kept in memory; 0 disables the cache.
    pub cache_size: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingProvider::Hashing,
            model: "all-MiniLM-L6-v2".to_string(),
            dimensions: 384,
            base_url: "https://api.openai.com/v1".to_string(),
            batch_size: 64,
            timeout_secs: 30,
            max_retries: 3,
            cache_size: 1024,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GenerationProvider {
    #[default]
    Extractive,
    OpenAi,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    pub provider: GenerationProvider,
    pub model: String,
    pub base_url: String,
    pub temperature: f32,
    pub max_tokens: usize,
    pub timeout_secs: u64,
    /// Retries after the first request on 429, 5xx and transport errors.
    pub max_retries: usize,
    /// Treat answers without a single valid citation as a generation failure.
    pub require_citations: bool,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            provider: GenerationProvider::Extractive,
            model: "gpt-4.1".to_string(),
            base_url: "https://api.openai.com/v1".to_string(),
            temperature: 0.2,
            max_tokens: 700,
            timeout_secs: 60,
            max_retries: 2,
            require_citations: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    pub default_top_k: usize,
    pub max_top_k: usize,
    pub metric: Metric,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            default_top_k: 6,
            max_top_k: 20,
            metric: Metric::Cosine,
        }
    }
}

impl RetrievalConfig {
    /// Resolves a requested `top_k`: absent means the default, larger values
    /// are clamped. An explicit zero is rejected.
    pub fn resolve_top_k(&self, requested: Option<usize>) -> Result<usize> {
        match requested {
            Some(0) => Err(MineRagError::InvalidQuery(
                "top_k must be at least 1".to_string(),
            )),
            Some(k) => Ok(k.min(self.max_top_k)),
            None => Ok(self.default_top_k),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    /// Budget for one embed, retrieve, synthesize chain.
    pub timeout_secs: u64,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self { timeout_secs: 90 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HazardConfig {
    pub min_confidence: f32,
}

impl Default for HazardConfig {
    fn default() -> Self {
        Self {
            min_confidence: 0.25,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    /// Browser origins allowed to call the API.
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8000".to_string(),
            cors_origins: vec![
                "http://127.0.0.1:5173".to_string(),
                "http://localhost:5173".to_string(),
            ],
        }
    }
}

impl Config {
    /// Global config, then project config, then environment.
    pub fn load() -> Result<Self> {
        let global = Self::load_global()?;
        let project = Self::load_project()?;
        let merged = Self::merge(global, project);
        Ok(merged.with_env_overrides())
    }

    /// Reads a single file, then applies environment overrides.
    pub fn load_from(path: &Path) -> Result<Self> {
        let config = Self::read(path)?.unwrap_or_default();
        Ok(config.with_env_overrides())
    }

    fn load_global() -> Result<Option<Self>> {
        let config_dir = directories::ProjectDirs::from("", "", "minesafe").map_or_else(
            || PathBuf::from("~/.config/minesafe"),
            |d| d.config_dir().to_path_buf(),
        );
        Self::read(&config_dir.join("config.toml"))
    }

    fn load_project() -> Result<Option<Self>> {
        Self::read(Path::new(".minesafe/config.toml"))
    }

    fn read(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content)
            .map(Some)
            .map_err(|e| MineRagError::Config(format!("{}: {e}", path.display())))
    }

    fn merge(global: Option<Self>, project: Option<Self>) -> Self {
        match (global, project) {
            (Some(global), Some(project)) => Self {
                openai_api_key: project.openai_api_key.or(global.openai_api_key),
                ..project
            },
            (Some(only), None) | (None, Some(only)) => only,
            (None, None) => Self::default(),
        }
    }

    fn with_env_overrides(mut self) -> Self {
        if let Ok(key) = std::env::var("OPENAI_API_KEY")
            && !key.trim().is_empty()
        {
            self.openai_api_key = Some(key);
        }
        if let Ok(path) = std::env::var("MINESAFE_INDEX_PATH") {
            self.index_path = PathBuf::from(path);
        }
        if let Ok(dir) = std::env::var("MINESAFE_CORPUS_DIR") {
            self.corpus_dir = PathBuf::from(dir);
        }
        if let Ok(bind) = std::env::var("MINESAFE_BIND") {
            self.server.bind = bind;
        }
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.chunking.chunk_size == 0 || self.chunking.chunk_overlap >= self.chunking.chunk_size
        {
            return Err(MineRagError::Config(format!(
                "chunking: need 0 <= chunk_overlap ({}) < chunk_size ({})",
                self.chunking.chunk_overlap, self.chunking.chunk_size
            )));
        }
        if self.retrieval.default_top_k == 0 {
            return Err(MineRagError::Config(
                "retrieval.default_top_k must be at least 1".to_string(),
            ));
        }
        if self.retrieval.max_top_k < self.retrieval.default_top_k {
            return Err(MineRagError::Config(
                "retrieval.max_top_k must not be below default_top_k".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.hazard.min_confidence) {
            return Err(MineRagError::Config(
                "hazard.min_confidence must be within [0, 1]".to_string(),
            ));
        }
        if self.embedding.dimensions == 0 || self.embedding.batch_size == 0 {
            return Err(MineRagError::Config(
                "embedding.dimensions and embedding.batch_size must be positive".to_string(),
            ));
        }
        if self.embedding.timeout_secs == 0
            || self.generation.timeout_secs == 0
            || self.query.timeout_secs == 0
        {
            return Err(MineRagError::Config("timeouts must be positive".to_string()));
        }
        let needs_key = self.embedding.provider == EmbeddingProvider::OpenAi
            || self.generation.provider == GenerationProvider::OpenAi;
        if needs_key && self.openai_api_key.is_none() {
            return Err(MineRagError::Config(
                "OpenAI provider selected but OPENAI_API_KEY is not set".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.chunking.chunk_size, 800);
        assert_eq!(config.chunking.chunk_overlap, 200);
        assert_eq!(config.generation.max_retries, 2);
        assert_eq!(config.server.cors_origins.len(), 2);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: Config = toml::from_str(
            r#"
            index_path = "/tmp/index.json"

            [retrieval]
            default_top_k = 3
            "#,
        )
        .unwrap();
        assert_eq!(config.index_path, PathBuf::from("/tmp/index.json"));
        assert_eq!(config.retrieval.default_top_k, 3);
        assert_eq!(config.retrieval.max_top_k, 20);
        assert_eq!(config.embedding.provider, EmbeddingProvider::Hashing);
    }

    #[test]
    fn test_provider_names() {
        let config: Config = toml::from_str(
            r#"
            openai_api_key = "sk-test"
            [embedding]
            provider = "openai"
            [generation]
            provider = "openai"
            "#,
        )
        .unwrap();
        assert_eq!(config.embedding.provider, EmbeddingProvider::OpenAi);
        assert_eq!(config.generation.provider, GenerationProvider::OpenAi);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_openai_without_key_is_rejected() {
        let mut config = Config::default();
        config.generation.provider = GenerationProvider::OpenAi;
        assert!(matches!(config.validate(), Err(MineRagError::Config(_))));
    }

    #[test]
    fn test_invalid_chunking_is_rejected() {
        let mut config = Config::default();
        config.chunking.chunk_overlap = 800;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_resolve_top_k() {
        let retrieval = RetrievalConfig::default();
        assert_eq!(retrieval.resolve_top_k(None).unwrap(), 6);
        assert_eq!(retrieval.resolve_top_k(Some(3)).unwrap(), 3);
        assert_eq!(retrieval.resolve_top_k(Some(500)).unwrap(), 20);
        assert!(matches!(
            retrieval.resolve_top_k(Some(0)),
            Err(MineRagError::InvalidQuery(_))
        ));
    }

    #[test]
    fn test_project_overrides_global_but_keeps_key() {
        let global = Config {
            openai_api_key: Some("sk-global".into()),
            ..Config::default()
        };
        let project = Config {
            index_path: PathBuf::from("project.json"),
            ..Config::default()
        };
        let merged = Config::merge(Some(global), Some(project));
        assert_eq!(merged.index_path, PathBuf::from("project.json"));
        assert_eq!(merged.openai_api_key.as_deref(), Some("sk-global"));
    }
}
