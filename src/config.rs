use std::env;
use std::path::PathBuf;
use std::sync::OnceLock;
use thiserror::Error;

const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";
const DEFAULT_GEMINI_MODEL: &str = "gemini-pro";
const DEFAULT_OLLAMA_GENERATION_MODEL: &str = "llama3";
const DEFAULT_OLLAMA_URL: &str = "http://127.0.0.1:11434";
const DEFAULT_EMBEDDING_MODEL: &str = "all-minilm";
const DEFAULT_EMBEDDING_DIMENSION: usize = 384;
const DEFAULT_CHUNK_SIZE: usize = 1000;
const DEFAULT_CHUNK_OVERLAP: usize = 100;
const DEFAULT_TOP_K: usize = 5;
const DEFAULT_MAX_DOCUMENTS: usize = 32;
const DEFAULT_MAX_CONCURRENT_INGESTS: usize = 2;
const DEFAULT_MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;
const DEFAULT_GENERATION_TIMEOUT_SECS: u64 = 60;
const DEFAULT_EMBEDDING_TIMEOUT_SECS: u64 = 30;
const DEFAULT_SERVER_HOST: &str = "0.0.0.0";
const DEFAULT_SERVER_PORT: u16 = 8000;

/// Errors encountered while loading configuration from environment variables.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Required environment variable was not provided.
    #[error("Missing environment variable: {0}")]
    MissingVariable(String),
    /// Environment variable contained a value that could not be parsed.
    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(String),
}

/// Runtime configuration for the PDF chat server.
#[derive(Debug, Clone)]
pub struct Config {
    /// Backend that answers questions from retrieved context.
    pub generation_provider: GenerationProvider,
    /// Credential for the Gemini API. Present whenever the provider is Gemini.
    pub gemini_api_key: Option<String>,
    /// Root URL of the Gemini REST API.
    pub gemini_base_url: String,
    /// Model identifier passed to the generation provider.
    pub generation_model: String,
    /// Deadline for a single generation call, in seconds.
    pub generation_timeout_secs: u64,
    /// Embedding provider used to generate vector representations.
    pub embedding_provider: EmbeddingProvider,
    /// Embedding model identifier passed to the provider.
    pub embedding_model: String,
    /// Dimensionality of the produced vectors.
    pub embedding_dimension: usize,
    /// Deadline for a single remote embedding request, in seconds.
    pub embedding_timeout_secs: u64,
    /// Root URL of the Ollama runtime (embeddings and generation).
    pub ollama_url: String,
    /// Maximum characters per chunk.
    pub text_splitter_chunk_size: usize,
    /// Characters shared between adjacent chunks.
    pub text_splitter_chunk_overlap: usize,
    /// Number of chunks retrieved per question.
    pub retrieval_top_k: usize,
    /// Upper bound on documents kept in the registry.
    pub max_documents: usize,
    /// Number of uploads processed at the same time.
    pub max_concurrent_ingests: usize,
    /// Request body limit for uploads.
    pub max_upload_bytes: usize,
    /// Directory receiving scoped temporary upload files.
    pub upload_dir: PathBuf,
    /// Address the HTTP server binds to.
    pub server_host: String,
    /// Port the HTTP server binds to.
    pub server_port: u16,
}

/// Supported embedding backends.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EmbeddingProvider {
    /// In-process character n-gram hashing. No external service.
    Hashing,
    /// Local Ollama runtime.
    Ollama,
}

/// Supported generative answer backends.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GenerationProvider {
    /// Hosted Google Gemini API.
    Gemini,
    /// Local Ollama runtime.
    Ollama,
}

impl Config {
    /// Load configuration from environment variables, performing validation along the way.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    ///
    /// Blank values are treated as absent so that `FOO=` in a `.env` file falls back to the
    /// default instead of failing to parse.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let generation_provider = match get("GENERATION_PROVIDER") {
            Some(value) => value
                .parse()
                .map_err(|()| ConfigError::InvalidValue("GENERATION_PROVIDER".into()))?,
            None => GenerationProvider::Gemini,
        };

        let gemini_api_key = get("GEMINI_API_KEY");
        if generation_provider == GenerationProvider::Gemini && gemini_api_key.is_none() {
            return Err(ConfigError::MissingVariable("GEMINI_API_KEY".into()));
        }

        let default_model = match generation_provider {
            GenerationProvider::Gemini => DEFAULT_GEMINI_MODEL,
            GenerationProvider::Ollama => DEFAULT_OLLAMA_GENERATION_MODEL,
        };
        let generation_model =
            get("GENERATION_MODEL").unwrap_or_else(|| default_model.to_string());

        let embedding_provider = match get("EMBEDDING_PROVIDER") {
            Some(value) => value
                .parse()
                .map_err(|()| ConfigError::InvalidValue("EMBEDDING_PROVIDER".into()))?,
            None => EmbeddingProvider::Hashing,
        };

        let config = Self {
            generation_provider,
            gemini_api_key,
            gemini_base_url: get("GEMINI_BASE_URL")
                .unwrap_or_else(|| DEFAULT_GEMINI_BASE_URL.to_string()),
            generation_model,
            generation_timeout_secs: parse_or(
                get("GENERATION_TIMEOUT_SECS"),
                "GENERATION_TIMEOUT_SECS",
                DEFAULT_GENERATION_TIMEOUT_SECS,
            )?,
            embedding_provider,
            embedding_model: get("EMBEDDING_MODEL")
                .unwrap_or_else(|| DEFAULT_EMBEDDING_MODEL.to_string()),
            embedding_dimension: parse_or(
                get("EMBEDDING_DIMENSION"),
                "EMBEDDING_DIMENSION",
                DEFAULT_EMBEDDING_DIMENSION,
            )?,
            embedding_timeout_secs: parse_or(
                get("EMBEDDING_TIMEOUT_SECS"),
                "EMBEDDING_TIMEOUT_SECS",
                DEFAULT_EMBEDDING_TIMEOUT_SECS,
            )?,
            ollama_url: get("OLLAMA_URL").unwrap_or_else(|| DEFAULT_OLLAMA_URL.to_string()),
            text_splitter_chunk_size: parse_or(
                get("TEXT_SPLITTER_CHUNK_SIZE"),
                "TEXT_SPLITTER_CHUNK_SIZE",
                DEFAULT_CHUNK_SIZE,
            )?,
            text_splitter_chunk_overlap: parse_or(
                get("TEXT_SPLITTER_CHUNK_OVERLAP"),
                "TEXT_SPLITTER_CHUNK_OVERLAP",
                DEFAULT_CHUNK_OVERLAP,
            )?,
            retrieval_top_k: parse_or(get("RETRIEVAL_TOP_K"), "RETRIEVAL_TOP_K", DEFAULT_TOP_K)?,
            max_documents: parse_or(
                get("MAX_DOCUMENTS"),
                "MAX_DOCUMENTS",
                DEFAULT_MAX_DOCUMENTS,
            )?,
            max_concurrent_ingests: parse_or(
                get("MAX_CONCURRENT_INGESTS"),
                "MAX_CONCURRENT_INGESTS",
                DEFAULT_MAX_CONCURRENT_INGESTS,
            )?,
            max_upload_bytes: parse_or(
                get("MAX_UPLOAD_BYTES"),
                "MAX_UPLOAD_BYTES",
                DEFAULT_MAX_UPLOAD_BYTES,
            )?,
            upload_dir: get("UPLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(env::temp_dir),
            server_host: get("SERVER_HOST").unwrap_or_else(|| DEFAULT_SERVER_HOST.to_string()),
            server_port: parse_or(get("SERVER_PORT"), "SERVER_PORT", DEFAULT_SERVER_PORT)?,
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("EMBEDDING_DIMENSION", self.embedding_dimension),
            ("TEXT_SPLITTER_CHUNK_SIZE", self.text_splitter_chunk_size),
            ("RETRIEVAL_TOP_K", self.retrieval_top_k),
            ("MAX_DOCUMENTS", self.max_documents),
            ("MAX_CONCURRENT_INGESTS", self.max_concurrent_ingests),
        ];
        for (key, value) in positive {
            if value == 0 {
                return Err(ConfigError::InvalidValue(key.to_string()));
            }
        }
        if self.generation_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue("GENERATION_TIMEOUT_SECS".into()));
        }
        if self.embedding_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue("EMBEDDING_TIMEOUT_SECS".into()));
        }
        Ok(())
    }
}

fn parse_or<T: std::str::FromStr>(
    value: Option<String>,
    key: &str,
    default: T,
) -> Result<T, ConfigError> {
    match value {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue(key.to_string())),
        None => Ok(default),
    }
}

impl std::str::FromStr for EmbeddingProvider {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "hashing" | "local" => Ok(Self::Hashing),
            "ollama" => Ok(Self::Ollama),
            _ => Err(()),
        }
    }
}

impl std::str::FromStr for GenerationProvider {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "gemini" => Ok(Self::Gemini),
            "ollama" => Ok(Self::Ollama),
            _ => Err(()),
        }
    }
}

static CONFIG: OnceLock<Config> = OnceLock::new();

/// Load configuration from the environment (and `.env`) and install it in the global cache.
pub fn init_config() -> Result<&'static Config, ConfigError> {
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;
    tracing::debug!(
        generation_provider = ?config.generation_provider,
        generation_model = %config.generation_model,
        embedding_provider = ?config.embedding_provider,
        embedding_dimension = config.embedding_dimension,
        upload_dir = %config.upload_dir.display(),
        "Loaded configuration"
    );
    Ok(CONFIG.get_or_init(|| config))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(pairs: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn gemini_key_is_required_by_default() {
        let error = load(&[]).unwrap_err();
        assert!(matches!(error, ConfigError::MissingVariable(name) if name == "GEMINI_API_KEY"));
    }

    #[test]
    fn blank_gemini_key_counts_as_missing() {
        let error = load(&[("GEMINI_API_KEY", "   ")]).unwrap_err();
        assert!(matches!(error, ConfigError::MissingVariable(_)));
    }

    #[test]
    fn defaults_match_documented_values() {
        let config = load(&[("GEMINI_API_KEY", "secret")]).expect("config");
        assert_eq!(config.generation_provider, GenerationProvider::Gemini);
        assert_eq!(config.generation_model, "gemini-pro");
        assert_eq!(config.embedding_provider, EmbeddingProvider::Hashing);
        assert_eq!(config.embedding_dimension, 384);
        assert_eq!(config.text_splitter_chunk_size, 1000);
        assert_eq!(config.text_splitter_chunk_overlap, 100);
        assert_eq!(config.retrieval_top_k, 5);
        assert_eq!(config.server_port, 8000);
        assert_eq!(config.generation_timeout_secs, 60);
        assert_eq!(config.embedding_timeout_secs, 30);
    }

    #[test]
    fn ollama_generation_does_not_need_gemini_key() {
        let config = load(&[("GENERATION_PROVIDER", "Ollama")]).expect("config");
        assert_eq!(config.generation_provider, GenerationProvider::Ollama);
        assert_eq!(config.generation_model, "llama3");
        assert!(config.gemini_api_key.is_none());
    }

    #[test]
    fn rejects_unparseable_numbers() {
        let error = load(&[("GEMINI_API_KEY", "k"), ("SERVER_PORT", "eighty")]).unwrap_err();
        assert!(matches!(error, ConfigError::InvalidValue(name) if name == "SERVER_PORT"));
    }

    #[test]
    fn rejects_zero_chunk_size() {
        let error = load(&[("GEMINI_API_KEY", "k"), ("TEXT_SPLITTER_CHUNK_SIZE", "0")]).unwrap_err();
        assert!(
            matches!(error, ConfigError::InvalidValue(name) if name == "TEXT_SPLITTER_CHUNK_SIZE")
        );
    }

    #[test]
    fn rejects_unknown_provider() {
        let error = load(&[("GEMINI_API_KEY", "k"), ("EMBEDDING_PROVIDER", "openai")]).unwrap_err();
        assert!(matches!(error, ConfigError::InvalidValue(name) if name == "EMBEDDING_PROVIDER"));
    }
}
