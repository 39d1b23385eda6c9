use serde::Deserialize;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::OnceLock;
use thiserror::Error;

/// Errors encountered while loading configuration from environment variables.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Required environment variable was not provided.
    #[error("Missing environment variable: {0}")]
    MissingVariable(String),
    /// Environment variable carried a value that fails validation.
    #[error("Invalid value for {variable}: {reason}")]
    InvalidValue {
        /// Variable whose value was rejected.
        variable: String,
        /// Why the value was rejected.
        reason: String,
    },
}

/// Runtime configuration shared by the docpipe server and the batch CLI.
///
/// Validation is eager: a bad chunking window or a missing embedding
/// endpoint aborts startup instead of surfacing halfway through a batch run.
#[derive(Debug, Deserialize)]
pub struct Config {
    /// Base URL of the Qdrant instance holding the document index.
    pub qdrant_url: String,
    /// Optional API key required to access Qdrant.
    pub qdrant_api_key: Option<String>,
    /// Default collection receiving ingested documents.
    pub qdrant_collection: String,
    /// Keep vectors on disk instead of RAM when creating collections.
    pub qdrant_on_disk: bool,
    /// Embedding backend used to vectorize chunks.
    pub embedding_provider: EmbeddingProvider,
    /// Base URL of the embedding service; required for remote providers.
    pub embedding_url: Option<String>,
    /// Optional bearer token for the embedding service.
    pub embedding_api_key: Option<String>,
    /// Model identifier passed to OpenAI-shaped endpoints.
    pub embedding_model: String,
    /// Dimensionality of the produced vectors.
    pub embedding_dimension: usize,
    /// Directory scanned when the CLI runs without an explicit path.
    pub doc_dir: PathBuf,
    /// Extension allow-list, lowercased with a leading dot.
    pub allowed_exts: Vec<String>,
    /// Token window size used by the splitter.
    pub chunk_tokens: usize,
    /// Token overlap between adjacent windows.
    pub chunk_overlap: usize,
    /// Result count handed to downstream retrieval.
    pub top_k: usize,
    /// Number of query expansions downstream retrieval may generate.
    pub multi_query: usize,
    /// Language hints for OCR and payload enrichment, lowercased codes.
    pub language_hints: Vec<String>,
    /// Whether low-text PDF pages fall back to OCR.
    pub ocr_enabled: bool,
    /// Render resolution used when rasterizing PDF pages for OCR.
    pub ocr_dpi: u32,
    /// Minimum trimmed character count for direct extraction to win.
    pub ocr_min_chars: usize,
    /// Optional override for the HTTP server port.
    pub server_port: Option<u16>,
}

/// Supported embedding backends for the ingestion pipeline.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProvider {
    /// A text-embeddings-inference server (hosts models such as BAAI/bge-m3).
    Tei,
    /// Any endpoint speaking the OpenAI `/v1/embeddings` wire format.
    OpenAI,
    /// Deterministic local hashing, for tests and air-gapped runs.
    Hashed,
}

impl EmbeddingProvider {
    /// Whether this provider needs a remote endpoint configured.
    pub fn is_remote(self) -> bool {
        !matches!(self, Self::Hashed)
    }
}

impl Config {
    /// Load configuration from environment variables, performing validation along the way.
    pub fn from_env() -> Result<Self, ConfigError> {
        let chunk_tokens: usize = parse_var("CHUNK_TOKENS", &load_env_or("CHUNK_TOKENS", "800"))?;
        if chunk_tokens == 0 {
            return Err(invalid("CHUNK_TOKENS", "must be greater than zero"));
        }
        let chunk_overlap: usize =
            parse_var("CHUNK_OVERLAP", &load_env_or("CHUNK_OVERLAP", "120"))?;
        if chunk_overlap >= chunk_tokens {
            return Err(invalid(
                "CHUNK_OVERLAP",
                &format!("({chunk_overlap}) must be smaller than CHUNK_TOKENS ({chunk_tokens})"),
            ));
        }

        let allowed_exts = parse_exts(&load_env_or("ALLOWED_EXTS", ".pdf, .docx"));
        if allowed_exts.is_empty() {
            return Err(invalid("ALLOWED_EXTS", "must list at least one extension"));
        }
        let language_hints = parse_hints(&load_env_or("LANGUAGE_HINTS", "en, pl"));
        if language_hints.is_empty() {
            return Err(invalid("LANGUAGE_HINTS", "must list at least one language"));
        }

        let top_k: usize = parse_var("TOP_K", &load_env_or("TOP_K", "5"))?;
        if top_k == 0 {
            return Err(invalid("TOP_K", "must be at least 1"));
        }
        let multi_query: usize = parse_var("MULTI_QUERY", &load_env_or("MULTI_QUERY", "2"))?;

        let embedding_provider: EmbeddingProvider = load_env_or("EMBEDDING_PROVIDER", "tei")
            .parse()
            .map_err(|()| {
                invalid(
                    "EMBEDDING_PROVIDER",
                    "expected one of 'tei', 'openai', 'hashed'",
                )
            })?;
        let embedding_url = load_env_optional("EMBEDDING_URL");
        if embedding_provider.is_remote() && embedding_url.is_none() {
            return Err(ConfigError::MissingVariable("EMBEDDING_URL".to_string()));
        }
        let embedding_dimension: usize =
            parse_var("EMBEDDING_DIMENSION", &load_env("EMBEDDING_DIMENSION")?)?;
        if embedding_dimension == 0 {
            return Err(invalid("EMBEDDING_DIMENSION", "must be greater than zero"));
        }

        let ocr_enabled = parse_bool("OCR_ENABLED", &load_env_or("OCR_ENABLED", "true"))?;
        let ocr_dpi: u32 = parse_var("OCR_DPI", &load_env_or("OCR_DPI", "300"))?;
        if ocr_dpi == 0 {
            return Err(invalid("OCR_DPI", "must be greater than zero"));
        }
        let ocr_min_chars: usize = parse_var("OCR_MIN_CHARS", &load_env_or("OCR_MIN_CHARS", "20"))?;

        let server_port = load_env_optional("SERVER_PORT")
            .map(|value| parse_var("SERVER_PORT", &value))
            .transpose()?;

        Ok(Self {
            qdrant_url: load_env("QDRANT_URL")?,
            qdrant_api_key: load_env_optional("QDRANT_API_KEY"),
            qdrant_collection: load_env_or("QDRANT_COLLECTION", "docchat"),
            qdrant_on_disk: parse_bool("QDRANT_ON_DISK", &load_env_or("QDRANT_ON_DISK", "false"))?,
            embedding_provider,
            embedding_url,
            embedding_api_key: load_env_optional("EMBEDDING_API_KEY"),
            embedding_model: load_env_or("EMBEDDING_MODEL", "BAAI/bge-m3"),
            embedding_dimension,
            doc_dir: PathBuf::from(load_env_or("DOC_DIR", "./data")),
            allowed_exts,
            chunk_tokens,
            chunk_overlap,
            top_k,
            multi_query,
            language_hints,
            ocr_enabled,
            ocr_dpi,
            ocr_min_chars,
            server_port,
        })
    }

    /// Language value stored in chunk payloads when no per-request override
    /// is supplied: the configured hints joined with commas.
    pub fn payload_language(&self) -> String {
        self.language_hints.join(",")
    }
}

fn load_env(key: &str) -> Result<String, ConfigError> {
    env::var(key).map_err(|_| ConfigError::MissingVariable(key.to_string()))
}

fn load_env_optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn load_env_or(key: &str, default: &str) -> String {
    load_env_optional(key).unwrap_or_else(|| default.to_string())
}

fn invalid(variable: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        variable: variable.to_string(),
        reason: reason.to_string(),
    }
}

fn parse_var<T: FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| invalid(key, &format!("could not parse '{value}'")))
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(invalid(key, &format!("expected a boolean, got '{other}'"))),
    }
}

/// Split a comma-separated extension list, lowercasing each entry and
/// prefixing the dot when the operator left it off.
fn parse_exts(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let lowered = entry.to_ascii_lowercase();
            if lowered.starts_with('.') {
                lowered
            } else {
                format!(".{lowered}")
            }
        })
        .collect()
}

/// Split a comma-separated language hint list into lowercase codes.
fn parse_hints(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(str::to_ascii_lowercase)
        .collect()
}

impl FromStr for EmbeddingProvider {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "tei" => Ok(Self::Tei),
            "openai" => Ok(Self::OpenAI),
            "hashed" => Ok(Self::Hashed),
            _ => Err(()),
        }
    }
}

/// Global configuration cache populated during process start.
pub static CONFIG: OnceLock<Config> = OnceLock::new();

/// Retrieve the loaded configuration, panicking if initialization has not occurred.
pub fn get_config() -> &'static Config {
    CONFIG.get().expect("Config not initialized")
}

/// Load configuration from the environment and install it in the global cache.
pub fn init_config() {
    dotenvy::dotenv().ok();
    let config = Config::from_env().expect("Failed to load config from environment");
    tracing::debug!(
        qdrant_url = %config.qdrant_url,
        collection = %config.qdrant_collection,
        provider = ?config.embedding_provider,
        dimension = config.embedding_dimension,
        chunk_tokens = config.chunk_tokens,
        chunk_overlap = config.chunk_overlap,
        ocr_enabled = config.ocr_enabled,
        "Loaded configuration"
    );
    CONFIG.set(config).expect("Failed to set config");
}
