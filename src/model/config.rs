use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

const ENV_CONFIG_PATH: &str = "PAPER_TRAIL_CONFIG_PATH";
const DEFAULT_CONFIG_PATH: &str = "config.yaml";

const ENV_TTL_SECONDS: &str = "PAPER_TRAIL_TTL_SECONDS";
const ENV_MAX_FILE_MB: &str = "PAPER_TRAIL_MAX_FILE_MB";
const ENV_STORE: &str = "PAPER_TRAIL_STORE";
const ENV_REDIS_URL: &str = "PAPER_TRAIL_REDIS_URL";
const ENV_REDIS_HOST: &str = "PAPER_TRAIL_REDIS_HOST";
const ENV_REDIS_PORT: &str = "PAPER_TRAIL_REDIS_PORT";
const ENV_REDIS_PASSWORD: &str = "PAPER_TRAIL_REDIS_PASSWORD";
const ENV_REDIS_DB: &str = "PAPER_TRAIL_REDIS_DB";
const ENV_EXTRACTION_MODEL: &str = "CLAIM_EXTRACTION_MODEL";
const ENV_VERIFICATION_MODEL: &str = "CLAIM_VERIFICATION_MODEL";
const ENV_LLM_BASE_URL: &str = "LLM_BASE_URL";
const ENV_SEMANTIC_SCHOLAR_URL: &str = "SEMANTIC_SCHOLAR_URL";

const DEFAULT_TTL_SECONDS: u64 = 2 * 60 * 60; // 2 hours
const DEFAULT_MAX_FILE_MB: usize = 20;
const DEFAULT_REDIS_HOST: &str = "127.0.0.1";
const DEFAULT_REDIS_PORT: &str = "6379";
const DEFAULT_REDIS_DB: &str = "0";
const DEFAULT_LLM_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "gpt-4o";
const DEFAULT_SEMANTIC_SCHOLAR_URL: &str = "https://api.semanticscholar.org/graph/v1/paper/search";

/// Which [`crate::store::EphemeralStore`] backs job state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Redis,
    Memory,
}

/// Claim extraction tuning
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Pages sent to the reasoner at once
    pub concurrency: usize,
    /// Page text beyond this many characters is not sent to the reasoner
    pub max_page_chars: usize,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            concurrency: 4,
            max_page_chars: 15_000,
        }
    }
}

/// Claim verification tuning
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct VerificationConfig {
    /// Excerpts of the cited document handed to the reasoner
    pub top_k: usize,
    /// Upper bound on characters per excerpt chunk
    pub chunk_chars: usize,
    /// Word cap for evidence excerpts returned to clients
    pub excerpt_words: usize,
    /// Chunks scoring below this similarity are never used as evidence
    pub min_similarity: f32,
}

impl Default for VerificationConfig {
    fn default() -> Self {
        Self {
            top_k: 4,
            chunk_chars: 1400,
            excerpt_words: 100,
            min_similarity: 0.0,
        }
    }
}

/// YAML configuration file structure
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub extraction: ExtractionConfig,
    #[serde(default)]
    pub verification: VerificationConfig,
}

/// Language model endpoints and model names
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub base_url: String,
    pub extraction_model: String,
    pub verification_model: String,
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub host: String,
    /// Inactivity window after which all job state expires
    pub ttl: Duration,
    pub max_file_mb: usize,
    pub store: StoreBackend,
    pub redis_url: String,
    pub llm: LlmConfig,
    pub semantic_scholar_url: String,
    pub extraction: ExtractionConfig,
    pub verification: VerificationConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8080,
            host: "127.0.0.1".to_string(),
            ttl: Duration::from_secs(DEFAULT_TTL_SECONDS),
            max_file_mb: DEFAULT_MAX_FILE_MB,
            store: StoreBackend::Redis,
            redis_url: format!(
                "redis://{}:{}/{}",
                DEFAULT_REDIS_HOST, DEFAULT_REDIS_PORT, DEFAULT_REDIS_DB
            ),
            llm: LlmConfig {
                base_url: DEFAULT_LLM_BASE_URL.to_string(),
                extraction_model: DEFAULT_MODEL.to_string(),
                verification_model: DEFAULT_MODEL.to_string(),
            },
            semantic_scholar_url: DEFAULT_SEMANTIC_SCHOLAR_URL.to_string(),
            extraction: ExtractionConfig::default(),
            verification: VerificationConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from environment and config file
    pub fn from_env() -> Self {
        let port = std::env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(8080);

        let host = std::env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());

        let ttl_seconds = std::env::var(ENV_TTL_SECONDS)
            .ok()
            .and_then(|s| s.parse().ok())
            .filter(|secs| *secs > 0)
            .unwrap_or(DEFAULT_TTL_SECONDS);

        let max_file_mb = std::env::var(ENV_MAX_FILE_MB)
            .ok()
            .and_then(|s| s.parse().ok())
            .filter(|mb| *mb > 0)
            .unwrap_or(DEFAULT_MAX_FILE_MB);

        let store = match std::env::var(ENV_STORE).as_deref() {
            Ok("memory") => StoreBackend::Memory,
            _ => StoreBackend::Redis,
        };

        let llm = LlmConfig {
            base_url: std::env::var(ENV_LLM_BASE_URL)
                .unwrap_or_else(|_| DEFAULT_LLM_BASE_URL.to_string()),
            extraction_model: std::env::var(ENV_EXTRACTION_MODEL)
                .unwrap_or_else(|_| DEFAULT_MODEL.to_string()),
            verification_model: std::env::var(ENV_VERIFICATION_MODEL)
                .unwrap_or_else(|_| DEFAULT_MODEL.to_string()),
        };

        let semantic_scholar_url = std::env::var(ENV_SEMANTIC_SCHOLAR_URL)
            .unwrap_or_else(|_| DEFAULT_SEMANTIC_SCHOLAR_URL.to_string());

        // Load config file
        let config_path =
            std::env::var(ENV_CONFIG_PATH).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        let file = Self::load_config_file(&config_path).unwrap_or_default();

        Self {
            port,
            host,
            ttl: Duration::from_secs(ttl_seconds),
            max_file_mb,
            store,
            redis_url: redis_url_from_env(),
            llm,
            semantic_scholar_url,
            extraction: file.extraction,
            verification: file.verification,
        }
    }

    /// Load configuration from YAML file
    fn load_config_file(path: &str) -> Option<ConfigFile> {
        let path = Path::new(path);

        if !path.exists() {
            tracing::debug!(path = %path.display(), "Config file not found, using defaults");
            return None;
        }

        match fs::read_to_string(path) {
            Ok(contents) => match parse_config_file(&contents) {
                Ok(config) => {
                    tracing::info!(path = %path.display(), "Loaded configuration from file");
                    Some(config)
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Failed to parse config file, using defaults");
                    None
                }
            },
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Failed to read config file, using defaults");
                None
            }
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn max_upload_bytes(&self) -> usize {
        self.max_file_mb * 1024 * 1024
    }
}

/// Parse the YAML config file; an empty file yields defaults
fn parse_config_file(contents: &str) -> Result<ConfigFile, serde_yaml::Error> {
    let contents = contents.trim();
    if contents.is_empty() {
        return Ok(ConfigFile::default());
    }
    serde_yaml::from_str(contents)
}

/// Build the Redis URL: `PAPER_TRAIL_REDIS_URL` wins, else redis://[:password@]host:port/db
fn redis_url_from_env() -> String {
    if let Ok(url) = std::env::var(ENV_REDIS_URL) {
        return url;
    }

    let host = std::env::var(ENV_REDIS_HOST).unwrap_or_else(|_| DEFAULT_REDIS_HOST.to_string());
    let port = std::env::var(ENV_REDIS_PORT).unwrap_or_else(|_| DEFAULT_REDIS_PORT.to_string());
    let password = std::env::var(ENV_REDIS_PASSWORD).ok();
    let db = std::env::var(ENV_REDIS_DB).unwrap_or_else(|_| DEFAULT_REDIS_DB.to_string());

    match password {
        Some(pwd) if !pwd.is_empty() => format!("redis://:{}@{}:{}/{}", pwd, host, port, db),
        _ => format!("redis://{}:{}/{}", host, port, db),
    }
}
