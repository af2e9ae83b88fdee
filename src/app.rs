//! Application state and service initialization
//!
//! All shared resources are built here once at startup and handed to the
//! handlers through actix `web::Data`.

use std::sync::Arc;

use url::Url;

use crate::api::paper::UploadLimit;
use crate::model::{Config, StoreBackend};
use crate::service::{
    Collaborators, CredentialValidator, LexicalScorer, LlmReasoner, PaperService,
    PdfTextExtractor, SuggestionClient,
};
use crate::store::{EphemeralStore, MemoryStore, RedisStore};

/// Application state containing all services and shared resources
pub struct AppState {
    /// Façade behind every paper endpoint
    pub paper_service: Arc<PaperService>,
    pub upload_limit: UploadLimit,
}

impl AppState {
    /// Initialize all services and build application state
    ///
    /// This performs:
    /// 1. Job store connection (Redis, or in-process memory)
    /// 2. Collaborator construction (document reader, scorer, reasoner, HTTP clients)
    /// 3. Service dependency graph construction
    pub async fn new(config: Config) -> Result<Self, AppError> {
        let store = Self::build_store(&config).await?;

        if config.llm.extraction_model.trim().is_empty() {
            return Err(AppError::InvalidConfig("CLAIM_EXTRACTION_MODEL is empty"));
        }
        if config.llm.verification_model.trim().is_empty() {
            return Err(AppError::InvalidConfig("CLAIM_VERIFICATION_MODEL is empty"));
        }
        check_http_url(&config.llm.base_url, "LLM_BASE_URL is not an http(s) URL")?;
        check_http_url(
            &config.semantic_scholar_url,
            "SEMANTIC_SCHOLAR_URL is not an http(s) URL",
        )?;

        let collaborators = Self::build_collaborators(&config);
        let paper_service = Arc::new(PaperService::new(store, collaborators, &config));

        tracing::info!(
            ttl_secs = config.ttl.as_secs(),
            max_file_mb = config.max_file_mb,
            concurrency = config.extraction.concurrency,
            top_k = config.verification.top_k,
            "Paper service ready"
        );

        Ok(Self {
            paper_service,
            upload_limit: UploadLimit(config.max_upload_bytes()),
        })
    }

    async fn build_store(config: &Config) -> Result<Arc<dyn EphemeralStore>, AppError> {
        match config.store {
            StoreBackend::Redis => {
                let store = RedisStore::connect(&config.redis_url)
                    .await
                    .map_err(|e| AppError::StoreInit(e.to_string()))?;
                tracing::info!("Using Redis job store");
                Ok(Arc::new(store))
            }
            StoreBackend::Memory => {
                tracing::warn!("Using in-process job store; state is lost on restart");
                Ok(Arc::new(MemoryStore::new()))
            }
        }
    }

    fn build_collaborators(config: &Config) -> Collaborators {
        let reasoner = LlmReasoner::new(
            config.llm.extraction_model.clone(),
            config.llm.verification_model.clone(),
            config.extraction.max_page_chars,
        );

        Collaborators {
            extractor: Arc::new(PdfTextExtractor),
            scorer: Arc::new(LexicalScorer),
            reasoner: Arc::new(reasoner),
            credentials: CredentialValidator::new(config.llm.base_url.clone()),
            suggestions: SuggestionClient::new(config.semantic_scholar_url.clone()),
        }
    }
}

fn check_http_url(raw: &str, problem: &'static str) -> Result<(), AppError> {
    match Url::parse(raw) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => Ok(()),
        _ => Err(AppError::InvalidConfig(problem)),
    }
}

/// Application-level errors
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum AppError {
    /// Job store could not be reached at startup
    #[error("Store initialization failed: {0}")]
    StoreInit(String),

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    InvalidConfig(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_backend_builds_state() {
        let config = Config {
            store: StoreBackend::Memory,
            max_file_mb: 2,
            ..Config::default()
        };
        let state = AppState::new(config).await.unwrap();
        assert_eq!(state.upload_limit.0, 2 * 1024 * 1024);
        assert!(state.paper_service.ping().await.is_ok());
    }

    #[tokio::test]
    async fn test_blank_model_name_rejected() {
        let mut config = Config {
            store: StoreBackend::Memory,
            ..Config::default()
        };
        config.llm.extraction_model = " ".to_string();
        assert!(matches!(
            AppState::new(config).await,
            Err(AppError::InvalidConfig(_))
        ));
    }

    #[tokio::test]
    async fn test_non_http_base_url_rejected() {
        let mut config = Config {
            store: StoreBackend::Memory,
            ..Config::default()
        };
        config.semantic_scholar_url = "ftp://papers.example".to_string();
        assert!(matches!(
            AppState::new(config).await,
            Err(AppError::InvalidConfig(_))
        ));
    }
}
