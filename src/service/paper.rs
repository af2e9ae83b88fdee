//! Paper service façade
//!
//! [`PaperService`] owns the component graph behind the HTTP API and folds
//! every component error into one request-level taxonomy. Messages carried by
//! [`PaperServiceError`] are safe to return to clients.

use std::sync::Arc;

use futures::stream::BoxStream;

use crate::model::api::{CitationSuggestion, VerifyClaimParams};
use crate::model::{Config, PageText, StreamEvent, Verification};
use crate::service::credential::{Credential, CredentialError, CredentialValidator};
use crate::service::document::{DocumentError, DocumentTextExtractor};
use crate::service::jobs::{JobError, JobRegistry};
use crate::service::ledger::{ClaimLedger, LedgerError};
use crate::service::pages::{PageArchive, PageArchiveError};
use crate::service::reasoner::ClaimReasoner;
use crate::service::scorer::SemanticScorer;
use crate::service::stream::{EXPIRED_MESSAGE, StreamCoordinator, StreamError};
use crate::service::suggestions::{SuggestionClient, SuggestionError};
use crate::service::verification::{VerificationCoordinator, VerificationError, VerifyRequest};
use crate::store::{EphemeralStore, StoreError};

const CLAIM_NOT_FOUND_MESSAGE: &str = "Unknown claimId";
const STORAGE_MESSAGE: &str = "Job storage is unavailable";

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum PaperServiceError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    InvalidInput(String),

    #[error("API key was rejected by the provider")]
    InvalidCredential,

    #[error("{0}")]
    Upstream(String),

    #[error("{0}")]
    StorageUnavailable(String),

    #[error("{0}")]
    Internal(String),
}

impl From<StoreError> for PaperServiceError {
    fn from(e: StoreError) -> Self {
        tracing::error!(error = %e, "Store request failed");
        PaperServiceError::StorageUnavailable(STORAGE_MESSAGE.to_string())
    }
}

impl From<JobError> for PaperServiceError {
    fn from(e: JobError) -> Self {
        match e {
            JobError::NotFound(_) => PaperServiceError::NotFound(EXPIRED_MESSAGE.to_string()),
            JobError::Storage(e) => e.into(),
            JobError::Contention(attempts) => {
                tracing::error!(attempts, "Job record update kept conflicting");
                PaperServiceError::StorageUnavailable(STORAGE_MESSAGE.to_string())
            }
            other => {
                tracing::error!(error = %other, "Job registry failure");
                PaperServiceError::Internal("Job state is inconsistent".to_string())
            }
        }
    }
}

impl From<LedgerError> for PaperServiceError {
    fn from(e: LedgerError) -> Self {
        match e {
            LedgerError::ClaimNotFound(_) => {
                PaperServiceError::NotFound(CLAIM_NOT_FOUND_MESSAGE.to_string())
            }
            LedgerError::InvalidClaimId => {
                PaperServiceError::InvalidInput("claimId must look like c<number>".to_string())
            }
            LedgerError::Storage(e) => e.into(),
            LedgerError::Serialization(msg) => {
                tracing::error!(error = %msg, "Malformed claim record");
                PaperServiceError::Internal("Claim state is inconsistent".to_string())
            }
        }
    }
}

impl From<PageArchiveError> for PaperServiceError {
    fn from(e: PageArchiveError) -> Self {
        match e {
            PageArchiveError::NotFound(_) => PaperServiceError::NotFound(EXPIRED_MESSAGE.to_string()),
            PageArchiveError::Storage(e) => e.into(),
            PageArchiveError::Serialization(msg) => {
                tracing::error!(error = %msg, "Malformed page archive");
                PaperServiceError::Internal("Document state is inconsistent".to_string())
            }
        }
    }
}

impl From<DocumentError> for PaperServiceError {
    fn from(e: DocumentError) -> Self {
        let message = match e {
            DocumentError::Empty => "Document is empty",
            DocumentError::NoPages => "Document has no pages",
            DocumentError::Pdf(_) => "PDF could not be read",
            DocumentError::Unsupported => "Unsupported document format",
        };
        PaperServiceError::InvalidInput(message.to_string())
    }
}

impl From<StreamError> for PaperServiceError {
    fn from(e: StreamError) -> Self {
        match e {
            StreamError::Job(e) => e.into(),
            StreamError::Ledger(e) => e.into(),
            StreamError::Pages(e) => e.into(),
            StreamError::Reasoner(_) => {
                PaperServiceError::Upstream("Reasoning provider request failed".to_string())
            }
        }
    }
}

impl From<VerificationError> for PaperServiceError {
    fn from(e: VerificationError) -> Self {
        match e {
            VerificationError::Job(e) => e.into(),
            VerificationError::Ledger(e) => e.into(),
            VerificationError::SourceUnreadable(_) => {
                PaperServiceError::InvalidInput("Cited document could not be read".to_string())
            }
            VerificationError::ReasonerFailed(_) => PaperServiceError::Upstream(
                "Verification failed: the reasoning provider returned an error".to_string(),
            ),
            VerificationError::Internal(msg) => {
                tracing::error!(error = %msg, "Verification task failed");
                PaperServiceError::Internal("Verification failed".to_string())
            }
        }
    }
}

impl From<CredentialError> for PaperServiceError {
    fn from(e: CredentialError) -> Self {
        match e {
            CredentialError::Missing => PaperServiceError::InvalidInput("API key is required".to_string()),
            CredentialError::Invalid => PaperServiceError::InvalidCredential,
            CredentialError::ProviderUnreachable(reason) => {
                tracing::warn!(reason = %reason, "Reasoning provider unreachable");
                PaperServiceError::Upstream("Reasoning provider unreachable".to_string())
            }
        }
    }
}

impl From<SuggestionError> for PaperServiceError {
    fn from(e: SuggestionError) -> Self {
        match e {
            SuggestionError::EmptyQuery => {
                PaperServiceError::InvalidInput("claimText is required".to_string())
            }
            // Request errors may echo the query URL, which holds claim text
            SuggestionError::HttpError(e) => {
                tracing::warn!(timeout = e.is_timeout(), status = ?e.status(), "Citation search request failed");
                PaperServiceError::Upstream("Citation search failed".to_string())
            }
            SuggestionError::UnexpectedStatus(status) => {
                tracing::warn!(status = %status, "Citation search rejected the request");
                PaperServiceError::Upstream("Citation search failed".to_string())
            }
        }
    }
}

/// External collaborators of [`PaperService`]
pub struct Collaborators {
    pub extractor: Arc<dyn DocumentTextExtractor>,
    pub scorer: Arc<dyn SemanticScorer>,
    pub reasoner: Arc<dyn ClaimReasoner>,
    pub credentials: CredentialValidator,
    pub suggestions: SuggestionClient,
}

/// Entry point for every request the API serves
pub struct PaperService {
    store: Arc<dyn EphemeralStore>,
    jobs: JobRegistry,
    pages: PageArchive,
    extractor: Arc<dyn DocumentTextExtractor>,
    streams: StreamCoordinator,
    verifier: VerificationCoordinator,
    credentials: CredentialValidator,
    suggestions: SuggestionClient,
}

impl PaperService {
    pub fn new(store: Arc<dyn EphemeralStore>, collaborators: Collaborators, config: &Config) -> Self {
        let jobs = JobRegistry::new(store.clone(), config.ttl);
        let ledger = ClaimLedger::new(store.clone(), config.ttl);
        let pages = PageArchive::new(store.clone(), config.ttl);

        let streams = StreamCoordinator::new(
            jobs.clone(),
            ledger.clone(),
            pages.clone(),
            collaborators.reasoner.clone(),
            config.extraction.clone(),
        );
        let verifier = VerificationCoordinator::new(
            jobs.clone(),
            ledger,
            collaborators.extractor.clone(),
            collaborators.scorer,
            collaborators.reasoner,
            config.verification.clone(),
        );

        Self {
            store,
            jobs,
            pages,
            extractor: collaborators.extractor,
            streams,
            verifier,
            credentials: collaborators.credentials,
            suggestions: collaborators.suggestions,
        }
    }

    /// Check an API key against the reasoning provider
    pub async fn validate_credential(&self, api_key: &str) -> Result<(), PaperServiceError> {
        let credential = Credential::new(api_key)?;
        self.credentials.validate(&credential).await?;
        tracing::info!("API key accepted by provider");
        Ok(())
    }

    /// Read a document into pages and open a job for it
    pub async fn upload(&self, document: Vec<u8>) -> Result<String, PaperServiceError> {
        let size = document.len();
        let pages = self.extract_pages(document).await?;

        let job = self.jobs.create_job(pages.len() as u64).await?;
        self.pages.save(&job.job_id, &pages).await?;

        tracing::info!(job_id = %job.job_id, bytes = size, pages = pages.len(), "Paper uploaded");
        Ok(job.job_id)
    }

    /// Event stream of a job's claims; unknown jobs fail before any event
    pub async fn stream_claims(
        &self,
        job_id: &str,
        api_key: &str,
    ) -> Result<BoxStream<'static, StreamEvent>, PaperServiceError> {
        let credential = Credential::new(api_key)?;
        let events = self.streams.open(job_id, credential).await?;
        tracing::debug!(job_id = %job_id, "Claim stream opened");
        Ok(events)
    }

    /// Judge one claim against its cited document
    pub async fn verify_claim(
        &self,
        params: VerifyClaimParams,
        cited_document: Vec<u8>,
        api_key: &str,
    ) -> Result<Verification, PaperServiceError> {
        let credential = Credential::new(api_key)?;
        let request = VerifyRequest {
            job_id: params.job_id,
            claim_id: params.claim_id,
            source_name: params.source_name,
            cited_document,
        };
        Ok(self.verifier.verify(request, &credential).await?)
    }

    pub async fn suggest_citations(
        &self,
        claim_text: &str,
        limit: Option<u32>,
    ) -> Result<Vec<CitationSuggestion>, PaperServiceError> {
        Ok(self.suggestions.suggest(claim_text, limit).await?)
    }

    /// Whether the store answers
    pub async fn ping(&self) -> Result<(), StoreError> {
        self.store.ping().await
    }

    async fn extract_pages(&self, document: Vec<u8>) -> Result<Vec<PageText>, PaperServiceError> {
        let extractor = self.extractor.clone();
        let pages = tokio::task::spawn_blocking(move || extractor.extract_pages(&document))
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Document extraction task failed");
                PaperServiceError::Internal("Document extraction failed".to_string())
            })??;
        Ok(pages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    use crate::model::extraction::ExtractedCitationStatus::{Cited, Uncited};
    use crate::model::Verdict;
    use crate::service::document::PdfTextExtractor;
    use crate::service::scorer::LexicalScorer;
    use crate::service::testing::{ScriptedReasoner, TTL, document, extracted};
    use crate::store::MemoryStore;

    const UNREACHABLE: &str = "http://127.0.0.1:9";

    fn service(reasoner: ScriptedReasoner) -> PaperService {
        let config = Config {
            ttl: TTL,
            ..Config::default()
        };
        let collaborators = Collaborators {
            extractor: Arc::new(PdfTextExtractor),
            scorer: Arc::new(LexicalScorer),
            reasoner: Arc::new(reasoner),
            credentials: CredentialValidator::new(UNREACHABLE),
            suggestions: SuggestionClient::new(format!("{UNREACHABLE}/search")),
        };
        PaperService::new(Arc::new(MemoryStore::new()), collaborators, &config)
    }

    fn claims(events: &[StreamEvent]) -> Vec<&crate::model::Claim> {
        events
            .iter()
            .filter_map(|event| match event {
                StreamEvent::Claim(claim) => Some(claim),
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn test_upload_stream_verify_replay() {
        let svc = service(
            ScriptedReasoner::new()
                .with_page(1, vec![extracted("Coffee intake raises alertness [4].", Cited)])
                .with_page(2, vec![extracted("Bees navigate by polarized light.", Uncited)]),
        );
        let job_id = svc
            .upload(document(&[
                "Coffee intake raises alertness [4].",
                "Bees navigate by polarized light.",
            ]))
            .await
            .unwrap();

        let events: Vec<StreamEvent> = svc.stream_claims(&job_id, "sk-test").await.unwrap().collect().await;
        assert_eq!(claims(&events).len(), 2);
        assert_eq!(events.last(), Some(&StreamEvent::done()));

        let params = VerifyClaimParams {
            job_id: job_id.clone(),
            claim_id: "c1".to_string(),
            source_name: Some("Bee Vision".to_string()),
        };
        let cited = document(&["Honey bees navigate using polarized light patterns in the sky."]);
        let verification = svc.verify_claim(params, cited, "sk-test").await.unwrap();
        assert_eq!(verification.verdict, Verdict::Supported);
        assert!(!verification.evidence.is_empty());

        // The extraction run finishes its bookkeeping after the terminal event
        let mut replay = Vec::new();
        for _ in 0..100 {
            replay = svc.stream_claims(&job_id, "sk-test").await.unwrap().collect().await;
            if replay.last() == Some(&StreamEvent::done()) && claims(&replay).len() == 2 {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
        let replayed = claims(&replay);
        assert!(replayed[0].verification.is_none());
        assert_eq!(replayed[1].verification.as_ref(), Some(&verification));
    }

    #[tokio::test]
    async fn test_unknown_job_is_not_found() {
        let svc = service(ScriptedReasoner::new());

        let err = svc.stream_claims("missing", "sk-test").await.err().unwrap();
        assert!(matches!(err, PaperServiceError::NotFound(ref m) if m == EXPIRED_MESSAGE));

        let params = VerifyClaimParams {
            job_id: "missing".to_string(),
            claim_id: "c0".to_string(),
            source_name: None,
        };
        let err = svc.verify_claim(params, document(&["text"]), "sk-test").await.unwrap_err();
        assert!(matches!(err, PaperServiceError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_unreadable_upload_creates_no_job() {
        let svc = service(ScriptedReasoner::new());

        let err = svc.upload(Vec::new()).await.unwrap_err();
        assert!(matches!(err, PaperServiceError::InvalidInput(_)));

        let err = svc.upload(b"%PDF-1.7 truncated".to_vec()).await.unwrap_err();
        assert!(matches!(err, PaperServiceError::InvalidInput(ref m) if m == "PDF could not be read"));
    }

    #[tokio::test]
    async fn test_bad_claim_ids() {
        let svc = service(ScriptedReasoner::new());
        let job_id = svc.upload(document(&["A page without claims."])).await.unwrap();

        let verify = |claim_id: &str| VerifyClaimParams {
            job_id: job_id.clone(),
            claim_id: claim_id.to_string(),
            source_name: None,
        };
        let err = svc.verify_claim(verify("first"), document(&["x"]), "sk-test").await.unwrap_err();
        assert!(matches!(err, PaperServiceError::InvalidInput(_)));

        let err = svc.verify_claim(verify("c7"), document(&["x"]), "sk-test").await.unwrap_err();
        assert!(matches!(err, PaperServiceError::NotFound(ref m) if m == CLAIM_NOT_FOUND_MESSAGE));
    }

    #[tokio::test]
    async fn test_blank_api_key_is_invalid_input() {
        let svc = service(ScriptedReasoner::new());
        let job_id = svc.upload(document(&["Some text."])).await.unwrap();

        assert!(matches!(
            svc.stream_claims(&job_id, "  ").await.err().unwrap(),
            PaperServiceError::InvalidInput(_)
        ));
        assert!(matches!(
            svc.validate_credential("").await.unwrap_err(),
            PaperServiceError::InvalidInput(_)
        ));
    }

    #[tokio::test]
    async fn test_unreachable_provider_is_upstream_failure() {
        let svc = service(ScriptedReasoner::new());
        assert!(matches!(
            svc.validate_credential("sk-test").await.unwrap_err(),
            PaperServiceError::Upstream(_)
        ));
        assert!(matches!(
            svc.suggest_citations("sleep improves memory", None).await.unwrap_err(),
            PaperServiceError::Upstream(ref m) if !m.contains("sleep")
        ));
    }

    #[test]
    fn test_messages_hide_ids_and_causes() {
        let err: PaperServiceError = JobError::NotFound("job-123".to_string()).into();
        assert_eq!(err.to_string(), EXPIRED_MESSAGE);

        let err: PaperServiceError = DocumentError::Pdf("xref table at byte 88".to_string()).into();
        assert!(!err.to_string().contains("xref"));

        let err: PaperServiceError = StoreError::Unavailable("redis://:hunter2@cache".to_string()).into();
        assert!(matches!(err, PaperServiceError::StorageUnavailable(ref m) if !m.contains("hunter2")));
    }
}
