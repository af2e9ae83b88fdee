//! Claim reasoning collaborator
//!
//! [`ClaimReasoner`] is the seam to the language model: it finds claims on a
//! page and judges a claim against excerpts of its cited source. The LLM
//! implementation uses rig structured extraction with deterministic sampling.

use async_trait::async_trait;

use crate::model::PageText;
use crate::model::extraction::{ExtractedClaim, ExtractedClaims, ExtractedVerdict};
use crate::service::claims::prompts::{EXTRACTION_SYSTEM_PROMPT, build_extraction_prompt};
use crate::service::credential::Credential;
use crate::service::llm::LlmClient;
use crate::service::verification::prompts::{
    VERIFICATION_SYSTEM_PROMPT, build_verification_prompt,
};

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ReasonerError {
    #[error("LLM client unavailable: {0}")]
    Client(String),

    #[error("LLM extraction failed: {0}")]
    ExtractionFailed(String),
}

impl ReasonerError {
    /// Failure class for logs; provider error text may echo prompt content
    pub fn kind(&self) -> &'static str {
        match self {
            ReasonerError::Client(_) => "client",
            ReasonerError::ExtractionFailed(_) => "provider",
        }
    }
}

#[async_trait]
pub trait ClaimReasoner: Send + Sync {
    /// Claims stated on one page, in reading order
    async fn extract_claims(
        &self,
        credential: &Credential,
        page: &PageText,
    ) -> Result<Vec<ExtractedClaim>, ReasonerError>;

    /// Verdict for a claim given excerpts of the cited document
    async fn judge(
        &self,
        credential: &Credential,
        claim_text: &str,
        excerpts: &[String],
    ) -> Result<ExtractedVerdict, ReasonerError>;
}

/// OpenAI-backed reasoner
pub struct LlmReasoner {
    extraction_model: String,
    verification_model: String,
    max_page_chars: usize,
}

impl LlmReasoner {
    pub fn new(
        extraction_model: impl Into<String>,
        verification_model: impl Into<String>,
        max_page_chars: usize,
    ) -> Self {
        let extraction_model = extraction_model.into();
        let verification_model = verification_model.into();
        tracing::info!(
            extraction_model = %extraction_model,
            verification_model = %verification_model,
            "Claim reasoner initialized"
        );
        Self {
            extraction_model,
            verification_model,
            max_page_chars,
        }
    }
}

#[async_trait]
impl ClaimReasoner for LlmReasoner {
    async fn extract_claims(
        &self,
        credential: &Credential,
        page: &PageText,
    ) -> Result<Vec<ExtractedClaim>, ReasonerError> {
        let llm_client = LlmClient::new(credential).map_err(ReasonerError::Client)?;
        let prompt = build_extraction_prompt(page, self.max_page_chars);
        let start_time = std::time::Instant::now();

        // temperature=0.0 and a fixed seed keep outputs reproducible
        let extractor = llm_client
            .openai_client()
            .extractor::<ExtractedClaims>(&self.extraction_model)
            .preamble(EXTRACTION_SYSTEM_PROMPT)
            .additional_params(serde_json::json!({
                "temperature": 0.0,
                "seed": 42
            }))
            .build();

        match extractor.extract(&prompt).await {
            Ok(result) => {
                tracing::info!(
                    page = page.number,
                    model = %self.extraction_model,
                    elapsed_ms = start_time.elapsed().as_millis(),
                    claims_extracted = result.claims.len(),
                    prompt_length = prompt.len(),
                    "OpenAI claim extraction completed"
                );
                Ok(result.claims)
            }
            Err(e) => {
                let err = ReasonerError::ExtractionFailed(e.to_string());
                tracing::error!(
                    page = page.number,
                    model = %self.extraction_model,
                    elapsed_ms = start_time.elapsed().as_millis(),
                    error_kind = err.kind(),
                    "OpenAI claim extraction failed"
                );
                Err(err)
            }
        }
    }

    async fn judge(
        &self,
        credential: &Credential,
        claim_text: &str,
        excerpts: &[String],
    ) -> Result<ExtractedVerdict, ReasonerError> {
        let llm_client = LlmClient::new(credential).map_err(ReasonerError::Client)?;
        let prompt = build_verification_prompt(claim_text, excerpts);
        let start_time = std::time::Instant::now();

        let extractor = llm_client
            .openai_client()
            .extractor::<ExtractedVerdict>(&self.verification_model)
            .preamble(VERIFICATION_SYSTEM_PROMPT)
            .additional_params(serde_json::json!({
                "temperature": 0.0,
                "seed": 42
            }))
            .build();

        match extractor.extract(&prompt).await {
            Ok(verdict) => {
                tracing::info!(
                    model = %self.verification_model,
                    elapsed_ms = start_time.elapsed().as_millis(),
                    excerpts = excerpts.len(),
                    verdict = ?verdict.verdict,
                    "OpenAI claim verification completed"
                );
                Ok(verdict)
            }
            Err(e) => {
                let err = ReasonerError::ExtractionFailed(e.to_string());
                tracing::error!(
                    model = %self.verification_model,
                    elapsed_ms = start_time.elapsed().as_millis(),
                    error_kind = err.kind(),
                    "OpenAI claim verification failed"
                );
                Err(err)
            }
        }
    }
}
