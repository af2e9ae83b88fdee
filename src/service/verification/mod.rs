//! Claim verification
//!
//! Checks one claim against the document it cites: the cited document is
//! split into page-aware chunks, the chunks closest to the claim are handed to
//! the reasoner, and the normalised verdict is merged into the ledger. Either a
//! complete verification is merged or nothing is.

use std::sync::Arc;

use crate::model::extraction::{ExtractedVerdict, ExtractedVerdictKind};
use crate::model::{Evidence, Verdict, Verification, VerificationConfig};
use crate::service::credential::Credential;
use crate::service::document::{DocumentError, DocumentTextExtractor};
use crate::service::jobs::{JobError, JobRegistry};
use crate::service::ledger::{ClaimLedger, LedgerError};
use crate::service::reasoner::{ClaimReasoner, ReasonerError};
use crate::service::scorer::SemanticScorer;

pub mod chunking;
pub mod prompts;

use chunking::{Chunk, chunk_pages, clip_words};

const DEFAULT_REASONING: &str = "Automated verification result.";

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum VerificationError {
    #[error(transparent)]
    Job(#[from] JobError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error("Verification failed: cited document unreadable: {0}")]
    SourceUnreadable(#[source] DocumentError),

    #[error("Verification failed: {0}")]
    ReasonerFailed(#[source] ReasonerError),

    #[error("Verification failed: {0}")]
    Internal(String),
}

/// One claim check
#[derive(Debug, Clone)]
pub struct VerifyRequest {
    pub job_id: String,
    pub claim_id: String,
    /// Display name of the cited document, echoed into evidence
    pub source_name: Option<String>,
    pub cited_document: Vec<u8>,
}

pub struct VerificationCoordinator {
    jobs: JobRegistry,
    ledger: ClaimLedger,
    extractor: Arc<dyn DocumentTextExtractor>,
    scorer: Arc<dyn SemanticScorer>,
    reasoner: Arc<dyn ClaimReasoner>,
    config: VerificationConfig,
}

impl VerificationCoordinator {
    pub fn new(
        jobs: JobRegistry,
        ledger: ClaimLedger,
        extractor: Arc<dyn DocumentTextExtractor>,
        scorer: Arc<dyn SemanticScorer>,
        reasoner: Arc<dyn ClaimReasoner>,
        config: VerificationConfig,
    ) -> Self {
        Self {
            jobs,
            ledger,
            extractor,
            scorer,
            reasoner,
            config,
        }
    }

    /// Verify a claim and merge the result; re-verifying overwrites
    pub async fn verify(
        &self,
        request: VerifyRequest,
        credential: &Credential,
    ) -> Result<Verification, VerificationError> {
        let VerifyRequest {
            job_id,
            claim_id,
            source_name,
            cited_document,
        } = request;

        self.jobs.touch(&job_id).await?;
        let claim = self.ledger.get_claim(&job_id, &claim_id).await?;
        let start_time = std::time::Instant::now();

        let selected = self.select_evidence(claim.text.clone(), cited_document).await?;
        let excerpts: Vec<String> = selected
            .iter()
            .map(|chunk| prompts::pack_excerpt(chunk.page, &chunk.text))
            .collect();

        let verdict = self
            .reasoner
            .judge(credential, &claim.text, &excerpts)
            .await
            .map_err(VerificationError::ReasonerFailed)?;

        let evidence = selected
            .iter()
            .map(|chunk| Evidence {
                paper_title: source_name.clone(),
                page: Some(chunk.page),
                paragraph: Some(chunk.paragraph),
                excerpt: clip_words(&chunk.text, self.config.excerpt_words),
            })
            .collect();
        let verification = normalize_verdict(verdict, evidence);

        self.ledger
            .merge_verification(&job_id, &claim_id, verification.clone())
            .await?;
        self.jobs.touch(&job_id).await?;

        tracing::info!(
            job_id = %job_id,
            claim_id = %claim_id,
            verdict = ?verification.verdict,
            evidence = verification.evidence.len(),
            elapsed_ms = start_time.elapsed().as_millis(),
            "Claim verified"
        );
        Ok(verification)
    }

    /// Extract, chunk and rank the cited document off the async runtime
    async fn select_evidence(
        &self,
        claim_text: String,
        cited_document: Vec<u8>,
    ) -> Result<Vec<Chunk>, VerificationError> {
        let extractor = self.extractor.clone();
        let scorer = self.scorer.clone();
        let config = self.config.clone();

        tokio::task::spawn_blocking(move || {
            let pages = extractor
                .extract_pages(&cited_document)
                .map_err(VerificationError::SourceUnreadable)?;
            let chunks = chunk_pages(&pages, config.chunk_chars);
            let total = chunks.len();
            let selected = rank_chunks(
                scorer.as_ref(),
                &claim_text,
                chunks,
                config.top_k,
                config.min_similarity,
            );

            tracing::debug!(
                pages = pages.len(),
                chunks = total,
                selected = selected.len(),
                "Evidence selected"
            );
            Ok(selected)
        })
        .await
        .map_err(|e| VerificationError::Internal(e.to_string()))?
    }
}

/// The `top_k` (at least one) chunks most similar to the claim, best first
fn rank_chunks(
    scorer: &dyn SemanticScorer,
    claim_text: &str,
    chunks: Vec<Chunk>,
    top_k: usize,
    min_similarity: f32,
) -> Vec<Chunk> {
    let mut scored: Vec<(f32, Chunk)> = chunks
        .into_iter()
        .map(|chunk| (scorer.score(claim_text, &chunk.text), chunk))
        .filter(|(score, _)| *score >= min_similarity)
        .collect();

    // Stable sort keeps document order among equal scores
    scored.sort_by(|a, b| b.0.total_cmp(&a.0));
    scored
        .into_iter()
        .take(top_k.max(1))
        .map(|(_, chunk)| chunk)
        .collect()
}

fn normalize_verdict(extracted: ExtractedVerdict, evidence: Vec<Evidence>) -> Verification {
    let verdict = match extracted.verdict {
        ExtractedVerdictKind::Supported => Verdict::Supported,
        ExtractedVerdictKind::Unsupported => Verdict::Unsupported,
        ExtractedVerdictKind::PartiallySupported | ExtractedVerdictKind::Inconclusive => {
            Verdict::Inconclusive
        }
    };

    let confidence = if extracted.confidence.is_finite() {
        extracted.confidence.clamp(0.0, 1.0)
    } else {
        0.5
    };

    let reasoning = match extracted.reasoning.trim() {
        "" => DEFAULT_REASONING.to_string(),
        text => text.to_string(),
    };

    Verification {
        verdict,
        confidence,
        reasoning,
        evidence,
    }
}
