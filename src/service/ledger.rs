//! Claim ledger
//!
//! Append-only, ordered record of the claims emitted for a job. A claim's
//! position in the store list is its `sequence`, and its id is derived from
//! that position, so the two can never disagree.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::model::claim::{claim_id_for, sequence_from_claim_id};
use crate::model::{CitationStatus, Claim, ClaimDraft, Verification};
use crate::store::{EphemeralStore, JobKeys, StoreError};

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum LedgerError {
    #[error("Claim not found: {0}")]
    ClaimNotFound(String),

    #[error("Malformed claim id")]
    InvalidClaimId,

    #[error("Malformed claim record: {0}")]
    Serialization(String),

    #[error(transparent)]
    Storage(#[from] StoreError),
}

/// Stored form of a claim; id and sequence come from the list position
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ClaimRecord {
    text: String,
    citation_status: CitationStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    weak_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    verification: Option<Verification>,
}

impl ClaimRecord {
    fn from_draft(draft: ClaimDraft) -> Self {
        Self {
            text: draft.text,
            citation_status: draft.citation_status,
            weak_reason: draft.weak_reason,
            verification: None,
        }
    }

    fn into_claim(self, sequence: u64) -> Claim {
        Claim {
            claim_id: claim_id_for(sequence),
            sequence,
            text: self.text,
            citation_status: self.citation_status,
            weak_reason: self.weak_reason,
            verification: self.verification,
        }
    }

    fn encode(&self) -> Result<Vec<u8>, LedgerError> {
        serde_json::to_vec(self).map_err(|e| LedgerError::Serialization(e.to_string()))
    }

    fn decode(raw: &[u8]) -> Result<Self, LedgerError> {
        serde_json::from_slice(raw).map_err(|e| LedgerError::Serialization(e.to_string()))
    }
}

/// Ordered, replayable claim buffer per job
#[derive(Clone)]
pub struct ClaimLedger {
    store: Arc<dyn EphemeralStore>,
    ttl: Duration,
}

impl ClaimLedger {
    pub fn new(store: Arc<dyn EphemeralStore>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    /// Append a claim and return it with its assigned sequence
    ///
    /// Only the single active extraction run of a job appends.
    pub async fn append_claim(&self, job_id: &str, draft: ClaimDraft) -> Result<Claim, LedgerError> {
        let keys = JobKeys::new(job_id);
        let record = ClaimRecord::from_draft(draft);

        let length = self
            .store
            .append_atomic(&keys.claims, &record.encode()?, self.ttl)
            .await?;
        self.store.refresh_ttl(&keys.all(), self.ttl).await?;

        let sequence = length.saturating_sub(1);
        tracing::debug!(job_id = %job_id, sequence = sequence, "Claim appended");
        Ok(record.into_claim(sequence))
    }

    /// All claims of a job in sequence order
    pub async fn replay(&self, job_id: &str) -> Result<Vec<Claim>, LedgerError> {
        self.replay_from(job_id, 0).await
    }

    /// Claims with `sequence >= start`, in order
    pub async fn replay_from(&self, job_id: &str, start: u64) -> Result<Vec<Claim>, LedgerError> {
        let keys = JobKeys::new(job_id);
        let items = self.store.range(&keys.claims, start).await?;

        items
            .iter()
            .zip(start..)
            .map(|(raw, sequence)| Ok(ClaimRecord::decode(raw)?.into_claim(sequence)))
            .collect()
    }

    /// Look up one claim by id
    pub async fn get_claim(&self, job_id: &str, claim_id: &str) -> Result<Claim, LedgerError> {
        let sequence = sequence_from_claim_id(claim_id).ok_or(LedgerError::InvalidClaimId)?;
        let record = self.record(job_id, claim_id, sequence).await?;
        Ok(record.into_claim(sequence))
    }

    /// Attach a verification to a claim, overwriting any previous one
    ///
    /// Text, citation status and sequence are left untouched. Concurrent
    /// merges for the same claim resolve to the last writer.
    pub async fn merge_verification(
        &self,
        job_id: &str,
        claim_id: &str,
        verification: Verification,
    ) -> Result<Claim, LedgerError> {
        let sequence = sequence_from_claim_id(claim_id).ok_or(LedgerError::InvalidClaimId)?;
        let keys = JobKeys::new(job_id);

        let mut record = self.record(job_id, claim_id, sequence).await?;
        let replaced = record.verification.is_some();
        record.verification = Some(verification);

        let written = self
            .store
            .set_item(&keys.claims, sequence, &record.encode()?, self.ttl)
            .await?;
        if !written {
            return Err(LedgerError::ClaimNotFound(claim_id.to_string()));
        }
        self.store.refresh_ttl(&keys.all(), self.ttl).await?;

        tracing::info!(
            job_id = %job_id,
            claim_id = %claim_id,
            replaced = replaced,
            "Verification merged"
        );
        Ok(record.into_claim(sequence))
    }

    async fn record(
        &self,
        job_id: &str,
        claim_id: &str,
        sequence: u64,
    ) -> Result<ClaimRecord, LedgerError> {
        let keys = JobKeys::new(job_id);
        let raw = self
            .store
            .item(&keys.claims, sequence)
            .await?
            .ok_or_else(|| LedgerError::ClaimNotFound(claim_id.to_string()))?;
        ClaimRecord::decode(&raw)
    }
}
