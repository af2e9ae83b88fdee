//! Claims and their verification results

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// How a claim attributes its source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum CitationStatus {
    Cited,
    WeaklyCited,
    Uncited,
}

/// Outcome of checking a claim against its cited source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Supported,
    Unsupported,
    Inconclusive,
}

/// One excerpt of the cited document backing a verdict
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Evidence {
    /// Name of the cited document, when the client supplied one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paper_title: Option<String>,
    /// 1-based page number
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    /// 1-based paragraph group within the page
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paragraph: Option<u32>,
    pub excerpt: String,
}

/// Verdict attached to a claim
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Verification {
    pub verdict: Verdict,
    /// Confidence in [0, 1]
    pub confidence: f64,
    pub reasoning: String,
    pub evidence: Vec<Evidence>,
}

/// A claim before it has been given a ledger position
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimDraft {
    pub text: String,
    pub citation_status: CitationStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weak_reason: Option<String>,
}

/// One extracted factual statement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Claim {
    /// `c{sequence}`, unique within the job
    pub claim_id: String,
    /// Position in the job's ledger, starting at 0
    pub sequence: u64,
    pub text: String,
    pub citation_status: CitationStatus,
    /// Present only for weakly cited claims
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weak_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verification: Option<Verification>,
}

const CLAIM_ID_PREFIX: char = 'c';

/// Identifier of the claim stored at `sequence`
pub fn claim_id_for(sequence: u64) -> String {
    format!("{}{}", CLAIM_ID_PREFIX, sequence)
}

/// Ledger position named by a claim id, or `None` if the id is malformed
pub fn sequence_from_claim_id(claim_id: &str) -> Option<u64> {
    let digits = claim_id.strip_prefix(CLAIM_ID_PREFIX)?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    // Reject leading zeros so every position has exactly one id
    if digits.len() > 1 && digits.starts_with('0') {
        return None;
    }
    digits.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_claim_id_round_trips_sequence() {
        assert_eq!(claim_id_for(0), "c0");
        assert_eq!(sequence_from_claim_id("c0"), Some(0));
        assert_eq!(sequence_from_claim_id(&claim_id_for(41)), Some(41));
    }

    #[test]
    fn test_malformed_claim_ids_are_rejected() {
        for id in ["", "c", "1", "c-1", "c1a", "C1", "c01", "p1_2"] {
            assert_eq!(sequence_from_claim_id(id), None, "{id:?} should be rejected");
        }
    }

    #[test]
    fn test_claim_serializes_camel_case_without_empty_fields() {
        let claim = Claim {
            claim_id: "c0".to_string(),
            sequence: 0,
            text: "Water boils at 100C [1].".to_string(),
            citation_status: CitationStatus::Cited,
            weak_reason: None,
            verification: None,
        };

        let json = serde_json::to_value(&claim).unwrap();
        assert_eq!(json["claimId"], "c0");
        assert_eq!(json["citationStatus"], "cited");
        assert!(json.get("weakReason").is_none());
        assert!(json.get("verification").is_none());
    }
}
