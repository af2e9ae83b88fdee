//! Request and response bodies of the HTTP API

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::model::claim::{Evidence, Verdict, Verification};

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ValidateKeyRequest {
    pub api_key: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ValidateKeyResponse {
    pub ok: bool,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UploadPaperResponse {
    pub job_id: String,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StreamClaimsRequest {
    pub job_id: String,
    pub api_key: String,
}

/// Query parameters identifying the claim to verify
#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
pub struct VerifyClaimParams {
    pub job_id: String,
    pub claim_id: String,
    /// Display name of the cited document, echoed into evidence items
    pub source_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VerifyClaimResponse {
    pub claim_id: String,
    pub verdict: Verdict,
    pub confidence: f64,
    pub reasoning: String,
    pub evidence: Vec<Evidence>,
}

impl VerifyClaimResponse {
    pub fn new(claim_id: impl Into<String>, verification: Verification) -> Self {
        Self {
            claim_id: claim_id.into(),
            verdict: verification.verdict,
            confidence: verification.confidence,
            reasoning: verification.reasoning,
            evidence: verification.evidence,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SuggestCitationsRequest {
    pub claim_text: String,
    pub limit: Option<u32>,
}

/// A candidate source for an uncited claim
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct CitationSuggestion {
    pub title: Option<String>,
    /// First three author names, comma separated
    pub authors: String,
    pub year: Option<i32>,
    pub url: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SuggestCitationsResponse {
    pub suggestions: Vec<CitationSuggestion>,
}
