//! LLM-extractable models for claim extraction and verification

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Claims found on one page
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ExtractedClaims {
    pub claims: Vec<ExtractedClaim>,
}

/// A single extracted claim
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ExtractedClaim {
    /// Verbatim sentence from the page, citation markers included
    pub text: String,
    pub status: ExtractedCitationStatus,
    /// Why attribution is ambiguous; only for weakly cited claims
    #[serde(default)]
    pub weak_reason: Option<String>,
}

/// Citation status suggested by the model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ExtractedCitationStatus {
    Cited,
    WeaklyCited,
    Uncited,
}

/// Verdict produced by the model for one claim
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ExtractedVerdict {
    pub verdict: ExtractedVerdictKind,
    /// Confidence between 0.0 and 1.0
    pub confidence: f64,
    /// Short markdown explanation
    pub reasoning: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ExtractedVerdictKind {
    Supported,
    PartiallySupported,
    Unsupported,
    Inconclusive,
}
