//! Validation logic for LLM-extracted claims
//!
//! Ensures that extracted claims are grounded in the page they came from.
//! Messages never quote claim or page text.

use crate::model::extraction::{ExtractedCitationStatus, ExtractedClaim};

/// Minimum share of claim words that must appear on the page, in order
const WORD_SUBSEQUENCE_RATIO: f32 = 0.70;

/// Claims longer than this usually merge several sentences
const MAX_CLAIM_CHARS: usize = 600;

/// Result of claim validation
#[derive(Debug, Default)]
pub struct ClaimValidationResult {
    /// Claims that passed, in their original order
    pub accepted: Vec<ExtractedClaim>,
    /// Why claims were dropped
    pub rejected: Vec<String>,
    /// Quality issues on accepted claims
    pub warnings: Vec<String>,
}

/// Validate extracted claims against the page text
///
/// Checks:
/// 1. Claim text is present
/// 2. Claim text is found on the page (whitespace-normalized, or 70% of its words in order)
/// 3. Claim text is a single sentence in length
/// 4. `weak_reason` only accompanies weakly cited claims
pub fn validate_extracted_claims(
    claims: Vec<ExtractedClaim>,
    page_text: &str,
) -> ClaimValidationResult {
    let mut result = ClaimValidationResult::default();
    let normalized_page = normalize_whitespace(page_text);

    for (i, claim) in claims.into_iter().enumerate() {
        let text = claim.text.trim();
        if text.is_empty() {
            result.rejected.push(format!("Claim {} has empty text", i + 1));
            continue;
        }

        let grounded = normalized_page.contains(&normalize_whitespace(text))
            || words_in_order_present(text, page_text, WORD_SUBSEQUENCE_RATIO);
        if !grounded {
            result
                .rejected
                .push(format!("Claim {} text not found on page", i + 1));
            continue;
        }

        if text.chars().count() > MAX_CLAIM_CHARS {
            result.warnings.push(format!(
                "Claim {} is very long (> {} chars), may span several sentences",
                i + 1,
                MAX_CLAIM_CHARS
            ));
        }

        if claim.weak_reason.is_some() && claim.status != ExtractedCitationStatus::WeaklyCited {
            result.warnings.push(format!(
                "Claim {} has a weak reason but is not weakly cited",
                i + 1
            ));
        }

        result.accepted.push(claim);
    }

    result
}

/// Normalize whitespace for comparison (collapse runs, trim)
fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Normalize a word for comparison (lowercase, strip leading/trailing punctuation)
fn normalize_word(w: &str) -> String {
    w.trim_matches(|c: char| c.is_ascii_punctuation())
        .to_lowercase()
}

/// Whether at least `min_ratio` of excerpt words appear in the document in order
///
/// Tolerates hyphenation and punctuation differences introduced by PDF text
/// extraction or the model.
fn words_in_order_present(excerpt: &str, document: &str, min_ratio: f32) -> bool {
    let excerpt_words: Vec<String> = excerpt
        .split_whitespace()
        .map(normalize_word)
        .filter(|w| !w.is_empty())
        .collect();
    if excerpt_words.is_empty() {
        return false;
    }

    let doc_words: Vec<String> = document
        .split_whitespace()
        .map(normalize_word)
        .filter(|w| !w.is_empty())
        .collect();

    // A word missing from the page is skipped without consuming page words
    let mut doc_idx = 0;
    let mut matched = 0;
    for ew in &excerpt_words {
        if let Some(offset) = doc_words[doc_idx..].iter().position(|dw| dw == ew) {
            matched += 1;
            doc_idx += offset + 1;
        }
    }

    let ratio = matched as f32 / excerpt_words.len() as f32;
    ratio >= min_ratio
}
