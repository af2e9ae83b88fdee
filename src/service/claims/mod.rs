//! Claim preparation
//!
//! Turns reasoner output for one page into ledger-ready drafts: ungrounded
//! claims are dropped and the citation status is finalised from the claim
//! text itself, with the reasoner's suggestion as a hint.

use std::sync::LazyLock;

use regex::Regex;

use crate::model::extraction::{ExtractedCitationStatus, ExtractedClaim};
use crate::model::{CitationStatus, ClaimDraft, PageText};

pub mod prompts;
pub mod validation;

const REASON_HEDGE: &str = "generic phrase without explicit reference";
const REASON_NO_MARKER: &str = "citation claimed but no inline marker found";
const REASON_IMPLIED: &str = "attribution implied without explicit reference";

/// Numeric markers: [12], [3, 7], [4-6]
static NUMERIC_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[\s*\d+(?:\s*[,;\-–]\s*\d+)*\s*\]").expect("numeric marker pattern")
});

/// Author-year markers: (Smith, 2020), (Smith et al., 2020a), (Smith and Jones 2019)
static PARENTHETICAL_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\(\s*[A-Z][\w'\-]+(?:\s+et\s+al\.?)?(?:\s+(?:and|&)\s+[A-Z][\w'\-]+)?,?\s+(?:19|20)\d{2}[a-z]?\s*(?:[;,][^)]*)?\)",
    )
    .expect("parenthetical marker pattern")
});

/// Narrative markers: Smith (2019), Smith et al. (2019)
static NARRATIVE_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[A-Z][\w'\-]+(?:\s+et\s+al\.?)?\s+\(\s*(?:19|20)\d{2}[a-z]?\s*\)")
        .expect("narrative marker pattern")
});

/// Phrases that attribute without naming a source
const HEDGE_PHRASES: &[&str] = &[
    "previous studies",
    "previous work",
    "prior work",
    "prior studies",
    "earlier studies",
    "earlier work",
    "recent studies",
    "recent work",
    "studies have shown",
    "research has shown",
    "it has been shown",
    "it has been reported",
    "it is well known",
    "has been reported",
    "researchers have",
    "the literature",
];

/// Whether the text carries an explicit inline citation marker
pub fn has_citation_marker(text: &str) -> bool {
    NUMERIC_MARKER.is_match(text)
        || PARENTHETICAL_MARKER.is_match(text)
        || NARRATIVE_MARKER.is_match(text)
}

fn has_hedge_phrase(text: &str) -> bool {
    let lower = text.to_lowercase();
    HEDGE_PHRASES.iter().any(|phrase| lower.contains(phrase))
}

/// Finalise the citation status of one extracted claim
pub fn classify(claim: ExtractedClaim) -> ClaimDraft {
    let text = claim.text.trim().to_string();
    let suggested_reason = claim
        .weak_reason
        .map(|r| r.trim().to_string())
        .filter(|r| !r.is_empty());

    let (citation_status, weak_reason) = if has_citation_marker(&text) {
        (CitationStatus::Cited, None)
    } else if claim.status == ExtractedCitationStatus::WeaklyCited {
        (
            CitationStatus::WeaklyCited,
            Some(suggested_reason.unwrap_or_else(|| REASON_IMPLIED.to_string())),
        )
    } else if has_hedge_phrase(&text) {
        (
            CitationStatus::WeaklyCited,
            Some(suggested_reason.unwrap_or_else(|| REASON_HEDGE.to_string())),
        )
    } else if claim.status == ExtractedCitationStatus::Cited {
        (
            CitationStatus::WeaklyCited,
            Some(REASON_NO_MARKER.to_string()),
        )
    } else {
        (CitationStatus::Uncited, None)
    };

    ClaimDraft {
        text,
        citation_status,
        weak_reason,
    }
}

/// Validate and classify the reasoner's claims for one page, keeping their order
pub fn prepare(page: &PageText, extracted: Vec<ExtractedClaim>) -> Vec<ClaimDraft> {
    let raw_count = extracted.len();
    let result = validation::validate_extracted_claims(extracted, &page.text);

    if !result.rejected.is_empty() {
        tracing::warn!(
            page = page.number,
            rejected = ?result.rejected,
            "Dropped claims not grounded in page text"
        );
    }
    if !result.warnings.is_empty() {
        tracing::debug!(
            page = page.number,
            warnings = ?result.warnings,
            "Claim extraction produced quality warnings"
        );
    }

    let drafts: Vec<ClaimDraft> = result.accepted.into_iter().map(classify).collect();
    tracing::debug!(
        page = page.number,
        raw_claims = raw_count,
        kept_claims = drafts.len(),
        "Page claims prepared"
    );
    drafts
}
