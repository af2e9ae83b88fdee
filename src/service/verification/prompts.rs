//! Prompts for claim verification

use crate::service::verification::chunking::clip_words;

/// Words of each excerpt sent to the reasoner
const PROMPT_EXCERPT_WORDS: usize = 140;

/// System prompt for claim verification
pub const VERIFICATION_SYSTEM_PROMPT: &str = r#"You are a careful scientific fact-checker. Given a CLAIM and EVIDENCE EXCERPTS from the cited paper, decide whether the evidence supports the claim, partially supports it, or leaves it unsupported.

## Rules

- Judge only from the provided excerpts; do not assume context outside them.
- If the evidence is mixed, tangential or insufficient, choose "partially_supported" rather than "supported".
- Use "inconclusive" only when the excerpts are unrelated to the claim.
- `confidence` is a number between 0.0 and 1.0.
- Keep `reasoning` short; markdown is allowed."#;

/// Build the verification prompt from a claim and its page-tagged excerpts
pub fn build_verification_prompt(claim_text: &str, excerpts: &[String]) -> String {
    let evidence = if excerpts.is_empty() {
        "(no evidence)".to_string()
    } else {
        excerpts.join("\n\n---\n\n")
    };

    format!("CLAIM:\n{claim_text}\n\nEVIDENCE EXCERPTS:\n{evidence}")
}

/// Tag an excerpt with its page for the prompt
pub fn pack_excerpt(page: u32, text: &str) -> String {
    format!("[page {}]\n{}", page, clip_words(text, PROMPT_EXCERPT_WORDS))
}
