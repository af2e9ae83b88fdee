//! Prompts for claim extraction

use crate::model::PageText;

/// System prompt for claim extraction
pub const EXTRACTION_SYSTEM_PROMPT: &str = r#"You extract high-signal, checkable factual claims that a paper makes about external work (third-party claims). Ignore claims about the paper's own methods, results or conclusions.

## Text Rules

- `text` MUST be a verbatim copy of a single sentence from the page, with its original punctuation and case.
- Keep inline citation markers exactly as printed (for example [12] or (Smith, 2020)).
- Do not paraphrase, merge sentences or add commentary.

## What To Extract

- Sentences that attribute facts to third parties ("As Smith (2019) showed", "According to CDC (2021)", "Prior work demonstrates [12]").
- Prefer quality over quantity. Only statements that plausibly require a citation.
- Any number of claims per page, possibly zero.

## Status Rules

- "cited": the sentence carries an explicit inline citation marker.
- "weakly_cited": attribution is implied but no explicit marker is present ("previous studies suggest", "prior work has shown"). Add a short `weak_reason` such as "generic phrase without explicit reference" or "mentions author without year".
- "uncited": no attribution, yet the sentence reads like a factual claim that would benefit from a source.

Return an empty claims array if the page has no such sentences."#;

/// Build the extraction prompt for one page
pub fn build_extraction_prompt(page: &PageText, max_chars: usize) -> String {
    format!(
        "Page {} text:\n{}\n\nReturn the claims found on this page.",
        page.number,
        truncate_chars(&page.text, max_chars)
    )
}

/// Cut `text` to at most `max_chars` characters on a char boundary
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((end, _)) => &text[..end],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_carries_page_number() {
        let prompt = build_extraction_prompt(&PageText::new(7, "Body."), 100);
        assert!(prompt.starts_with("Page 7 text:\nBody."));
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate_chars("héllo wörld", 4), "héll");
        assert_eq!(truncate_chars("short", 100), "short");
        assert_eq!(truncate_chars("", 3), "");
    }
}
