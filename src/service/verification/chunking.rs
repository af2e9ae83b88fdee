//! Page-aware chunking of cited documents

use crate::model::PageText;

/// A paragraph group of one page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub page: u32,
    /// 1-based group index within the page
    pub paragraph: u32,
    pub text: String,
}

/// Split every page into paragraph groups of at most `max_chars`
///
/// Paragraphs are lines; a single paragraph longer than `max_chars` becomes
/// its own chunk. Blank pages yield no chunks.
pub fn chunk_pages(pages: &[PageText], max_chars: usize) -> Vec<Chunk> {
    pages
        .iter()
        .flat_map(|page| {
            split_paragraphs(&page.text, max_chars)
                .into_iter()
                .zip(1u32..)
                .map(|(text, paragraph)| Chunk {
                    page: page.number,
                    paragraph,
                    text,
                })
        })
        .collect()
}

fn split_paragraphs(text: &str, max_chars: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut buffer: Vec<&str> = Vec::new();
    let mut size = 0;

    for paragraph in text.lines().map(str::trim).filter(|p| !p.is_empty()) {
        let len = paragraph.chars().count();
        if size + len + 1 > max_chars && !buffer.is_empty() {
            chunks.push(buffer.join("\n"));
            buffer.clear();
            size = 0;
        }
        buffer.push(paragraph);
        size += len + 1;
    }

    if !buffer.is_empty() {
        chunks.push(buffer.join("\n"));
    }
    chunks
}

/// Keep at most `max_words` whitespace-separated words, marking the cut with ` …`
pub fn clip_words(text: &str, max_words: usize) -> String {
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.len() <= max_words {
        return text.to_string();
    }
    format!("{} …", words[..max_words].join(" "))
}
