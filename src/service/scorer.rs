//! Semantic similarity between text spans

use std::collections::HashMap;

/// Scores how closely two text spans are related
pub trait SemanticScorer: Send + Sync {
    /// Similarity in [0, 1]; higher is closer
    fn score(&self, a: &str, b: &str) -> f32;
}

/// Words carrying no topical signal
const STOPWORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "by", "for", "from", "has", "have", "in", "is",
    "it", "its", "of", "on", "or", "that", "the", "this", "to", "was", "were", "which", "with",
];

/// Term-frequency cosine similarity over lowercased word tokens
#[derive(Debug, Clone, Copy, Default)]
pub struct LexicalScorer;

impl SemanticScorer for LexicalScorer {
    fn score(&self, a: &str, b: &str) -> f32 {
        let left = term_frequencies(a);
        let right = term_frequencies(b);
        if left.is_empty() || right.is_empty() {
            return 0.0;
        }

        let dot: f32 = left
            .iter()
            .filter_map(|(term, l)| right.get(term).map(|r| l * r))
            .sum();
        let norm = |tf: &HashMap<String, f32>| tf.values().map(|v| v * v).sum::<f32>().sqrt();

        (dot / (norm(&left) * norm(&right))).clamp(0.0, 1.0)
    }
}

fn term_frequencies(text: &str) -> HashMap<String, f32> {
    let mut tf = HashMap::new();
    for word in text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .filter(|w| !STOPWORDS.contains(&w.as_str()))
    {
        *tf.entry(word).or_insert(0.0) += 1.0;
    }
    tf
}
