pub mod claims;
pub mod credential;
pub mod document;
pub mod jobs;
pub mod ledger;
pub mod llm;
pub mod pages;
pub mod paper;
pub mod reasoner;
pub mod scorer;
pub mod stream;
pub mod suggestions;
pub mod verification;

#[cfg(test)]
pub mod testing;

pub use credential::CredentialValidator;
pub use document::PdfTextExtractor;
pub use paper::{Collaborators, PaperService, PaperServiceError};
pub use reasoner::LlmReasoner;
pub use scorer::LexicalScorer;
pub use suggestions::SuggestionClient;
