//! Citation suggestions from Semantic Scholar paper search

use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;

use crate::model::api::CitationSuggestion;

const DEFAULT_LIMIT: u32 = 3;
const MAX_LIMIT: u32 = 10;
const MAX_AUTHORS: usize = 3;
const SEARCH_FIELDS: &str = "title,authors,year,url";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum SuggestionError {
    #[error("Claim text is required")]
    EmptyQuery,

    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Unexpected status {0}")]
    UnexpectedStatus(reqwest::StatusCode),
}

// Response models - only the fields we need
#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    data: Vec<PaperHit>,
}

#[derive(Debug, Deserialize)]
struct PaperHit {
    title: Option<String>,
    #[serde(default)]
    authors: Vec<AuthorHit>,
    year: Option<i32>,
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AuthorHit {
    name: Option<String>,
}

impl From<PaperHit> for CitationSuggestion {
    fn from(hit: PaperHit) -> Self {
        let authors = hit
            .authors
            .into_iter()
            .filter_map(|a| a.name)
            .take(MAX_AUTHORS)
            .collect::<Vec<_>>()
            .join(", ");

        CitationSuggestion {
            title: hit.title,
            authors,
            year: hit.year,
            url: hit.url,
        }
    }
}

/// Client for the Semantic Scholar paper search endpoint
pub struct SuggestionClient {
    client: Client,
    search_url: String,
}

impl SuggestionClient {
    pub fn new(search_url: impl Into<String>) -> Self {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_default();

        Self {
            client,
            search_url: search_url.into(),
        }
    }

    /// Papers that might back `claim_text`
    pub async fn suggest(
        &self,
        claim_text: &str,
        limit: Option<u32>,
    ) -> Result<Vec<CitationSuggestion>, SuggestionError> {
        let query = claim_text.trim();
        if query.is_empty() {
            return Err(SuggestionError::EmptyQuery);
        }
        let limit = limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
        let limit_param = limit.to_string();

        let response = self
            .client
            .get(&self.search_url)
            .query(&[
                ("query", query),
                ("limit", limit_param.as_str()),
                ("fields", SEARCH_FIELDS),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            tracing::warn!(status = %response.status(), "Semantic Scholar search failed");
            return Err(SuggestionError::UnexpectedStatus(response.status()));
        }

        let body: SearchResponse = response.json().await?;
        let suggestions: Vec<CitationSuggestion> =
            body.data.into_iter().map(CitationSuggestion::from).collect();

        tracing::debug!(count = suggestions.len(), limit = limit, "Citation suggestions fetched");
        Ok(suggestions)
    }
}
