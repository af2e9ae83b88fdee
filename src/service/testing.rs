//! Test doubles shared by service tests

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Semaphore;

use crate::model::PageText;
use crate::model::extraction::{
    ExtractedCitationStatus, ExtractedClaim, ExtractedVerdict, ExtractedVerdictKind,
};
use crate::service::credential::Credential;
use crate::service::reasoner::{ClaimReasoner, ReasonerError};

pub const TTL: Duration = Duration::from_secs(60);

pub fn credential() -> Credential {
    Credential::new("sk-test").unwrap()
}

pub fn extracted(text: &str, status: ExtractedCitationStatus) -> ExtractedClaim {
    ExtractedClaim {
        text: text.to_string(),
        status,
        weak_reason: None,
    }
}

/// Plain-text document whose pages are joined with form feeds
pub fn document(pages: &[&str]) -> Vec<u8> {
    pages.join("\x0c").into_bytes()
}

/// Reasoner answering from a script
///
/// Pages without a script yield no claims. When gated, every
/// `extract_claims` call waits for one permit.
pub struct ScriptedReasoner {
    pages: HashMap<u32, Result<Vec<ExtractedClaim>, String>>,
    verdict: Result<ExtractedVerdict, String>,
    gate: Option<Arc<Semaphore>>,
    extract_calls: AtomicUsize,
    judged: Mutex<Vec<Vec<String>>>,
}

impl ScriptedReasoner {
    pub fn new() -> Self {
        Self {
            pages: HashMap::new(),
            verdict: Ok(ExtractedVerdict {
                verdict: ExtractedVerdictKind::Supported,
                confidence: 0.9,
                reasoning: "The excerpt states the claim directly.".to_string(),
            }),
            gate: None,
            extract_calls: AtomicUsize::new(0),
            judged: Mutex::new(Vec::new()),
        }
    }

    pub fn with_page(mut self, number: u32, claims: Vec<ExtractedClaim>) -> Self {
        self.pages.insert(number, Ok(claims));
        self
    }

    pub fn failing_page(mut self, number: u32) -> Self {
        self.pages
            .insert(number, Err("provider returned 500".to_string()));
        self
    }

    pub fn with_verdict(mut self, verdict: ExtractedVerdictKind, confidence: f64, reasoning: &str) -> Self {
        self.verdict = Ok(ExtractedVerdict {
            verdict,
            confidence,
            reasoning: reasoning.to_string(),
        });
        self
    }

    pub fn failing_judge(mut self) -> Self {
        self.verdict = Err("provider timed out".to_string());
        self
    }

    /// Hold every page extraction until a permit is added to the returned gate
    pub fn gated(mut self) -> (Self, Arc<Semaphore>) {
        let gate = Arc::new(Semaphore::new(0));
        self.gate = Some(gate.clone());
        (self, gate)
    }

    pub fn extract_calls(&self) -> usize {
        self.extract_calls.load(Ordering::SeqCst)
    }

    /// Excerpts passed to each `judge` call
    pub fn judged(&self) -> Vec<Vec<String>> {
        self.judged.lock().unwrap().clone()
    }
}

#[async_trait]
impl ClaimReasoner for ScriptedReasoner {
    async fn extract_claims(
        &self,
        _credential: &Credential,
        page: &PageText,
    ) -> Result<Vec<ExtractedClaim>, ReasonerError> {
        self.extract_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.acquire().await.unwrap().forget();
        }

        match self.pages.get(&page.number) {
            Some(Ok(claims)) => Ok(claims.clone()),
            Some(Err(e)) => Err(ReasonerError::ExtractionFailed(e.clone())),
            None => Ok(Vec::new()),
        }
    }

    async fn judge(
        &self,
        _credential: &Credential,
        _claim_text: &str,
        excerpts: &[String],
    ) -> Result<ExtractedVerdict, ReasonerError> {
        self.judged.lock().unwrap().push(excerpts.to_vec());
        self.verdict
            .clone()
            .map_err(ReasonerError::ExtractionFailed)
    }
}
