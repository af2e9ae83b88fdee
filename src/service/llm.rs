//! LLM client wrapper
//!
//! Clients are built per request from the caller's credential; the service
//! holds no provider key of its own.

use rig::providers::openai;

use crate::service::credential::Credential;

#[derive(Clone)]
pub struct LlmClient {
    client: openai::Client,
}

impl LlmClient {
    /// Create a client authenticated with the caller's credential
    pub fn new(credential: &Credential) -> Result<Self, String> {
        let client = openai::Client::new(credential.expose())
            .map_err(|e| format!("Failed to create OpenAI client: {}", e))?;

        Ok(Self { client })
    }

    /// Underlying OpenAI client, for building extractors
    pub fn openai_client(&self) -> &openai::Client {
        &self.client
    }
}
