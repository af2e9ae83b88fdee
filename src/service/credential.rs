//! Reasoning-provider credential and its validation

use std::fmt;

use reqwest::{Client, StatusCode};

const REDACTED: &str = "***";

/// Provider API key; never printed
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    /// Wrap a key; blank keys are rejected
    pub fn new(key: impl Into<String>) -> Result<Self, CredentialError> {
        let key = key.into().trim().to_string();
        if key.is_empty() {
            return Err(CredentialError::Missing);
        }
        Ok(Self(key))
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Credential").field(&REDACTED).finish()
    }
}

impl fmt::Display for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(REDACTED)
    }
}

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum CredentialError {
    #[error("API key is required")]
    Missing,

    #[error("API key was rejected by the provider")]
    Invalid,

    #[error("Provider unreachable: {0}")]
    ProviderUnreachable(String),
}

/// Checks a credential against the provider's authenticated model listing
pub struct CredentialValidator {
    client: Client,
    base_url: String,
}

impl CredentialValidator {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub async fn validate(&self, credential: &Credential) -> Result<(), CredentialError> {
        let url = format!("{}/models", self.base_url);

        let response = self
            .client
            .get(&url)
            .bearer_auth(credential.expose())
            .send()
            .await
            .map_err(|e| CredentialError::ProviderUnreachable(e.without_url().to_string()))?;

        let status = response.status();
        tracing::debug!(status = %status, "Provider credential check completed");
        classify_status(status)
    }
}

fn classify_status(status: StatusCode) -> Result<(), CredentialError> {
    if status.is_success() {
        return Ok(());
    }
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(CredentialError::Invalid),
        other => Err(CredentialError::ProviderUnreachable(format!(
            "unexpected status {}",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credential_never_printed() {
        let credential = Credential::new("sk-secret-value").unwrap();

        assert_eq!(format!("{credential}"), "***");
        assert!(!format!("{credential:?}").contains("secret"));
        assert_eq!(credential.expose(), "sk-secret-value");
    }

    #[test]
    fn test_blank_credential_rejected() {
        assert!(matches!(Credential::new("   "), Err(CredentialError::Missing)));
    }

    #[test]
    fn test_status_classification() {
        assert!(classify_status(StatusCode::OK).is_ok());
        assert!(matches!(
            classify_status(StatusCode::UNAUTHORIZED),
            Err(CredentialError::Invalid)
        ));
        assert!(matches!(
            classify_status(StatusCode::FORBIDDEN),
            Err(CredentialError::Invalid)
        ));
        assert!(matches!(
            classify_status(StatusCode::TOO_MANY_REQUESTS),
            Err(CredentialError::ProviderUnreachable(_))
        ));
    }

    #[tokio::test]
    async fn test_unreachable_provider() {
        let validator = CredentialValidator::new("http://127.0.0.1:9");
        let credential = Credential::new("sk-test").unwrap();

        assert!(matches!(
            validator.validate(&credential).await,
            Err(CredentialError::ProviderUnreachable(_))
        ));
    }
}
