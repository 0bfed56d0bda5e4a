//! Language detector implementations.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::time::Duration;

use super::LanguageDetector;

/// Calls a remote language-identification service.
///
/// Sends `{"document": text}` as JSON and expects the tag back either as a
/// JSON string (`"en"`) or as a bare word.
pub struct HttpLanguageDetector {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpLanguageDetector {
    /// `request_timeout` caps how long an abandoned request may linger
    pub fn new(endpoint: impl Into<String>, request_timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .context("Failed to build language detector HTTP client")?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }

    async fn request(&self, text: &str) -> Result<String> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&serde_json::json!({ "document": text }))
            .send()
            .await
            .context("Language detector request failed")?
            .error_for_status()
            .context("Language detector returned an error status")?;

        let body = response
            .text()
            .await
            .context("Failed to read language detector response")?;

        Ok(parse_tag(&body))
    }
}

#[async_trait]
impl LanguageDetector for HttpLanguageDetector {
    async fn detect(&self, text: &str) -> String {
        match self.request(text).await {
            Ok(tag) => tag,
            Err(e) => {
                tracing::warn!(error = %e, endpoint = %self.endpoint, "Language detection failed");
                String::new()
            }
        }
    }
}

/// Extract a language tag from a detector response body
fn parse_tag(body: &str) -> String {
    let trimmed = body.trim();
    match serde_json::from_str::<String>(trimmed) {
        Ok(tag) => tag.trim().to_string(),
        Err(_) => trimmed.trim_matches('"').to_string(),
    }
}

/// Always reports the same tag
pub struct FixedLanguageDetector {
    tag: String,
}

impl FixedLanguageDetector {
    pub fn new(tag: impl Into<String>) -> Self {
        Self { tag: tag.into() }
    }
}

#[async_trait]
impl LanguageDetector for FixedLanguageDetector {
    async fn detect(&self, _text: &str) -> String {
        self.tag.clone()
    }
}
