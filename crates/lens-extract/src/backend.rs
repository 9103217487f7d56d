//! Extraction backend capability.
//!
//! A backend knows how to run one prompt against one AI assistant and
//! capture its answer. The shipped implementation talks to a
//! browser-automation sidecar over HTTP; the selectors and navigation for
//! each assistant live entirely in the sidecar.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use lens_core::{AiSource, Error, Result};

/// Default sidecar endpoint.
pub const DEFAULT_SCRAPER_URL: &str = "http://localhost:9321";

/// Timeout for one scrape. Assistants can take well over a minute to finish
/// a long answer.
pub const SCRAPE_TIMEOUT_SECS: u64 = 180;

/// A captured assistant response.
#[derive(Debug, Clone, PartialEq)]
pub struct ScrapedResponse {
    pub content: String,
    pub citations: Vec<String>,
}

/// Capability interface for running one prompt against an assistant.
///
/// Implementations must return `Err` on any failure mode (navigation
/// timeout, element not found, empty answer) — never a partial success
/// with undefined content.
#[async_trait]
pub trait ExtractionBackend: Send + Sync {
    async fn get_response(&self, prompt: &str) -> Result<ScrapedResponse>;
}

/// Registry mapping each work source to its backend.
#[derive(Default)]
pub struct BackendRegistry {
    backends: HashMap<AiSource, Arc<dyn ExtractionBackend>>,
}

impl BackendRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a backend for a source, replacing any previous one.
    pub fn register(&mut self, source: AiSource, backend: Arc<dyn ExtractionBackend>) {
        debug!(
            subsystem = "extract",
            component = "backend_registry",
            source = %source,
            "Registered extraction backend"
        );
        self.backends.insert(source, backend);
    }

    /// Look up the backend for a source.
    pub fn get(&self, source: AiSource) -> Option<Arc<dyn ExtractionBackend>> {
        self.backends.get(&source).cloned()
    }

    /// Sources with a registered backend, in dispatch order.
    pub fn sources(&self) -> Vec<AiSource> {
        AiSource::ALL
            .into_iter()
            .filter(|s| self.backends.contains_key(s))
            .collect()
    }
}

#[derive(Serialize)]
struct ScrapeRequest<'a> {
    source: &'a str,
    prompt: &'a str,
}

#[derive(Deserialize)]
struct ScrapeReply {
    content: Option<String>,
    #[serde(default)]
    citations: Vec<String>,
}

/// HTTP backend posting prompts to the browser-automation sidecar.
pub struct HttpExtractionBackend {
    client: Client,
    base_url: String,
    source: AiSource,
}

impl HttpExtractionBackend {
    pub fn new(base_url: String, source: AiSource) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(SCRAPE_TIMEOUT_SECS))
            .build()
            .map_err(|e| Error::Config(format!("failed to build HTTP client: {e}")))?;

        info!(
            subsystem = "extract",
            component = "backend",
            source = %source,
            base_url = %base_url,
            "Initialized extraction backend"
        );
        Ok(Self {
            client,
            base_url,
            source,
        })
    }

    /// Create from environment variables (`LENS_SCRAPER_URL`).
    pub fn from_env(source: AiSource) -> Result<Self> {
        let base_url =
            std::env::var("LENS_SCRAPER_URL").unwrap_or_else(|_| DEFAULT_SCRAPER_URL.to_string());
        Self::new(base_url, source)
    }
}

#[async_trait]
impl ExtractionBackend for HttpExtractionBackend {
    async fn get_response(&self, prompt: &str) -> Result<ScrapedResponse> {
        let url = format!("{}/scrape", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&ScrapeRequest {
                source: self.source.as_str(),
                prompt,
            })
            .send()
            .await
            .map_err(|e| Error::Backend(format!("scrape request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Backend(format!(
                "scraper returned {status}: {body}"
            )));
        }

        let reply: ScrapeReply = response
            .json()
            .await
            .map_err(|e| Error::Backend(format!("malformed scraper reply: {e}")))?;

        // A missing or empty answer is a failure, not a partial success.
        let content = match reply.content {
            Some(c) if !c.trim().is_empty() => c,
            _ => {
                return Err(Error::Backend(format!(
                    "no response content from {}",
                    self.source
                )))
            }
        };

        Ok(ScrapedResponse {
            content,
            citations: reply.citations,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockExtractionBackend;

    #[test]
    fn test_registry_lookup_and_sources() {
        let mut registry = BackendRegistry::new();
        assert!(registry.get(AiSource::ChatGpt).is_none());
        assert!(registry.sources().is_empty());

        registry.register(
            AiSource::Claude,
            Arc::new(MockExtractionBackend::new("hi", Vec::new())),
        );
        registry.register(
            AiSource::ChatGpt,
            Arc::new(MockExtractionBackend::new("hello", Vec::new())),
        );

        assert!(registry.get(AiSource::ChatGpt).is_some());
        assert!(registry.get(AiSource::Perplexity).is_none());
        // Dispatch order follows AiSource::ALL, not insertion order.
        assert_eq!(registry.sources(), vec![AiSource::ChatGpt, AiSource::Claude]);
    }
}
