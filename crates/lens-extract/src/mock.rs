//! Deterministic mocks of the external collaborators, for engine tests.
//!
//! Each mock records the calls it receives and can be switched into a
//! failure mode, so tests can assert both happy paths and error containment
//! without any network.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use lens_core::{Error, RawMention, Result};

use crate::backend::{ExtractionBackend, ScrapedResponse};
use crate::completion::CompletionService;
use crate::lookup::WebsiteLookup;

/// Mock extraction backend returning a fixed response.
#[derive(Clone)]
pub struct MockExtractionBackend {
    response: ScrapedResponse,
    fail_with: Option<String>,
    prompts: Arc<Mutex<Vec<String>>>,
}

impl MockExtractionBackend {
    pub fn new(content: impl Into<String>, citations: Vec<String>) -> Self {
        Self {
            response: ScrapedResponse {
                content: content.into(),
                citations,
            },
            fail_with: None,
            prompts: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Make every scrape fail with the given message.
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            response: ScrapedResponse {
                content: String::new(),
                citations: Vec::new(),
            },
            fail_with: Some(message.into()),
            prompts: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Prompts received so far, in call order.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl ExtractionBackend for MockExtractionBackend {
    async fn get_response(&self, prompt: &str) -> Result<ScrapedResponse> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        match &self.fail_with {
            Some(message) => Err(Error::Backend(message.clone())),
            None => Ok(self.response.clone()),
        }
    }
}

/// Mock completion service returning scripted mentions.
#[derive(Clone)]
pub struct MockCompletionService {
    mentions: Vec<RawMention>,
    fail_with: Option<String>,
    contents: Arc<Mutex<Vec<String>>>,
}

impl MockCompletionService {
    pub fn new(mentions: Vec<RawMention>) -> Self {
        Self {
            mentions,
            fail_with: None,
            contents: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Make every extraction fail with the given message.
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            mentions: Vec::new(),
            fail_with: Some(message.into()),
            contents: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Contents received so far, in call order.
    pub fn contents(&self) -> Vec<String> {
        self.contents.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompletionService for MockCompletionService {
    async fn extract_mentions(&self, content: &str) -> Result<Vec<RawMention>> {
        self.contents.lock().unwrap().push(content.to_string());
        match &self.fail_with {
            Some(message) => Err(Error::Completion(message.clone())),
            None => Ok(self.mentions.clone()),
        }
    }
}

/// Mock website lookup resolving from a fixed map. Names absent from the
/// map resolve to `Ok(None)`.
#[derive(Clone, Default)]
pub struct MockWebsiteLookup {
    websites: HashMap<String, String>,
    fail_with: Option<String>,
    queries: Arc<Mutex<Vec<String>>>,
}

impl MockWebsiteLookup {
    pub fn new() -> Self {
        Self::default()
    }

    /// Map a display name to a website.
    pub fn with_website(mut self, display_name: impl Into<String>, url: impl Into<String>) -> Self {
        self.websites.insert(display_name.into(), url.into());
        self
    }

    /// Make every lookup fail with the given message.
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            fail_with: Some(message.into()),
            ..Self::default()
        }
    }

    /// Display names queried so far, in call order.
    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl WebsiteLookup for MockWebsiteLookup {
    async fn find_website(&self, display_name: &str, _category: &str) -> Result<Option<String>> {
        self.queries.lock().unwrap().push(display_name.to_string());
        match &self.fail_with {
            Some(message) => Err(Error::Request(message.clone())),
            None => Ok(self.websites.get(display_name).cloned()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_backend_records_prompts() {
        let backend = MockExtractionBackend::new("answer", vec!["https://a.com".to_string()]);
        let response = backend.get_response("best CRM tools").await.unwrap();
        assert_eq!(response.content, "answer");
        assert_eq!(backend.prompts(), vec!["best CRM tools".to_string()]);
    }

    #[tokio::test]
    async fn test_mock_backend_failure_mode() {
        let backend = MockExtractionBackend::failing("boom");
        let err = backend.get_response("p").await.unwrap_err();
        assert!(matches!(err, Error::Backend(_)));
        assert_eq!(backend.prompts().len(), 1);
    }

    #[tokio::test]
    async fn test_mock_lookup_resolves_from_map() {
        let lookup = MockWebsiteLookup::new().with_website("Acme", "https://acme.com");
        assert_eq!(
            lookup.find_website("Acme", "crm").await.unwrap(),
            Some("https://acme.com".to_string())
        );
        assert_eq!(lookup.find_website("Other", "crm").await.unwrap(), None);
        assert_eq!(lookup.queries().len(), 2);
    }
}
