//! Website lookup via a SERP API.
//!
//! Given an entity's display name and category, ask a search API for the
//! official website and keep only the origin (`scheme://host`) of the top
//! organic result. Rate limiting is the caller's concern; this client only
//! translates HTTP 429 into "no result this round" so a throttled batch
//! degrades instead of failing.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::{debug, info, warn};

use lens_core::{Error, Result};

/// Default SERP endpoint.
pub const DEFAULT_LOOKUP_URL: &str = "https://serpapi.example.com";

/// Timeout for one lookup request (seconds).
pub const LOOKUP_TIMEOUT_SECS: u64 = 30;

/// Capability interface for resolving an entity's official website.
#[async_trait]
pub trait WebsiteLookup: Send + Sync {
    /// Resolve the official website for a display name. `Ok(None)` means the
    /// lookup ran but found nothing usable (including rate limiting);
    /// `Err` means the service itself misbehaved.
    async fn find_website(&self, display_name: &str, category: &str) -> Result<Option<String>>;
}

#[derive(Debug, Deserialize)]
struct OrganicResult {
    link: String,
}

#[derive(Debug, Deserialize)]
struct SearchReply {
    #[serde(default)]
    organic_results: Vec<OrganicResult>,
}

/// SERP-backed lookup client.
pub struct HttpWebsiteLookup {
    client: Client,
    base_url: String,
    api_key: String,
}

impl HttpWebsiteLookup {
    pub fn new(base_url: String, api_key: String) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(LOOKUP_TIMEOUT_SECS))
            .build()
            .map_err(|e| Error::Config(format!("failed to build HTTP client: {e}")))?;

        info!(
            subsystem = "extract",
            component = "lookup",
            base_url = %base_url,
            "Initialized website lookup"
        );
        Ok(Self {
            client,
            base_url,
            api_key,
        })
    }

    /// Create from environment variables (`LENS_LOOKUP_URL`,
    /// `LENS_LOOKUP_API_KEY`). The API key is required.
    pub fn from_env() -> Result<Self> {
        let base_url =
            std::env::var("LENS_LOOKUP_URL").unwrap_or_else(|_| DEFAULT_LOOKUP_URL.to_string());
        let api_key = std::env::var("LENS_LOOKUP_API_KEY")
            .map_err(|_| Error::Config("LENS_LOOKUP_API_KEY must be set".to_string()))?;
        Self::new(base_url, api_key)
    }
}

#[async_trait]
impl WebsiteLookup for HttpWebsiteLookup {
    async fn find_website(&self, display_name: &str, category: &str) -> Result<Option<String>> {
        let url = format!("{}/google", self.base_url);
        let query = format!("{category} {display_name} official website");

        let response = self
            .client
            .get(&url)
            .query(&[
                ("api_key", self.api_key.as_str()),
                ("q", query.as_str()),
                ("gl", "us"),
            ])
            .send()
            .await
            .map_err(|e| Error::Request(format!("website lookup failed: {e}")))?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            warn!(
                subsystem = "extract",
                component = "lookup",
                display_name = %display_name,
                "Website lookup rate limited, skipping"
            );
            return Ok(None);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Request(format!(
                "lookup service returned {status}: {body}"
            )));
        }

        let reply: SearchReply = response
            .json()
            .await
            .map_err(|e| Error::Request(format!("malformed lookup reply: {e}")))?;

        let website = reply
            .organic_results
            .first()
            .and_then(|r| normalize_origin(&r.link));

        debug!(
            subsystem = "extract",
            component = "lookup",
            op = "find_website",
            display_name = %display_name,
            found = website.is_some(),
            "Website lookup completed"
        );
        Ok(website)
    }
}

/// Reduce a result link to its origin (`scheme://host`) so two pages of the
/// same site compare equal. Unparseable links yield `None`.
fn normalize_origin(link: &str) -> Option<String> {
    let parsed = url::Url::parse(link).ok()?;
    let host = parsed.host_str()?;
    Some(format!("{}://{}", parsed.scheme(), host))
}
