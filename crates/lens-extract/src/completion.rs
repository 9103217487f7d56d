//! Completion service: LLM-backed mention extraction.
//!
//! The service consumes an artifact's text and returns an ordered list of
//! entity mentions under a fixed JSON contract:
//!
//! ```json
//! {
//!   "mentions": [
//!     {"brand": "Acme CRM", "cleanName": "acme crm",
//!      "position": 1, "sentiment": "positive"}
//!   ]
//! }
//! ```
//!
//! `brand` is the exact surface form, `cleanName` the model's best-effort
//! normalization, `position` the 1-indexed order of first appearance.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info};

use lens_core::{Error, RawMention, Result, Sentiment};

/// Default OpenAI-compatible endpoint.
pub const DEFAULT_COMPLETION_URL: &str = "https://api.openai.com";

/// Default extraction model.
pub const DEFAULT_COMPLETION_MODEL: &str = "gpt-4o-mini";

/// Timeout for one extraction request (seconds).
pub const COMPLETION_TIMEOUT_SECS: u64 = 120;

/// Instruction block sent with every artifact. The full prompt engineering
/// lives with the product team; this states the machine contract.
const EXTRACTION_INSTRUCTIONS: &str = "Extract the commercial brands recommended, compared, or \
evaluated as solutions in the following text. Return strict JSON of the form \
{\"mentions\":[{\"brand\":\"<exact text>\",\"cleanName\":\"<normalized name>\",\
\"position\":<1-indexed order of first appearance>,\"sentiment\":\
\"positive\"|\"neutral\"|\"negative\"}]}. Count only the first occurrence of \
each brand; positions must be sequential with no gaps. Return \
{\"mentions\":[]} when no brands are mentioned.";

/// Capability interface for mention extraction.
#[async_trait]
pub trait CompletionService: Send + Sync {
    /// Extract ordered entity mentions from artifact content.
    async fn extract_mentions(&self, content: &str) -> Result<Vec<RawMention>>;
}

#[derive(Debug, Deserialize)]
struct WireMention {
    brand: String,
    #[serde(rename = "cleanName")]
    clean_name: String,
    position: i32,
    sentiment: String,
}

#[derive(Debug, Deserialize)]
struct WireMentions {
    mentions: Vec<WireMention>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    choices: Vec<ChatChoice>,
}

/// OpenAI-compatible chat-completions client implementing the extraction
/// contract.
pub struct HttpCompletionService {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
}

impl HttpCompletionService {
    pub fn new(base_url: String, api_key: Option<String>, model: String) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(COMPLETION_TIMEOUT_SECS))
            .build()
            .map_err(|e| Error::Config(format!("failed to build HTTP client: {e}")))?;

        info!(
            subsystem = "extract",
            component = "completion",
            base_url = %base_url,
            model = %model,
            "Initialized completion service"
        );
        Ok(Self {
            client,
            base_url,
            api_key,
            model,
        })
    }

    /// Create from environment variables (`LENS_COMPLETION_URL`,
    /// `LENS_COMPLETION_API_KEY`, `LENS_COMPLETION_MODEL`).
    pub fn from_env() -> Result<Self> {
        let base_url = std::env::var("LENS_COMPLETION_URL")
            .unwrap_or_else(|_| DEFAULT_COMPLETION_URL.to_string());
        let api_key = std::env::var("LENS_COMPLETION_API_KEY").ok();
        let model = std::env::var("LENS_COMPLETION_MODEL")
            .unwrap_or_else(|_| DEFAULT_COMPLETION_MODEL.to_string());
        Self::new(base_url, api_key, model)
    }
}

#[async_trait]
impl CompletionService for HttpCompletionService {
    async fn extract_mentions(&self, content: &str) -> Result<Vec<RawMention>> {
        let url = format!("{}/v1/chat/completions", self.base_url);
        let body = json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": EXTRACTION_INSTRUCTIONS },
                { "role": "user", "content": content },
            ],
            "response_format": { "type": "json_object" },
        });

        let mut request = self.client.post(&url).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::Completion(format!("completion request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Completion(format!(
                "completion service returned {status}: {body}"
            )));
        }

        let reply: ChatReply = response
            .json()
            .await
            .map_err(|e| Error::Completion(format!("malformed completion reply: {e}")))?;

        let message = reply
            .choices
            .first()
            .map(|c| c.message.content.as_str())
            .ok_or_else(|| Error::Completion("completion reply had no choices".to_string()))?;

        let mentions = parse_mentions(message)?;
        debug!(
            subsystem = "extract",
            component = "completion",
            op = "extract_mentions",
            mention_count = mentions.len(),
            "Extracted mentions"
        );
        Ok(mentions)
    }
}

/// Parse the model's JSON output into domain mentions. Tolerates code-fenced
/// output; rejects unknown sentiments as malformed.
pub fn parse_mentions(raw: &str) -> Result<Vec<RawMention>> {
    let stripped = strip_code_fences(raw);
    let wire: WireMentions = serde_json::from_str(stripped)
        .map_err(|e| Error::Completion(format!("malformed extraction output: {e}")))?;

    wire.mentions
        .into_iter()
        .map(|m| {
            let sentiment = Sentiment::parse(&m.sentiment).ok_or_else(|| {
                Error::Completion(format!("unknown sentiment \"{}\"", m.sentiment))
            })?;
            Ok(RawMention {
                surface_name: m.brand,
                normalized_name: m.clean_name,
                position: m.position,
                sentiment,
            })
        })
        .collect()
}

/// Strip a surrounding markdown code fence, if present.
fn strip_code_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop an optional language tag on the fence line.
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.trim_start_matches(['\r', '\n'])
        .strip_suffix("```")
        .unwrap_or(rest)
        .trim()
}
