//! Core data models for the promptlens engine.
//!
//! These types are shared across all promptlens crates and represent the
//! core domain entities: queued work, captured artifacts, extracted
//! mentions, and canonical entities.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// =============================================================================
// SOURCES
// =============================================================================

/// The external assistant a prompt is executed against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AiSource {
    ChatGpt,
    Claude,
    Perplexity,
}

impl AiSource {
    /// All known sources, in dispatch order.
    pub const ALL: [AiSource; 3] = [AiSource::ChatGpt, AiSource::Claude, AiSource::Perplexity];

    /// Database/wire representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            AiSource::ChatGpt => "chatgpt",
            AiSource::Claude => "claude",
            AiSource::Perplexity => "perplexity",
        }
    }

    /// Parse the database/wire representation.
    pub fn parse(s: &str) -> Option<AiSource> {
        match s {
            "chatgpt" => Some(AiSource::ChatGpt),
            "claude" => Some(AiSource::Claude),
            "perplexity" => Some(AiSource::Perplexity),
            _ => None,
        }
    }
}

impl std::fmt::Display for AiSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// STATUSES
// =============================================================================

/// Lifecycle of a queued work item.
///
/// Transitions are monotonic PENDING → RUNNING → {COMPLETED, FAILED}. A
/// FAILED item is never reset; it re-enters circulation only through the
/// claim store's backoff tier or an explicit re-enqueue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl WorkStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkStatus::Pending => "pending",
            WorkStatus::Running => "running",
            WorkStatus::Completed => "completed",
            WorkStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<WorkStatus> {
        match s {
            "pending" => Some(WorkStatus::Pending),
            "running" => Some(WorkStatus::Running),
            "completed" => Some(WorkStatus::Completed),
            "failed" => Some(WorkStatus::Failed),
            _ => None,
        }
    }
}

/// Analysis lifecycle of a captured artifact.
///
/// Unlike work items, a FAILED artifact is terminal: there is no backoff
/// tier for analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl AnalysisStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisStatus::Pending => "pending",
            AnalysisStatus::Running => "running",
            AnalysisStatus::Completed => "completed",
            AnalysisStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<AnalysisStatus> {
        match s {
            "pending" => Some(AnalysisStatus::Pending),
            "running" => Some(AnalysisStatus::Running),
            "completed" => Some(AnalysisStatus::Completed),
            "failed" => Some(AnalysisStatus::Failed),
            _ => None,
        }
    }
}

/// Sentiment with which an entity was mentioned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    Neutral,
    Negative,
}

impl Sentiment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sentiment::Positive => "positive",
            Sentiment::Neutral => "neutral",
            Sentiment::Negative => "negative",
        }
    }

    pub fn parse(s: &str) -> Option<Sentiment> {
        match s {
            "positive" => Some(Sentiment::Positive),
            "neutral" => Some(Sentiment::Neutral),
            "negative" => Some(Sentiment::Negative),
            _ => None,
        }
    }
}

// =============================================================================
// QUEUE TYPES
// =============================================================================

/// The payload a work item executes: one monitored prompt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prompt {
    pub id: Uuid,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// One queued (prompt, source) execution request.
///
/// Rows are never deleted; completed and failed items remain as an audit
/// trail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkItem {
    pub id: Uuid,
    pub prompt_id: Uuid,
    pub source: AiSource,
    pub status: WorkStatus,
    /// Eligibility gate: the claim store ignores the row until this passes.
    pub not_before: DateTime<Utc>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A claimed work item with the read-only context joined at claim time,
/// so executors never re-enter the claim transaction.
#[derive(Debug, Clone)]
pub struct ClaimedWorkItem {
    pub id: Uuid,
    pub prompt_id: Uuid,
    pub source: AiSource,
    pub prompt_content: String,
}

/// Queue counts by status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueStats {
    pub pending: i64,
    pub running: i64,
    pub completed: i64,
    pub failed: i64,
}

// =============================================================================
// ARTIFACTS AND MENTIONS
// =============================================================================

/// The captured result of successfully executing a work item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Artifact {
    pub id: Uuid,
    pub work_item_id: Uuid,
    pub prompt_id: Uuid,
    pub source: AiSource,
    pub content: String,
    pub citations: Vec<String>,
    pub analysis_status: AnalysisStatus,
    pub analysed_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Request to persist a newly captured artifact.
#[derive(Debug, Clone)]
pub struct NewArtifact {
    pub work_item_id: Uuid,
    pub prompt_id: Uuid,
    pub source: AiSource,
    pub content: String,
    pub citations: Vec<String>,
}

/// One raw tuple from the completion service's extraction contract,
/// not yet resolved against the entity registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawMention {
    /// The exact text as it appears in the artifact.
    pub surface_name: String,
    /// The service's best-effort normalized name for grouping.
    pub normalized_name: String,
    /// 1-indexed order of first appearance.
    pub position: i32,
    pub sentiment: Sentiment,
}

/// One resolved occurrence of an entity inside an artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Mention {
    pub id: Uuid,
    pub artifact_id: Uuid,
    pub entity_id: Uuid,
    pub position: i32,
    pub sentiment: Sentiment,
    /// Derived via [`crate::scoring::mention_score`]; never hand-set.
    pub score: f64,
    pub created_at: DateTime<Utc>,
}

/// Request to persist one resolved mention.
#[derive(Debug, Clone)]
pub struct NewMention {
    pub artifact_id: Uuid,
    pub entity_id: Uuid,
    pub position: i32,
    pub sentiment: Sentiment,
    pub score: f64,
}

// =============================================================================
// ENTITIES
// =============================================================================

/// A canonical real-world referent ("brand") mentions are resolved against.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entity {
    pub id: Uuid,
    /// Case-insensitive unique key; stored lowercased.
    pub canonical_name: String,
    /// Unique human-facing name.
    pub display_name: String,
    /// Alternate surface forms; append-only, grows over time.
    pub aliases: Vec<String>,
    pub category: Option<String>,
    /// Normalized `scheme://host` once enriched; `None` until looked up.
    pub website_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Request to create a new canonical entity.
#[derive(Debug, Clone)]
pub struct NewEntity {
    pub canonical_name: String,
    pub display_name: String,
    pub aliases: Vec<String>,
    pub category: Option<String>,
    pub website_url: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ai_source_round_trip() {
        for source in AiSource::ALL {
            assert_eq!(AiSource::parse(source.as_str()), Some(source));
        }
    }

    #[test]
    fn test_ai_source_parse_unknown() {
        assert_eq!(AiSource::parse("gemini"), None);
        assert_eq!(AiSource::parse(""), None);
        // Parsing is case-sensitive; the database enum is lowercase.
        assert_eq!(AiSource::parse("ChatGPT"), None);
    }

    #[test]
    fn test_ai_source_display() {
        assert_eq!(AiSource::ChatGpt.to_string(), "chatgpt");
        assert_eq!(AiSource::Claude.to_string(), "claude");
        assert_eq!(AiSource::Perplexity.to_string(), "perplexity");
    }

    #[test]
    fn test_work_status_round_trip() {
        for status in [
            WorkStatus::Pending,
            WorkStatus::Running,
            WorkStatus::Completed,
            WorkStatus::Failed,
        ] {
            assert_eq!(WorkStatus::parse(status.as_str()), Some(status));
        }
    }

    #[test]
    fn test_analysis_status_round_trip() {
        for status in [
            AnalysisStatus::Pending,
            AnalysisStatus::Running,
            AnalysisStatus::Completed,
            AnalysisStatus::Failed,
        ] {
            assert_eq!(AnalysisStatus::parse(status.as_str()), Some(status));
        }
    }

    #[test]
    fn test_sentiment_round_trip() {
        for sentiment in [Sentiment::Positive, Sentiment::Neutral, Sentiment::Negative] {
            assert_eq!(Sentiment::parse(sentiment.as_str()), Some(sentiment));
        }
        assert_eq!(Sentiment::parse("mixed"), None);
    }

    #[test]
    fn test_sentiment_serde_lowercase() {
        let json = serde_json::to_string(&Sentiment::Positive).unwrap();
        assert_eq!(json, "\"positive\"");
        let parsed: Sentiment = serde_json::from_str("\"negative\"").unwrap();
        assert_eq!(parsed, Sentiment::Negative);
    }

    #[test]
    fn test_raw_mention_deserialize() {
        let raw: RawMention = serde_json::from_str(
            r#"{"surface_name":"Acme CRM","normalized_name":"acme crm","position":1,"sentiment":"positive"}"#,
        )
        .unwrap();
        assert_eq!(raw.surface_name, "Acme CRM");
        assert_eq!(raw.position, 1);
        assert_eq!(raw.sentiment, Sentiment::Positive);
    }
}
