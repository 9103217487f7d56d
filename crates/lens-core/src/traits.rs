//! Repository traits for the promptlens engine.
//!
//! These traits define the persistence interfaces that `lens-db` implements
//! against Postgres, enabling in-memory implementations for engine tests.
//!
//! The relational store is the single source of truth and the only
//! synchronization point between worker processes; every claim method must
//! be safe under concurrent callers racing for the same rows.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::Result;
use crate::models::*;

/// Repository for monitored prompts (the work-item payload).
#[async_trait]
pub trait PromptRepository: Send + Sync {
    /// Insert a new prompt and return its id.
    async fn insert(&self, content: &str) -> Result<Uuid>;

    /// Fetch a prompt by id.
    async fn get(&self, id: Uuid) -> Result<Option<Prompt>>;
}

/// Claim store for queued work items.
#[async_trait]
pub trait WorkItemRepository: Send + Sync {
    /// Queue a new work item for `(prompt, source)`, eligible at `not_before`.
    async fn enqueue(
        &self,
        prompt_id: Uuid,
        source: AiSource,
        not_before: DateTime<Utc>,
    ) -> Result<Uuid>;

    /// Atomically claim up to `max_count` eligible rows for `source`.
    ///
    /// Selection and the PENDING→RUNNING flip happen inside one short
    /// transaction using a skip-locked read, so two concurrent callers never
    /// receive overlapping rows. Oldest eligible rows win; FAILED rows older
    /// than the backoff window form a secondary tier consulted only when the
    /// PENDING tier is empty. The prompt text is joined in so execution
    /// never re-enters the claim transaction.
    async fn claim_batch(&self, source: AiSource, max_count: i64) -> Result<Vec<ClaimedWorkItem>>;

    /// Mark a RUNNING item COMPLETED.
    async fn complete(&self, id: Uuid) -> Result<()>;

    /// Mark a RUNNING item FAILED with the normalized error message.
    async fn fail(&self, id: Uuid, error: &str) -> Result<()>;

    /// Fetch one item by id.
    async fn get(&self, id: Uuid) -> Result<Option<WorkItem>>;

    /// Queue counts by status.
    async fn stats(&self) -> Result<QueueStats>;
}

/// Store for captured artifacts and their analysis lifecycle.
#[async_trait]
pub trait ArtifactRepository: Send + Sync {
    /// Persist a newly captured artifact with analysis status PENDING.
    async fn insert(&self, artifact: NewArtifact) -> Result<Uuid>;

    /// Atomically claim up to `max_count` artifacts whose analysis is
    /// PENDING, oldest first, flipping them to RUNNING. Same skip-locked
    /// contract as [`WorkItemRepository::claim_batch`], but with no backoff
    /// tier: FAILED artifacts stay failed.
    async fn claim_batch(&self, max_count: i64) -> Result<Vec<Artifact>>;

    /// Mark analysis COMPLETED and record when.
    async fn complete_analysis(&self, id: Uuid, analysed_at: DateTime<Utc>) -> Result<()>;

    /// Mark analysis FAILED with the error message.
    async fn fail_analysis(&self, id: Uuid, error: &str) -> Result<()>;

    /// Fetch one artifact by id.
    async fn get(&self, id: Uuid) -> Result<Option<Artifact>>;
}

/// Store for resolved mentions.
#[async_trait]
pub trait MentionRepository: Send + Sync {
    /// Persist a batch of mentions in one transaction (all or nothing).
    async fn insert_many(&self, mentions: Vec<NewMention>) -> Result<()>;

    /// Count mentions pointing at an entity.
    async fn count_for_entity(&self, entity_id: Uuid) -> Result<i64>;

    /// List mentions for an artifact, ordered by position.
    async fn list_for_artifact(&self, artifact_id: Uuid) -> Result<Vec<Mention>>;
}

/// Store for canonical entities.
#[async_trait]
pub trait EntityRepository: Send + Sync {
    /// Load every entity (registry cache rebuild at startup).
    async fn list_all(&self) -> Result<Vec<Entity>>;

    /// Insert a new entity.
    ///
    /// Returns [`crate::Error::UniqueViolation`] when another writer already
    /// created a row with the same canonical or display name; callers
    /// convert that into a re-read instead of propagating it.
    async fn insert(&self, entity: NewEntity) -> Result<Entity>;

    /// Fetch by canonical name (already lowercased).
    async fn find_by_canonical_name(&self, canonical_name: &str) -> Result<Option<Entity>>;

    /// Fetch by display name.
    async fn find_by_display_name(&self, display_name: &str) -> Result<Option<Entity>>;

    /// Append one alias to an entity's alias list.
    ///
    /// Must be an append at the store level (not read-modify-write) so
    /// concurrent alias additions from other processes are preserved; a
    /// duplicate alias is a no-op.
    async fn append_alias(&self, canonical_name: &str, alias: &str) -> Result<()>;

    /// Entities still missing a website, oldest first.
    async fn list_missing_website(&self, limit: i64) -> Result<Vec<Entity>>;

    /// Record the resolved website for an entity and return the updated row.
    async fn set_website(&self, id: Uuid, website_url: &str) -> Result<Entity>;

    /// All entities sharing a resolved website, oldest-created first.
    /// Empty-string websites (failed lookups) are never grouped.
    async fn find_by_website(&self, website_url: &str) -> Result<Vec<Entity>>;

    /// Merge `merged_ids` into the primary entity, in one transaction:
    /// replace the primary's aliases with `merged_aliases` (the precomputed
    /// union), re-point every mention referencing a merged entity to the
    /// primary, delete the merged rows, and return the updated primary.
    async fn merge(
        &self,
        primary_id: Uuid,
        merged_ids: &[Uuid],
        merged_aliases: &[String],
    ) -> Result<Entity>;
}
