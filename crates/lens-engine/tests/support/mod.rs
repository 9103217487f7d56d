//! In-memory repositories for engine tests.
//!
//! `MemDb` mirrors the shape of the Postgres `Database` aggregate: one
//! repository handle per table, all over a single mutex-held state. The
//! semantics the engine relies on are reproduced faithfully: two-tier
//! claiming with the failed-item backoff window, unique violations on
//! entity creation, and merges re-pointing mentions. The mutex is never
//! held across an await.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use lens_core::defaults::BACKOFF_WINDOW_SECS;
use lens_core::{
    AiSource, AnalysisStatus, Artifact, ArtifactRepository, ClaimedWorkItem, Entity,
    EntityRepository, Error, Mention, MentionRepository, NewArtifact, NewEntity, NewMention,
    Prompt, PromptRepository, QueueStats, Result, WorkItem, WorkItemRepository, WorkStatus,
};

#[derive(Default)]
struct State {
    prompts: HashMap<Uuid, Prompt>,
    work_items: HashMap<Uuid, WorkItem>,
    artifacts: HashMap<Uuid, Artifact>,
    mentions: Vec<Mention>,
    entities: HashMap<Uuid, Entity>,
    seq: i64,
}

impl State {
    /// Monotonic timestamps in the past, so freshly created rows are always
    /// claim-eligible and ordering ties cannot occur.
    fn next_created_at(&mut self) -> DateTime<Utc> {
        self.seq += 1;
        Utc::now() - Duration::hours(2) + Duration::milliseconds(self.seq)
    }
}

type Shared = Arc<Mutex<State>>;

/// In-memory stand-in for the `Database` aggregate.
#[derive(Clone)]
pub struct MemDb {
    pub prompts: Arc<MemPrompts>,
    pub work_items: Arc<MemWorkItems>,
    pub artifacts: Arc<MemArtifacts>,
    pub mentions: Arc<MemMentions>,
    pub entities: Arc<MemEntities>,
    state: Shared,
}

impl MemDb {
    pub fn new() -> Self {
        let state: Shared = Arc::new(Mutex::new(State::default()));
        Self {
            prompts: Arc::new(MemPrompts(state.clone())),
            work_items: Arc::new(MemWorkItems(state.clone())),
            artifacts: Arc::new(MemArtifacts(state.clone())),
            mentions: Arc::new(MemMentions(state.clone())),
            entities: Arc::new(MemEntities(state.clone())),
            state,
        }
    }

    pub fn work_items_with_status(&self, status: WorkStatus) -> Vec<WorkItem> {
        let state = self.state.lock().unwrap();
        let mut items: Vec<_> = state
            .work_items
            .values()
            .filter(|w| w.status == status)
            .cloned()
            .collect();
        items.sort_by_key(|w| w.created_at);
        items
    }

    pub fn entity_count(&self) -> usize {
        self.state.lock().unwrap().entities.len()
    }

    pub fn mention_count(&self) -> usize {
        self.state.lock().unwrap().mentions.len()
    }

    pub fn artifact_count(&self) -> usize {
        self.state.lock().unwrap().artifacts.len()
    }

    /// Backdate a failed item so it clears the backoff window.
    pub fn age_work_item(&self, id: Uuid, age: Duration) {
        let mut state = self.state.lock().unwrap();
        if let Some(item) = state.work_items.get_mut(&id) {
            item.updated_at = Utc::now() - age;
        }
    }
}

pub struct MemPrompts(Shared);

#[async_trait]
impl PromptRepository for MemPrompts {
    async fn insert(&self, content: &str) -> Result<Uuid> {
        let mut state = self.0.lock().unwrap();
        let created_at = state.next_created_at();
        let id = Uuid::new_v4();
        state.prompts.insert(
            id,
            Prompt {
                id,
                content: content.to_string(),
                created_at,
            },
        );
        Ok(id)
    }

    async fn get(&self, id: Uuid) -> Result<Option<Prompt>> {
        Ok(self.0.lock().unwrap().prompts.get(&id).cloned())
    }
}

pub struct MemWorkItems(Shared);

#[async_trait]
impl WorkItemRepository for MemWorkItems {
    async fn enqueue(
        &self,
        prompt_id: Uuid,
        source: AiSource,
        not_before: DateTime<Utc>,
    ) -> Result<Uuid> {
        let mut state = self.0.lock().unwrap();
        let created_at = state.next_created_at();
        let id = Uuid::new_v4();
        state.work_items.insert(
            id,
            WorkItem {
                id,
                prompt_id,
                source,
                status: WorkStatus::Pending,
                not_before,
                error_message: None,
                created_at,
                updated_at: created_at,
            },
        );
        Ok(id)
    }

    async fn claim_batch(&self, source: AiSource, max_count: i64) -> Result<Vec<ClaimedWorkItem>> {
        let mut state = self.0.lock().unwrap();
        let now = Utc::now();
        let backoff_cutoff = now - Duration::seconds(BACKOFF_WINDOW_SECS);

        let mut eligible: Vec<Uuid> = state
            .work_items
            .values()
            .filter(|w| {
                w.source == source && w.status == WorkStatus::Pending && w.not_before <= now
            })
            .map(|w| w.id)
            .collect();
        if eligible.is_empty() {
            // Backoff tier: failed items outside the window.
            eligible = state
                .work_items
                .values()
                .filter(|w| {
                    w.source == source
                        && w.status == WorkStatus::Failed
                        && w.updated_at < backoff_cutoff
                })
                .map(|w| w.id)
                .collect();
        }

        eligible.sort_by_key(|id| state.work_items[id].created_at);
        eligible.truncate(max_count.max(0) as usize);

        let mut claimed = Vec::with_capacity(eligible.len());
        for id in eligible {
            let prompt_id = state.work_items[&id].prompt_id;
            let prompt_content = state
                .prompts
                .get(&prompt_id)
                .map(|p| p.content.clone())
                .ok_or_else(|| Error::NotFound(id.to_string()))?;
            let item = state.work_items.get_mut(&id).ok_or_else(|| Error::NotFound(id.to_string()))?;
            item.status = WorkStatus::Running;
            item.updated_at = now;
            claimed.push(ClaimedWorkItem {
                id,
                prompt_id,
                source,
                prompt_content,
            });
        }
        Ok(claimed)
    }

    async fn complete(&self, id: Uuid) -> Result<()> {
        let mut state = self.0.lock().unwrap();
        let item = state.work_items.get_mut(&id).ok_or_else(|| Error::NotFound(id.to_string()))?;
        item.status = WorkStatus::Completed;
        item.updated_at = Utc::now();
        Ok(())
    }

    async fn fail(&self, id: Uuid, error: &str) -> Result<()> {
        let mut state = self.0.lock().unwrap();
        let item = state.work_items.get_mut(&id).ok_or_else(|| Error::NotFound(id.to_string()))?;
        item.status = WorkStatus::Failed;
        item.error_message = Some(error.to_string());
        item.updated_at = Utc::now();
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<WorkItem>> {
        Ok(self.0.lock().unwrap().work_items.get(&id).cloned())
    }

    async fn stats(&self) -> Result<QueueStats> {
        let state = self.0.lock().unwrap();
        let mut stats = QueueStats {
            pending: 0,
            running: 0,
            completed: 0,
            failed: 0,
        };
        for item in state.work_items.values() {
            match item.status {
                WorkStatus::Pending => stats.pending += 1,
                WorkStatus::Running => stats.running += 1,
                WorkStatus::Completed => stats.completed += 1,
                WorkStatus::Failed => stats.failed += 1,
            }
        }
        Ok(stats)
    }
}

pub struct MemArtifacts(Shared);

#[async_trait]
impl ArtifactRepository for MemArtifacts {
    async fn insert(&self, artifact: NewArtifact) -> Result<Uuid> {
        let mut state = self.0.lock().unwrap();
        let created_at = state.next_created_at();
        let id = Uuid::new_v4();
        state.artifacts.insert(
            id,
            Artifact {
                id,
                work_item_id: artifact.work_item_id,
                prompt_id: artifact.prompt_id,
                source: artifact.source,
                content: artifact.content,
                citations: artifact.citations,
                analysis_status: AnalysisStatus::Pending,
                analysed_at: None,
                error_message: None,
                created_at,
                updated_at: created_at,
            },
        );
        Ok(id)
    }

    async fn claim_batch(&self, max_count: i64) -> Result<Vec<Artifact>> {
        let mut state = self.0.lock().unwrap();
        let now = Utc::now();

        let mut eligible: Vec<Uuid> = state
            .artifacts
            .values()
            .filter(|a| a.analysis_status == AnalysisStatus::Pending)
            .map(|a| a.id)
            .collect();
        eligible.sort_by_key(|id| state.artifacts[id].created_at);
        eligible.truncate(max_count.max(0) as usize);

        let mut claimed = Vec::with_capacity(eligible.len());
        for id in eligible {
            let artifact = state.artifacts.get_mut(&id).ok_or_else(|| Error::NotFound(id.to_string()))?;
            artifact.analysis_status = AnalysisStatus::Running;
            artifact.updated_at = now;
            claimed.push(artifact.clone());
        }
        Ok(claimed)
    }

    async fn complete_analysis(&self, id: Uuid, analysed_at: DateTime<Utc>) -> Result<()> {
        let mut state = self.0.lock().unwrap();
        let artifact = state.artifacts.get_mut(&id).ok_or_else(|| Error::NotFound(id.to_string()))?;
        artifact.analysis_status = AnalysisStatus::Completed;
        artifact.analysed_at = Some(analysed_at);
        artifact.updated_at = Utc::now();
        Ok(())
    }

    async fn fail_analysis(&self, id: Uuid, error: &str) -> Result<()> {
        let mut state = self.0.lock().unwrap();
        let artifact = state.artifacts.get_mut(&id).ok_or_else(|| Error::NotFound(id.to_string()))?;
        artifact.analysis_status = AnalysisStatus::Failed;
        artifact.error_message = Some(error.to_string());
        artifact.updated_at = Utc::now();
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Artifact>> {
        Ok(self.0.lock().unwrap().artifacts.get(&id).cloned())
    }
}

pub struct MemMentions(Shared);

#[async_trait]
impl MentionRepository for MemMentions {
    async fn insert_many(&self, mentions: Vec<NewMention>) -> Result<()> {
        let mut state = self.0.lock().unwrap();
        for m in mentions {
            let created_at = state.next_created_at();
            state.mentions.push(Mention {
                id: Uuid::new_v4(),
                artifact_id: m.artifact_id,
                entity_id: m.entity_id,
                position: m.position,
                sentiment: m.sentiment,
                score: m.score,
                created_at,
            });
        }
        Ok(())
    }

    async fn count_for_entity(&self, entity_id: Uuid) -> Result<i64> {
        let state = self.0.lock().unwrap();
        Ok(state
            .mentions
            .iter()
            .filter(|m| m.entity_id == entity_id)
            .count() as i64)
    }

    async fn list_for_artifact(&self, artifact_id: Uuid) -> Result<Vec<Mention>> {
        let state = self.0.lock().unwrap();
        let mut mentions: Vec<_> = state
            .mentions
            .iter()
            .filter(|m| m.artifact_id == artifact_id)
            .cloned()
            .collect();
        mentions.sort_by_key(|m| m.position);
        Ok(mentions)
    }
}

pub struct MemEntities(Shared);

#[async_trait]
impl EntityRepository for MemEntities {
    async fn list_all(&self) -> Result<Vec<Entity>> {
        let state = self.0.lock().unwrap();
        let mut entities: Vec<_> = state.entities.values().cloned().collect();
        entities.sort_by_key(|e| e.created_at);
        Ok(entities)
    }

    async fn insert(&self, entity: NewEntity) -> Result<Entity> {
        let mut state = self.0.lock().unwrap();
        let canonical = entity.canonical_name.to_lowercase();
        let conflict = state
            .entities
            .values()
            .any(|e| e.canonical_name == canonical || e.display_name == entity.display_name);
        if conflict {
            return Err(Error::UniqueViolation(canonical));
        }

        let created_at = state.next_created_at();
        let row = Entity {
            id: Uuid::new_v4(),
            canonical_name: canonical,
            display_name: entity.display_name,
            aliases: entity.aliases,
            category: entity.category,
            website_url: entity.website_url,
            created_at,
        };
        state.entities.insert(row.id, row.clone());
        Ok(row)
    }

    async fn find_by_canonical_name(&self, canonical_name: &str) -> Result<Option<Entity>> {
        let state = self.0.lock().unwrap();
        Ok(state
            .entities
            .values()
            .find(|e| e.canonical_name == canonical_name)
            .cloned())
    }

    async fn find_by_display_name(&self, display_name: &str) -> Result<Option<Entity>> {
        let state = self.0.lock().unwrap();
        Ok(state
            .entities
            .values()
            .find(|e| e.display_name == display_name)
            .cloned())
    }

    async fn append_alias(&self, canonical_name: &str, alias: &str) -> Result<()> {
        let mut state = self.0.lock().unwrap();
        let entity = state
            .entities
            .values_mut()
            .find(|e| e.canonical_name == canonical_name)
            .ok_or_else(|| Error::NotFound(canonical_name.to_string()))?;
        if !entity.aliases.iter().any(|a| a == alias) {
            entity.aliases.push(alias.to_string());
        }
        Ok(())
    }

    async fn list_missing_website(&self, limit: i64) -> Result<Vec<Entity>> {
        let state = self.0.lock().unwrap();
        let mut missing: Vec<_> = state
            .entities
            .values()
            .filter(|e| e.website_url.as_deref().unwrap_or("").is_empty())
            .cloned()
            .collect();
        missing.sort_by_key(|e| e.created_at);
        missing.truncate(limit.max(0) as usize);
        Ok(missing)
    }

    async fn set_website(&self, id: Uuid, website_url: &str) -> Result<Entity> {
        let mut state = self.0.lock().unwrap();
        let entity = state.entities.get_mut(&id).ok_or_else(|| Error::NotFound(id.to_string()))?;
        entity.website_url = Some(website_url.to_string());
        Ok(entity.clone())
    }

    async fn find_by_website(&self, website_url: &str) -> Result<Vec<Entity>> {
        if website_url.is_empty() {
            return Ok(Vec::new());
        }
        let state = self.0.lock().unwrap();
        let mut matching: Vec<_> = state
            .entities
            .values()
            .filter(|e| e.website_url.as_deref() == Some(website_url))
            .cloned()
            .collect();
        matching.sort_by_key(|e| e.created_at);
        Ok(matching)
    }

    async fn merge(
        &self,
        primary_id: Uuid,
        merged_ids: &[Uuid],
        merged_aliases: &[String],
    ) -> Result<Entity> {
        let mut state = self.0.lock().unwrap();
        for mention in state.mentions.iter_mut() {
            if merged_ids.contains(&mention.entity_id) {
                mention.entity_id = primary_id;
            }
        }
        for id in merged_ids {
            state.entities.remove(id);
        }
        let primary = state.entities.get_mut(&primary_id).ok_or_else(|| Error::NotFound(primary_id.to_string()))?;
        primary.aliases = merged_aliases.to_vec();
        Ok(primary.clone())
    }
}
