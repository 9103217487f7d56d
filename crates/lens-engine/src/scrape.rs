//! Scrape executor: runs one claimed work item against its assistant.
//!
//! Success persists the captured artifact, completes the work item, and
//! queues the next execution of the same prompt after the reschedule delay.
//! Failure marks the item FAILED with the error message; the claim store's
//! backoff tier decides when it circulates again.

use std::sync::Arc;

use chrono::Utc;
use tracing::{error, info, warn};
use uuid::Uuid;

use lens_core::defaults::RESCHEDULE_DELAY_SECS;
use lens_core::{
    ArtifactRepository, ClaimedWorkItem, Error, NewArtifact, Result, WorkItemRepository,
};
use lens_extract::BackendRegistry;

pub struct ScrapeExecutor {
    work_items: Arc<dyn WorkItemRepository>,
    artifacts: Arc<dyn ArtifactRepository>,
    backends: Arc<BackendRegistry>,
    reschedule_delay_secs: i64,
}

impl ScrapeExecutor {
    pub fn new(
        work_items: Arc<dyn WorkItemRepository>,
        artifacts: Arc<dyn ArtifactRepository>,
        backends: Arc<BackendRegistry>,
    ) -> Self {
        Self {
            work_items,
            artifacts,
            backends,
            reschedule_delay_secs: RESCHEDULE_DELAY_SECS,
        }
    }

    /// Override the follow-up delay (tests).
    pub fn with_reschedule_delay_secs(mut self, secs: i64) -> Self {
        self.reschedule_delay_secs = secs;
        self
    }

    /// Execute one claimed item, containing any failure to that item.
    pub async fn execute(&self, item: ClaimedWorkItem) {
        let started = std::time::Instant::now();
        let item_id = item.id;
        let source = item.source;

        match self.run(&item).await {
            Ok(artifact_id) => {
                info!(
                    subsystem = "engine",
                    component = "scrape_executor",
                    work_item_id = %item_id,
                    artifact_id = %artifact_id,
                    source = %source,
                    duration_ms = started.elapsed().as_millis() as u64,
                    "Scrape completed"
                );
            }
            Err(e) => {
                warn!(
                    subsystem = "engine",
                    component = "scrape_executor",
                    work_item_id = %item_id,
                    source = %source,
                    error = %e,
                    "Scrape failed"
                );
                if let Err(mark_err) = self.work_items.fail(item_id, &e.to_string()).await {
                    // The row stays RUNNING; nothing reclaims it until an
                    // operator intervenes.
                    error!(
                        subsystem = "engine",
                        component = "scrape_executor",
                        work_item_id = %item_id,
                        error = %mark_err,
                        "Failed to mark work item failed"
                    );
                }
            }
        }
    }

    async fn run(&self, item: &ClaimedWorkItem) -> Result<Uuid> {
        let backend = self.backends.get(item.source).ok_or_else(|| {
            Error::Config(format!("no extraction backend for source {}", item.source))
        })?;

        let response = backend.get_response(&item.prompt_content).await?;

        let artifact_id = self
            .artifacts
            .insert(NewArtifact {
                work_item_id: item.id,
                prompt_id: item.prompt_id,
                source: item.source,
                content: response.content,
                citations: response.citations,
            })
            .await?;

        self.work_items.complete(item.id).await?;

        // Keep the prompt under continuous monitoring.
        let next_run = Utc::now() + chrono::Duration::seconds(self.reschedule_delay_secs);
        self.work_items
            .enqueue(item.prompt_id, item.source, next_run)
            .await?;

        Ok(artifact_id)
    }
}
