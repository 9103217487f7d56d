//! Entity enricher and deduplicator.
//!
//! A background loop that resolves official websites for entities still
//! missing one, then merges entities that turn out to share a website. The
//! resolved website is the dedup key: two differently-named entities with
//! the same origin are the same real-world thing.
//!
//! Lookups are paced to a fixed request rate. A rate-limited or not-found
//! lookup leaves the entity missing; it is retried on a later round.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use lens_core::defaults::{
    ENRICH_BATCH_SIZE, ENRICH_ERROR_BACKOFF_SECS, ENRICH_IDLE_INTERVAL_SECS,
    ENRICH_REQUESTS_PER_SEC,
};
use lens_core::{Entity, EntityRepository, Error, Result};
use lens_extract::WebsiteLookup;

use crate::registry::EntityRegistry;

/// Tuning for the enrichment loop.
#[derive(Debug, Clone)]
pub struct EnricherConfig {
    pub batch_size: i64,
    pub idle_interval: Duration,
    pub error_backoff: Duration,
    pub requests_per_sec: u64,
}

impl Default for EnricherConfig {
    fn default() -> Self {
        Self {
            batch_size: ENRICH_BATCH_SIZE,
            idle_interval: Duration::from_secs(ENRICH_IDLE_INTERVAL_SECS),
            error_backoff: Duration::from_secs(ENRICH_ERROR_BACKOFF_SECS),
            requests_per_sec: ENRICH_REQUESTS_PER_SEC,
        }
    }
}

/// Handle for stopping a running enricher.
pub struct EnricherHandle {
    shutdown_tx: mpsc::Sender<()>,
    task: tokio::task::JoinHandle<()>,
}

impl EnricherHandle {
    pub async fn shutdown(self) -> Result<()> {
        self.shutdown_tx
            .send(())
            .await
            .map_err(|_| Error::Internal("enricher already stopped".into()))?;
        self.task
            .await
            .map_err(|e| Error::Internal(format!("enricher task panicked: {e}")))
    }
}

pub struct EntityEnricher {
    entities: Arc<dyn EntityRepository>,
    lookup: Arc<dyn WebsiteLookup>,
    registry: Arc<EntityRegistry>,
    config: EnricherConfig,
}

impl EntityEnricher {
    pub fn new(
        entities: Arc<dyn EntityRepository>,
        lookup: Arc<dyn WebsiteLookup>,
        registry: Arc<EntityRegistry>,
        config: EnricherConfig,
    ) -> Self {
        Self {
            entities,
            lookup,
            registry,
            config,
        }
    }

    pub fn start(self) -> EnricherHandle {
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel(1);
        let task = tokio::spawn(async move {
            self.run(&mut shutdown_rx).await;
        });
        EnricherHandle { shutdown_tx, task }
    }

    async fn run(&self, shutdown_rx: &mut mpsc::Receiver<()>) {
        info!(
            subsystem = "engine",
            component = "enricher",
            batch_size = self.config.batch_size,
            requests_per_sec = self.config.requests_per_sec,
            "Entity enricher started"
        );

        loop {
            if shutdown_rx.try_recv().is_ok() {
                break;
            }

            let pause = match self.enrich_round().await {
                // Empty round: nothing is missing a website right now.
                Ok(0) => self.config.idle_interval,
                Ok(enriched) => {
                    debug!(
                        subsystem = "engine",
                        component = "enricher",
                        enriched,
                        "Enrichment round completed"
                    );
                    Duration::ZERO
                }
                Err(e) => {
                    error!(
                        subsystem = "engine",
                        component = "enricher",
                        error = %e,
                        "Enrichment round failed"
                    );
                    self.config.error_backoff
                }
            };

            if !pause.is_zero() {
                tokio::select! {
                    _ = shutdown_rx.recv() => break,
                    _ = sleep(pause) => {}
                }
            }
        }

        info!(
            subsystem = "engine",
            component = "enricher",
            "Entity enricher stopped"
        );
    }

    /// Enrich one batch of entities. Returns how many were processed (not
    /// how many resolved): a full batch of misses still counts, so the
    /// caller keeps draining instead of going idle.
    pub async fn enrich_round(&self) -> Result<usize> {
        let batch = self.entities.list_missing_website(self.config.batch_size).await?;
        if batch.is_empty() {
            return Ok(0);
        }

        let min_spacing = Duration::from_millis(1_000 / self.config.requests_per_sec.max(1));
        let mut touched_websites = BTreeSet::new();
        let processed = batch.len();

        for entity in batch {
            let started = Instant::now();
            let category = entity.category.as_deref().unwrap_or("");

            match self.lookup.find_website(&entity.display_name, category).await {
                Ok(Some(website)) => {
                    let updated = self.entities.set_website(entity.id, &website).await?;
                    self.registry.update_cache(updated).await;
                    info!(
                        subsystem = "engine",
                        component = "enricher",
                        entity_id = %entity.id,
                        website = %website,
                        "Resolved entity website"
                    );
                    touched_websites.insert(website);
                }
                Ok(None) => {
                    debug!(
                        subsystem = "engine",
                        component = "enricher",
                        entity_id = %entity.id,
                        display_name = %entity.display_name,
                        "No website found"
                    );
                }
                Err(e) => {
                    // One bad lookup must not sink the batch.
                    warn!(
                        subsystem = "engine",
                        component = "enricher",
                        entity_id = %entity.id,
                        error = %e,
                        "Website lookup failed"
                    );
                }
            }

            let elapsed = started.elapsed();
            if elapsed < min_spacing {
                sleep(min_spacing - elapsed).await;
            }
        }

        for website in &touched_websites {
            self.merge_by_website(website).await?;
        }
        Ok(processed)
    }

    /// Merge every entity sharing `website` into the oldest one.
    pub async fn merge_by_website(&self, website: &str) -> Result<()> {
        let group = self.entities.find_by_website(website).await?;
        if group.len() <= 1 {
            return Ok(());
        }

        // Oldest-created row wins as primary; its id and canonical name
        // stay stable across repeated merges.
        let mut group = group.into_iter();
        let primary = match group.next() {
            Some(entity) => entity,
            None => return Ok(()),
        };
        let merged: Vec<Entity> = group.collect();

        let mut aliases: BTreeSet<String> = primary.aliases.iter().cloned().collect();
        for entity in &merged {
            aliases.extend(entity.aliases.iter().cloned());
            aliases.insert(entity.display_name.clone());
        }
        aliases.remove(&primary.display_name);

        let merged_ids: Vec<_> = merged.iter().map(|e| e.id).collect();
        let alias_union: Vec<String> = aliases.into_iter().collect();

        let updated = self
            .entities
            .merge(primary.id, &merged_ids, &alias_union)
            .await?;

        info!(
            subsystem = "engine",
            component = "enricher",
            op = "merge_by_website",
            entity_id = %updated.id,
            website = %website,
            merged_count = merged.len(),
            "Merged duplicate entities"
        );
        self.registry.apply_merge(updated, &merged).await;
        Ok(())
    }
}
