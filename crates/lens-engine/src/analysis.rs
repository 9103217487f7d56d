//! Analysis executor: extracts and resolves mentions from one artifact.
//!
//! All mentions of an artifact are resolved and scored before any row is
//! written, then persisted in one transaction, so a failed analysis leaves
//! no partial mention set behind. A FAILED analysis is terminal.

use std::sync::Arc;

use chrono::Utc;
use tracing::{error, info, warn};

use lens_core::scoring::mention_score;
use lens_core::{Artifact, ArtifactRepository, MentionRepository, NewMention, Result};
use lens_extract::CompletionService;

use crate::registry::EntityRegistry;

pub struct AnalysisExecutor {
    artifacts: Arc<dyn ArtifactRepository>,
    mentions: Arc<dyn MentionRepository>,
    completion: Arc<dyn CompletionService>,
    registry: Arc<EntityRegistry>,
}

impl AnalysisExecutor {
    pub fn new(
        artifacts: Arc<dyn ArtifactRepository>,
        mentions: Arc<dyn MentionRepository>,
        completion: Arc<dyn CompletionService>,
        registry: Arc<EntityRegistry>,
    ) -> Self {
        Self {
            artifacts,
            mentions,
            completion,
            registry,
        }
    }

    /// Analyse one claimed artifact, containing any failure to that artifact.
    pub async fn execute(&self, artifact: Artifact) {
        let started = std::time::Instant::now();
        let artifact_id = artifact.id;

        match self.run(&artifact).await {
            Ok(mention_count) => {
                info!(
                    subsystem = "engine",
                    component = "analysis_executor",
                    artifact_id = %artifact_id,
                    mention_count,
                    duration_ms = started.elapsed().as_millis() as u64,
                    "Analysis completed"
                );
            }
            Err(e) => {
                warn!(
                    subsystem = "engine",
                    component = "analysis_executor",
                    artifact_id = %artifact_id,
                    error = %e,
                    "Analysis failed"
                );
                if let Err(mark_err) = self.artifacts.fail_analysis(artifact_id, &e.to_string()).await
                {
                    error!(
                        subsystem = "engine",
                        component = "analysis_executor",
                        artifact_id = %artifact_id,
                        error = %mark_err,
                        "Failed to mark analysis failed"
                    );
                }
            }
        }
    }

    async fn run(&self, artifact: &Artifact) -> Result<usize> {
        let raw_mentions = self.completion.extract_mentions(&artifact.content).await?;

        let mut new_mentions = Vec::with_capacity(raw_mentions.len());
        for raw in &raw_mentions {
            let entity = self.registry.resolve(raw).await?;
            let score = mention_score(raw.position, raw.sentiment)?;
            new_mentions.push(NewMention {
                artifact_id: artifact.id,
                entity_id: entity.id,
                position: raw.position,
                sentiment: raw.sentiment,
                score,
            });
        }

        let count = new_mentions.len();
        self.mentions.insert_many(new_mentions).await?;
        self.artifacts
            .complete_analysis(artifact.id, Utc::now())
            .await?;
        Ok(count)
    }
}
