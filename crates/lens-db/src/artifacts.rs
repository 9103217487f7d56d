//! Artifact repository: captured scrape results and their analysis queue.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres, Row};
use tracing::debug;
use uuid::Uuid;

use lens_core::{
    AiSource, AnalysisStatus, Artifact, ArtifactRepository, Error, NewArtifact, Result,
};

/// PostgreSQL implementation of [`ArtifactRepository`].
///
/// Analysis claiming follows the same skip-locked transaction pattern as
/// the work-item claim store, minus the backoff tier: a FAILED artifact is
/// terminal and never re-enters circulation.
pub struct PgArtifactRepository {
    pool: Pool<Postgres>,
}

impl PgArtifactRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    fn parse_row(row: sqlx::postgres::PgRow) -> Artifact {
        let source: String = row.get("source");
        let status: String = row.get("analysis_status");
        Artifact {
            id: row.get("id"),
            work_item_id: row.get("work_item_id"),
            prompt_id: row.get("prompt_id"),
            source: AiSource::parse(&source).unwrap_or(AiSource::ChatGpt),
            content: row.get("content"),
            citations: row.get("citations"),
            analysis_status: AnalysisStatus::parse(&status).unwrap_or(AnalysisStatus::Pending),
            analysed_at: row.get("analysed_at"),
            error_message: row.get("error_message"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        }
    }
}

const ARTIFACT_COLUMNS: &str = "id, work_item_id, prompt_id, source::text AS source, content, \
     citations, analysis_status::text AS analysis_status, analysed_at, error_message, \
     created_at, updated_at";

#[async_trait]
impl ArtifactRepository for PgArtifactRepository {
    async fn insert(&self, artifact: NewArtifact) -> Result<Uuid> {
        let id = Uuid::new_v4();
        let now = Utc::now();

        sqlx::query(
            "INSERT INTO artifacts
                 (id, work_item_id, prompt_id, source, content, citations,
                  analysis_status, created_at, updated_at)
             VALUES ($1, $2, $3, $4::ai_source, $5, $6, 'pending'::analysis_status, $7, $7)",
        )
        .bind(id)
        .bind(artifact.work_item_id)
        .bind(artifact.prompt_id)
        .bind(artifact.source.as_str())
        .bind(&artifact.content)
        .bind(&artifact.citations)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(id)
    }

    async fn claim_batch(&self, max_count: i64) -> Result<Vec<Artifact>> {
        if max_count <= 0 {
            return Ok(Vec::new());
        }

        let now = Utc::now();
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;

        let rows = sqlx::query(&format!(
            "SELECT {ARTIFACT_COLUMNS}
             FROM artifacts
             WHERE analysis_status = 'pending'::analysis_status
             ORDER BY created_at ASC
             LIMIT $1
             FOR UPDATE SKIP LOCKED"
        ))
        .bind(max_count)
        .fetch_all(&mut *tx)
        .await
        .map_err(Error::Database)?;

        if rows.is_empty() {
            tx.commit().await.map_err(Error::Database)?;
            return Ok(Vec::new());
        }

        let artifacts: Vec<Artifact> = rows.into_iter().map(Self::parse_row).collect();
        let ids: Vec<Uuid> = artifacts.iter().map(|a| a.id).collect();

        sqlx::query(
            "UPDATE artifacts
             SET analysis_status = 'running'::analysis_status, updated_at = $1
             WHERE id = ANY($2)",
        )
        .bind(now)
        .bind(&ids)
        .execute(&mut *tx)
        .await
        .map_err(Error::Database)?;

        tx.commit().await.map_err(Error::Database)?;

        debug!(
            subsystem = "db",
            component = "artifacts",
            op = "claim_batch",
            claimed = artifacts.len(),
            "Claimed artifacts for analysis"
        );
        Ok(artifacts)
    }

    async fn complete_analysis(&self, id: Uuid, analysed_at: DateTime<Utc>) -> Result<()> {
        sqlx::query(
            "UPDATE artifacts
             SET analysis_status = 'completed'::analysis_status, analysed_at = $1, updated_at = $2
             WHERE id = $3",
        )
        .bind(analysed_at)
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(())
    }

    async fn fail_analysis(&self, id: Uuid, error: &str) -> Result<()> {
        sqlx::query(
            "UPDATE artifacts
             SET analysis_status = 'failed'::analysis_status, error_message = $1, updated_at = $2
             WHERE id = $3",
        )
        .bind(error)
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Artifact>> {
        let row = sqlx::query(&format!(
            "SELECT {ARTIFACT_COLUMNS} FROM artifacts WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(row.map(Self::parse_row))
    }
}
