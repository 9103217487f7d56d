//! Work-item repository: the claim store for the scrape queue.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sqlx::{Pool, Postgres, Row};
use tracing::debug;
use uuid::Uuid;

use lens_core::defaults::BACKOFF_WINDOW_SECS;
use lens_core::{
    AiSource, ClaimedWorkItem, Error, QueueStats, Result, WorkItem, WorkItemRepository, WorkStatus,
};

/// PostgreSQL implementation of [`WorkItemRepository`].
///
/// Claiming is the only operation that touches rows owned by other workers;
/// it runs select + flip inside one transaction with `FOR UPDATE SKIP
/// LOCKED` so concurrent claimers never receive overlapping rows. Work
/// execution never happens inside that transaction.
pub struct PgWorkItemRepository {
    pool: Pool<Postgres>,
}

impl PgWorkItemRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    fn parse_row(row: sqlx::postgres::PgRow) -> WorkItem {
        let source: String = row.get("source");
        let status: String = row.get("status");
        WorkItem {
            id: row.get("id"),
            prompt_id: row.get("prompt_id"),
            source: AiSource::parse(&source).unwrap_or(AiSource::ChatGpt),
            status: WorkStatus::parse(&status).unwrap_or(WorkStatus::Pending),
            not_before: row.get("not_before"),
            error_message: row.get("error_message"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        }
    }
}

#[async_trait]
impl WorkItemRepository for PgWorkItemRepository {
    async fn enqueue(
        &self,
        prompt_id: Uuid,
        source: AiSource,
        not_before: DateTime<Utc>,
    ) -> Result<Uuid> {
        let id = Uuid::new_v4();
        let now = Utc::now();

        sqlx::query(
            "INSERT INTO work_items (id, prompt_id, source, status, not_before, created_at, updated_at)
             VALUES ($1, $2, $3::ai_source, 'pending'::work_status, $4, $5, $5)",
        )
        .bind(id)
        .bind(prompt_id)
        .bind(source.as_str())
        .bind(not_before)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(id)
    }

    async fn claim_batch(&self, source: AiSource, max_count: i64) -> Result<Vec<ClaimedWorkItem>> {
        if max_count <= 0 {
            return Ok(Vec::new());
        }

        let now = Utc::now();
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;

        // Primary tier: pending rows past their not_before gate, oldest
        // first. SKIP LOCKED keeps competing claim transactions disjoint.
        let mut rows = sqlx::query(
            "SELECT w.id, w.prompt_id, w.source::text AS source, p.content AS prompt_content
             FROM work_items w
             JOIN prompts p ON p.id = w.prompt_id
             WHERE w.status = 'pending'::work_status
               AND w.source = $1::ai_source
               AND w.not_before <= $2
             ORDER BY w.created_at ASC
             LIMIT $3
             FOR UPDATE OF w SKIP LOCKED",
        )
        .bind(source.as_str())
        .bind(now)
        .bind(max_count)
        .fetch_all(&mut *tx)
        .await
        .map_err(Error::Database)?;

        // Secondary tier: failed rows older than the backoff window, only
        // when nothing pending was eligible.
        if rows.is_empty() {
            let cutoff = now - Duration::seconds(BACKOFF_WINDOW_SECS);
            rows = sqlx::query(
                "SELECT w.id, w.prompt_id, w.source::text AS source, p.content AS prompt_content
                 FROM work_items w
                 JOIN prompts p ON p.id = w.prompt_id
                 WHERE w.status = 'failed'::work_status
                   AND w.source = $1::ai_source
                   AND w.updated_at < $2
                 ORDER BY w.created_at ASC
                 LIMIT $3
                 FOR UPDATE OF w SKIP LOCKED",
            )
            .bind(source.as_str())
            .bind(cutoff)
            .bind(max_count)
            .fetch_all(&mut *tx)
            .await
            .map_err(Error::Database)?;
        }

        if rows.is_empty() {
            tx.commit().await.map_err(Error::Database)?;
            return Ok(Vec::new());
        }

        let claimed: Vec<ClaimedWorkItem> = rows
            .into_iter()
            .map(|row| {
                let source_str: String = row.get("source");
                ClaimedWorkItem {
                    id: row.get("id"),
                    prompt_id: row.get("prompt_id"),
                    source: AiSource::parse(&source_str).unwrap_or(source),
                    prompt_content: row.get("prompt_content"),
                }
            })
            .collect();

        let ids: Vec<Uuid> = claimed.iter().map(|c| c.id).collect();
        sqlx::query(
            "UPDATE work_items
             SET status = 'running'::work_status, updated_at = $1
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
            component = "work_items",
            op = "claim_batch",
            source = %source,
            claimed = claimed.len(),
            "Claimed work items"
        );
        Ok(claimed)
    }

    async fn complete(&self, id: Uuid) -> Result<()> {
        sqlx::query(
            "UPDATE work_items
             SET status = 'completed'::work_status, updated_at = $1
             WHERE id = $2",
        )
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(())
    }

    async fn fail(&self, id: Uuid, error: &str) -> Result<()> {
        sqlx::query(
            "UPDATE work_items
             SET status = 'failed'::work_status, error_message = $1, updated_at = $2
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

    async fn get(&self, id: Uuid) -> Result<Option<WorkItem>> {
        let row = sqlx::query(
            "SELECT id, prompt_id, source::text AS source, status::text AS status,
                    not_before, error_message, created_at, updated_at
             FROM work_items WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(row.map(Self::parse_row))
    }

    async fn stats(&self) -> Result<QueueStats> {
        let row = sqlx::query(
            "SELECT
                COUNT(*) FILTER (WHERE status = 'pending') AS pending,
                COUNT(*) FILTER (WHERE status = 'running') AS running,
                COUNT(*) FILTER (WHERE status = 'completed') AS completed,
                COUNT(*) FILTER (WHERE status = 'failed') AS failed
             FROM work_items",
        )
        .fetch_one(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(QueueStats {
            pending: row.get::<i64, _>("pending"),
            running: row.get::<i64, _>("running"),
            completed: row.get::<i64, _>("completed"),
            failed: row.get::<i64, _>("failed"),
        })
    }
}
