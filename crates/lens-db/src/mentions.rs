//! Mention repository.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use lens_core::{Error, Mention, MentionRepository, NewMention, Result, Sentiment};

/// PostgreSQL implementation of [`MentionRepository`].
pub struct PgMentionRepository {
    pool: Pool<Postgres>,
}

impl PgMentionRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    fn parse_row(row: sqlx::postgres::PgRow) -> Mention {
        let sentiment: String = row.get("sentiment");
        Mention {
            id: row.get("id"),
            artifact_id: row.get("artifact_id"),
            entity_id: row.get("entity_id"),
            position: row.get("position"),
            sentiment: Sentiment::parse(&sentiment).unwrap_or(Sentiment::Neutral),
            score: row.get("score"),
            created_at: row.get("created_at"),
        }
    }
}

#[async_trait]
impl MentionRepository for PgMentionRepository {
    async fn insert_many(&self, mentions: Vec<NewMention>) -> Result<()> {
        if mentions.is_empty() {
            return Ok(());
        }

        // One transaction so an artifact is never left partially analysed.
        let now = Utc::now();
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;

        for mention in &mentions {
            sqlx::query(
                "INSERT INTO mentions (id, artifact_id, entity_id, position, sentiment, score, created_at)
                 VALUES ($1, $2, $3, $4, $5::sentiment, $6, $7)",
            )
            .bind(Uuid::new_v4())
            .bind(mention.artifact_id)
            .bind(mention.entity_id)
            .bind(mention.position)
            .bind(mention.sentiment.as_str())
            .bind(mention.score)
            .bind(now)
            .execute(&mut *tx)
            .await
            .map_err(Error::Database)?;
        }

        tx.commit().await.map_err(Error::Database)?;
        Ok(())
    }

    async fn count_for_entity(&self, entity_id: Uuid) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM mentions WHERE entity_id = $1")
            .bind(entity_id)
            .fetch_one(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(count)
    }

    async fn list_for_artifact(&self, artifact_id: Uuid) -> Result<Vec<Mention>> {
        let rows = sqlx::query(
            "SELECT id, artifact_id, entity_id, position, sentiment::text AS sentiment,
                    score, created_at
             FROM mentions
             WHERE artifact_id = $1
             ORDER BY position ASC",
        )
        .bind(artifact_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(rows.into_iter().map(Self::parse_row).collect())
    }
}
