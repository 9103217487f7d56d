//! Prompt repository.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use lens_core::{Error, Prompt, PromptRepository, Result};

/// PostgreSQL implementation of [`PromptRepository`].
pub struct PgPromptRepository {
    pool: Pool<Postgres>,
}

impl PgPromptRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PromptRepository for PgPromptRepository {
    async fn insert(&self, content: &str) -> Result<Uuid> {
        let id = Uuid::new_v4();
        sqlx::query("INSERT INTO prompts (id, content, created_at) VALUES ($1, $2, $3)")
            .bind(id)
            .bind(content)
            .bind(Utc::now())
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(id)
    }

    async fn get(&self, id: Uuid) -> Result<Option<Prompt>> {
        let row = sqlx::query("SELECT id, content, created_at FROM prompts WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?;

        Ok(row.map(|row| Prompt {
            id: row.get("id"),
            content: row.get("content"),
            created_at: row.get("created_at"),
        }))
    }
}
