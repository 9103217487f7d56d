//! Entity repository: canonical entities, alias learning, merges.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Pool, Postgres, Row};
use tracing::info;
use uuid::Uuid;

use lens_core::{Entity, EntityRepository, Error, NewEntity, Result};

/// PostgreSQL implementation of [`EntityRepository`].
pub struct PgEntityRepository {
    pool: Pool<Postgres>,
}

const ENTITY_COLUMNS: &str =
    "id, canonical_name, display_name, aliases, category, website_url, created_at";

impl PgEntityRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    fn parse_row(row: sqlx::postgres::PgRow) -> Entity {
        Entity {
            id: row.get("id"),
            canonical_name: row.get("canonical_name"),
            display_name: row.get("display_name"),
            aliases: row.get("aliases"),
            category: row.get("category"),
            website_url: row.get("website_url"),
            created_at: row.get("created_at"),
        }
    }
}

#[async_trait]
impl EntityRepository for PgEntityRepository {
    async fn list_all(&self) -> Result<Vec<Entity>> {
        let rows = sqlx::query(&format!("SELECT {ENTITY_COLUMNS} FROM entities"))
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(rows.into_iter().map(Self::parse_row).collect())
    }

    async fn insert(&self, entity: NewEntity) -> Result<Entity> {
        let canonical = entity.canonical_name.to_lowercase();
        let result = sqlx::query(&format!(
            "INSERT INTO entities (id, canonical_name, display_name, aliases, category, website_url, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             RETURNING {ENTITY_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(&canonical)
        .bind(&entity.display_name)
        .bind(&entity.aliases)
        .bind(&entity.category)
        .bind(&entity.website_url)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await;

        match result {
            Ok(row) => Ok(Self::parse_row(row)),
            // Another worker created the row first; surface the key so the
            // caller can re-read the winner instead of failing.
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                Err(Error::UniqueViolation(canonical))
            }
            Err(e) => Err(Error::Database(e)),
        }
    }

    async fn find_by_canonical_name(&self, canonical_name: &str) -> Result<Option<Entity>> {
        let row = sqlx::query(&format!(
            "SELECT {ENTITY_COLUMNS} FROM entities WHERE canonical_name = $1"
        ))
        .bind(canonical_name)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(row.map(Self::parse_row))
    }

    async fn find_by_display_name(&self, display_name: &str) -> Result<Option<Entity>> {
        let row = sqlx::query(&format!(
            "SELECT {ENTITY_COLUMNS} FROM entities WHERE display_name = $1"
        ))
        .bind(display_name)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(row.map(Self::parse_row))
    }

    async fn append_alias(&self, canonical_name: &str, alias: &str) -> Result<()> {
        // array_append in place: concurrent appends from other processes are
        // both kept, unlike a read-modify-write of the whole array.
        sqlx::query(
            "UPDATE entities
             SET aliases = array_append(aliases, $2)
             WHERE canonical_name = $1
               AND NOT ($2 = ANY(aliases))",
        )
        .bind(canonical_name)
        .bind(alias)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(())
    }

    async fn list_missing_website(&self, limit: i64) -> Result<Vec<Entity>> {
        let rows = sqlx::query(&format!(
            "SELECT {ENTITY_COLUMNS}
             FROM entities
             WHERE website_url IS NULL OR website_url = ''
             ORDER BY created_at ASC
             LIMIT $1"
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(rows.into_iter().map(Self::parse_row).collect())
    }

    async fn set_website(&self, id: Uuid, website_url: &str) -> Result<Entity> {
        let row = sqlx::query(&format!(
            "UPDATE entities SET website_url = $2 WHERE id = $1 RETURNING {ENTITY_COLUMNS}"
        ))
        .bind(id)
        .bind(website_url)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        row.map(Self::parse_row)
            .ok_or_else(|| Error::NotFound(format!("entity {id}")))
    }

    async fn find_by_website(&self, website_url: &str) -> Result<Vec<Entity>> {
        let rows = sqlx::query(&format!(
            "SELECT {ENTITY_COLUMNS}
             FROM entities
             WHERE website_url = $1 AND website_url <> ''
             ORDER BY created_at ASC"
        ))
        .bind(website_url)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(rows.into_iter().map(Self::parse_row).collect())
    }

    async fn merge(
        &self,
        primary_id: Uuid,
        merged_ids: &[Uuid],
        merged_aliases: &[String],
    ) -> Result<Entity> {
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;

        let row = sqlx::query(&format!(
            "UPDATE entities SET aliases = $2 WHERE id = $1 RETURNING {ENTITY_COLUMNS}"
        ))
        .bind(primary_id)
        .bind(merged_aliases)
        .fetch_optional(&mut *tx)
        .await
        .map_err(Error::Database)?;

        let primary = row
            .map(Self::parse_row)
            .ok_or_else(|| Error::NotFound(format!("entity {primary_id}")))?;

        sqlx::query("UPDATE mentions SET entity_id = $1 WHERE entity_id = ANY($2)")
            .bind(primary_id)
            .bind(merged_ids)
            .execute(&mut *tx)
            .await
            .map_err(Error::Database)?;

        sqlx::query("DELETE FROM entities WHERE id = ANY($1)")
            .bind(merged_ids)
            .execute(&mut *tx)
            .await
            .map_err(Error::Database)?;

        tx.commit().await.map_err(Error::Database)?;

        info!(
            subsystem = "db",
            component = "entities",
            op = "merge",
            entity_id = %primary_id,
            merged_count = merged_ids.len(),
            "Merged duplicate entities into primary"
        );
        Ok(primary)
    }
}
