//! # lens-db
//!
//! PostgreSQL persistence layer for the promptlens engine.
//!
//! This crate provides:
//! - Connection pool management
//! - The claim store for work items and artifacts (`FOR UPDATE SKIP LOCKED`)
//! - Repository implementations for prompts, entities, and mentions
//!
//! ## Example
//!
//! ```rust,ignore
//! use lens_db::Database;
//! use lens_core::{AiSource, PromptRepository, WorkItemRepository};
//!
//! let db = Database::connect("postgres://localhost/lens").await?;
//! db.migrate().await?;
//!
//! let prompt_id = db.prompts.insert("best CRM tools").await?;
//! db.work_items
//!     .enqueue(prompt_id, AiSource::ChatGpt, chrono::Utc::now())
//!     .await?;
//! ```

pub mod artifacts;
pub mod entities;
pub mod mentions;
pub mod pool;
pub mod prompts;
pub mod work_items;

// Test fixtures for integration tests.
// Always compiled so integration tests (in tests/) can use them.
pub mod test_fixtures;

use std::sync::Arc;

use sqlx::PgPool;

// Re-export core types
pub use lens_core::*;

pub use artifacts::PgArtifactRepository;
pub use entities::PgEntityRepository;
pub use mentions::PgMentionRepository;
pub use pool::PoolConfig;
pub use prompts::PgPromptRepository;
pub use work_items::PgWorkItemRepository;

/// Aggregated database handle with one repository per table.
#[derive(Clone)]
pub struct Database {
    pub pool: PgPool,
    pub prompts: Arc<PgPromptRepository>,
    pub work_items: Arc<PgWorkItemRepository>,
    pub artifacts: Arc<PgArtifactRepository>,
    pub mentions: Arc<PgMentionRepository>,
    pub entities: Arc<PgEntityRepository>,
}

impl Database {
    /// Connect with default pool configuration.
    pub async fn connect(database_url: &str) -> Result<Self> {
        Self::connect_with_config(database_url, PoolConfig::default()).await
    }

    /// Connect with custom pool configuration.
    pub async fn connect_with_config(database_url: &str, config: PoolConfig) -> Result<Self> {
        let pool = pool::connect_pool(database_url, &config).await?;
        Ok(Self::from_pool(pool))
    }

    /// Build repositories around an existing pool.
    pub fn from_pool(pool: PgPool) -> Self {
        Self {
            prompts: Arc::new(PgPromptRepository::new(pool.clone())),
            work_items: Arc::new(PgWorkItemRepository::new(pool.clone())),
            artifacts: Arc::new(PgArtifactRepository::new(pool.clone())),
            mentions: Arc::new(PgMentionRepository::new(pool.clone())),
            entities: Arc::new(PgEntityRepository::new(pool.clone())),
            pool,
        }
    }

    /// Apply pending schema migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| Error::Internal(format!("migration failed: {e}")))?;
        Ok(())
    }
}
