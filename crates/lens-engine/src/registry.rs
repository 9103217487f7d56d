//! Entity registry: in-memory resolution cache over the entity store.
//!
//! The registry turns raw mention names into canonical entities. It keeps
//! two maps: canonical name → entity, and lowercased alias → canonical
//! name. Both are rebuilt from the store at startup and kept current as
//! entities are created, aliased, enriched, and merged.
//!
//! Creation is race-safe without locks across processes: the store's
//! unique constraint arbitrates, and a loser of the race re-reads the
//! winner's row instead of failing.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, info};

use lens_core::{Entity, EntityRepository, Error, NewEntity, RawMention, Result};

#[derive(Default)]
struct Caches {
    by_canonical: HashMap<String, Entity>,
    alias_to_canonical: HashMap<String, String>,
}

impl Caches {
    fn lookup(&self, name: &str) -> Option<&Entity> {
        if let Some(entity) = self.by_canonical.get(name) {
            return Some(entity);
        }
        self.alias_to_canonical
            .get(name)
            .and_then(|canonical| self.by_canonical.get(canonical))
    }

    fn index(&mut self, entity: Entity) {
        let canonical = entity.canonical_name.clone();
        self.alias_to_canonical
            .insert(entity.display_name.to_lowercase(), canonical.clone());
        for alias in &entity.aliases {
            self.alias_to_canonical
                .insert(alias.to_lowercase(), canonical.clone());
        }
        self.by_canonical.insert(canonical, entity);
    }
}

/// Shared resolution cache over the canonical entity store.
pub struct EntityRegistry {
    repo: Arc<dyn EntityRepository>,
    caches: RwLock<Caches>,
}

impl EntityRegistry {
    /// Build the registry by loading every entity from the store.
    pub async fn initialize(repo: Arc<dyn EntityRepository>) -> Result<Self> {
        let entities = repo.list_all().await?;
        let mut caches = Caches::default();
        let count = entities.len();
        for entity in entities {
            caches.index(entity);
        }

        info!(
            subsystem = "engine",
            component = "entity_registry",
            entity_count = count,
            alias_count = caches.alias_to_canonical.len(),
            "Entity registry initialized"
        );
        Ok(Self {
            repo,
            caches: RwLock::new(caches),
        })
    }

    /// Look up a name against the cache: lowercase and trim, then check
    /// canonical names, then aliases.
    pub async fn normalize(&self, name: &str) -> Option<Entity> {
        let key = name.trim().to_lowercase();
        self.caches.read().await.lookup(&key).cloned()
    }

    /// Resolve a raw mention to a canonical entity, creating one when no
    /// known name matches. The exact surface text is learned as an alias
    /// whenever it differs from the entity's display name.
    pub async fn resolve(&self, raw: &RawMention) -> Result<Entity> {
        let surface = raw.surface_name.trim();

        let cached = match self.normalize(surface).await {
            Some(entity) => Some(entity),
            None => self.normalize(&raw.normalized_name).await,
        };

        let entity = match cached {
            Some(entity) => entity,
            None => {
                self.create_entity(NewEntity {
                    canonical_name: raw.normalized_name.trim().to_lowercase(),
                    display_name: surface.to_string(),
                    aliases: Vec::new(),
                    category: None,
                    website_url: None,
                })
                .await?
            }
        };

        if !surface.eq_ignore_ascii_case(&entity.display_name) {
            self.learn_alias(&entity.canonical_name, surface).await?;
        }
        Ok(entity)
    }

    /// Create an entity, converging with concurrent creators: a unique
    /// violation means another writer won, so re-read the winner.
    pub async fn create_entity(&self, candidate: NewEntity) -> Result<Entity> {
        let canonical = candidate.canonical_name.to_lowercase();
        let display = candidate.display_name.clone();

        let entity = match self.repo.insert(candidate).await {
            Ok(entity) => {
                debug!(
                    subsystem = "engine",
                    component = "entity_registry",
                    op = "create_entity",
                    entity_id = %entity.id,
                    canonical_name = %entity.canonical_name,
                    "Created entity"
                );
                entity
            }
            Err(Error::UniqueViolation(_)) => {
                // Lost the creation race; the conflicting row may key on
                // either unique column.
                match self.repo.find_by_canonical_name(&canonical).await? {
                    Some(entity) => entity,
                    None => self
                        .repo
                        .find_by_display_name(&display)
                        .await?
                        .ok_or_else(|| {
                            Error::Internal(format!(
                                "entity \"{canonical}\" conflicted on insert but cannot be re-read"
                            ))
                        })?,
                }
            }
            Err(e) => return Err(e),
        };

        self.update_cache(entity.clone()).await;
        Ok(entity)
    }

    /// Record an alternate surface form for an entity. Already-known
    /// aliases are a no-op.
    pub async fn learn_alias(&self, canonical_name: &str, alias: &str) -> Result<()> {
        let alias_key = alias.to_lowercase();
        {
            let caches = self.caches.read().await;
            if alias_key == canonical_name || caches.alias_to_canonical.contains_key(&alias_key) {
                return Ok(());
            }
        }

        self.repo.append_alias(canonical_name, alias).await?;

        let mut caches = self.caches.write().await;
        caches
            .alias_to_canonical
            .insert(alias_key, canonical_name.to_string());
        if let Some(entity) = caches.by_canonical.get_mut(canonical_name) {
            if !entity.aliases.iter().any(|a| a.eq_ignore_ascii_case(alias)) {
                entity.aliases.push(alias.to_string());
            }
        }
        debug!(
            subsystem = "engine",
            component = "entity_registry",
            op = "learn_alias",
            canonical_name = %canonical_name,
            alias = %alias,
            "Learned alias"
        );
        Ok(())
    }

    /// Refresh the cached row for an entity (after enrichment or any other
    /// out-of-band update).
    pub async fn update_cache(&self, entity: Entity) {
        let mut caches = self.caches.write().await;
        caches.index(entity);
    }

    /// Apply a completed merge: drop the merged entities, re-point their
    /// alias entries at the primary, and re-index the updated primary.
    pub async fn apply_merge(&self, primary: Entity, merged: &[Entity]) {
        let mut caches = self.caches.write().await;
        for entity in merged {
            caches.by_canonical.remove(&entity.canonical_name);
        }
        let merged_canonicals: Vec<&str> =
            merged.iter().map(|e| e.canonical_name.as_str()).collect();
        for target in caches.alias_to_canonical.values_mut() {
            if merged_canonicals.contains(&target.as_str()) {
                *target = primary.canonical_name.clone();
            }
        }
        caches.index(primary);
    }

    /// Cached entity count (diagnostics).
    pub async fn entity_count(&self) -> usize {
        self.caches.read().await.by_canonical.len()
    }
}
