//! Engine configuration from environment variables.

use lens_core::defaults::{
    ANALYSIS_MAX_CONCURRENT, ENRICH_BATCH_SIZE, ENRICH_ERROR_BACKOFF_SECS,
    ENRICH_IDLE_INTERVAL_SECS, ENRICH_REQUESTS_PER_SEC, POLL_INTERVAL_MS, SCRAPE_MAX_CONCURRENT,
};
use lens_core::{AiSource, Error, Result};

/// Runtime configuration for the engine process.
///
/// | Variable | Default | Description |
/// |----------|---------|-------------|
/// | `DATABASE_URL` | required | Postgres connection string |
/// | `LENS_SOURCES` | all | Comma-separated sources to dispatch |
/// | `LENS_POLL_INTERVAL_MS` | `5000` | Dispatcher tick interval |
/// | `LENS_SCRAPE_MAX_CONCURRENT` | `3` | Per-source scrape slots |
/// | `LENS_ANALYSIS_MAX_CONCURRENT` | `5` | Analysis slots |
/// | `LENS_ENRICH_BATCH_SIZE` | `10` | Entities enriched per round |
/// | `LENS_ENRICH_IDLE_INTERVAL_SECS` | `10` | Sleep when nothing to enrich |
/// | `LENS_ENRICH_ERROR_BACKOFF_SECS` | `5` | Sleep after a failed round |
/// | `LENS_ENRICH_REQUESTS_PER_SEC` | `10` | Lookup rate limit |
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub database_url: String,
    pub sources: Vec<AiSource>,
    pub poll_interval_ms: u64,
    pub scrape_max_concurrent: usize,
    pub analysis_max_concurrent: usize,
    pub enrich_batch_size: i64,
    pub enrich_idle_interval_secs: u64,
    pub enrich_error_backoff_secs: u64,
    pub enrich_requests_per_sec: u64,
}

fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

impl EngineConfig {
    pub fn from_env() -> Result<Self> {
        let database_url = std::env::var("DATABASE_URL")
            .map_err(|_| Error::Config("DATABASE_URL must be set".to_string()))?;

        let sources = match std::env::var("LENS_SOURCES") {
            Ok(raw) => parse_sources(&raw)?,
            Err(_) => AiSource::ALL.to_vec(),
        };

        Ok(Self {
            database_url,
            sources,
            poll_interval_ms: env_parse("LENS_POLL_INTERVAL_MS", POLL_INTERVAL_MS),
            scrape_max_concurrent: env_parse("LENS_SCRAPE_MAX_CONCURRENT", SCRAPE_MAX_CONCURRENT)
                .max(1),
            analysis_max_concurrent: env_parse(
                "LENS_ANALYSIS_MAX_CONCURRENT",
                ANALYSIS_MAX_CONCURRENT,
            )
            .max(1),
            enrich_batch_size: env_parse("LENS_ENRICH_BATCH_SIZE", ENRICH_BATCH_SIZE).max(1),
            enrich_idle_interval_secs: env_parse(
                "LENS_ENRICH_IDLE_INTERVAL_SECS",
                ENRICH_IDLE_INTERVAL_SECS,
            ),
            enrich_error_backoff_secs: env_parse(
                "LENS_ENRICH_ERROR_BACKOFF_SECS",
                ENRICH_ERROR_BACKOFF_SECS,
            ),
            enrich_requests_per_sec: env_parse(
                "LENS_ENRICH_REQUESTS_PER_SEC",
                ENRICH_REQUESTS_PER_SEC,
            )
            .max(1),
        })
    }
}

fn parse_sources(raw: &str) -> Result<Vec<AiSource>> {
    let mut sources = Vec::new();
    for token in raw.split(',') {
        let token = token.trim();
        if token.is_empty() {
            continue;
        }
        let source = AiSource::parse(token)
            .ok_or_else(|| Error::Config(format!("unknown source \"{token}\" in LENS_SOURCES")))?;
        if !sources.contains(&source) {
            sources.push(source);
        }
    }
    if sources.is_empty() {
        return Err(Error::Config("LENS_SOURCES names no sources".to_string()));
    }
    Ok(sources)
}
