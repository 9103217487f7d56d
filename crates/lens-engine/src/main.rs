//! lens-engine - polling dispatch engine for promptlens

use std::sync::Arc;
use std::time::Duration;

use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use lens_core::WorkItemRepository;
use lens_db::Database;
use lens_engine::{
    AnalysisDispatcher, AnalysisExecutor, EngineConfig, EnricherConfig, EntityEnricher,
    EntityRegistry, ScrapeDispatcher, ScrapeExecutor,
};
use lens_extract::{
    BackendRegistry, HttpCompletionService, HttpExtractionBackend, HttpWebsiteLookup,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "lens_engine=debug,info".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = EngineConfig::from_env()?;

    let db = Database::connect(&config.database_url).await?;
    db.migrate().await?;
    info!("Database connected and migrated");

    let stats = db.work_items.stats().await?;
    info!(
        pending = stats.pending,
        running = stats.running,
        completed = stats.completed,
        failed = stats.failed,
        "Work queue at startup"
    );

    let mut backends = BackendRegistry::new();
    for source in &config.sources {
        backends.register(
            *source,
            Arc::new(HttpExtractionBackend::from_env(*source)?),
        );
    }
    let backends = Arc::new(backends);
    let completion = Arc::new(HttpCompletionService::from_env()?);
    let lookup = Arc::new(HttpWebsiteLookup::from_env()?);

    let registry = Arc::new(EntityRegistry::initialize(db.entities.clone()).await?);

    let poll_interval = Duration::from_millis(config.poll_interval_ms);
    let mut dispatchers = Vec::new();

    let scrape_executor = Arc::new(ScrapeExecutor::new(
        db.work_items.clone(),
        db.artifacts.clone(),
        Arc::clone(&backends),
    ));
    for source in backends.sources() {
        let dispatcher = ScrapeDispatcher::new(
            source,
            db.work_items.clone(),
            Arc::clone(&scrape_executor),
            config.scrape_max_concurrent,
            poll_interval,
        );
        dispatchers.push(dispatcher.start());
    }

    let analysis_executor = Arc::new(AnalysisExecutor::new(
        db.artifacts.clone(),
        db.mentions.clone(),
        completion,
        Arc::clone(&registry),
    ));
    dispatchers.push(
        AnalysisDispatcher::new(
            db.artifacts.clone(),
            analysis_executor,
            config.analysis_max_concurrent,
            poll_interval,
        )
        .start(),
    );

    let enricher = EntityEnricher::new(
        db.entities.clone(),
        lookup,
        registry,
        EnricherConfig {
            batch_size: config.enrich_batch_size,
            idle_interval: Duration::from_secs(config.enrich_idle_interval_secs),
            error_backoff: Duration::from_secs(config.enrich_error_backoff_secs),
            requests_per_sec: config.enrich_requests_per_sec,
        },
    )
    .start();

    info!(
        sources = ?config.sources,
        "Engine running, press Ctrl-C to stop"
    );
    tokio::signal::ctrl_c().await?;
    info!("Shutting down");

    for handle in dispatchers {
        handle.shutdown().await?;
    }
    enricher.shutdown().await?;
    Ok(())
}
