//! # lens-engine
//!
//! The promptlens execution engine: polling dispatchers over the Postgres
//! claim store, bounded-concurrency executors for scraping and analysis,
//! and the entity registry and enricher that keep mention targets canonical.
//!
//! The engine has no coordinator: any number of engine processes can run
//! against the same database, with the claim store's skip-locked batches as
//! the only synchronization point.

pub mod analysis;
pub mod config;
pub mod dispatcher;
pub mod enricher;
pub mod gate;
pub mod registry;
pub mod scrape;

pub use analysis::AnalysisExecutor;
pub use config::EngineConfig;
pub use dispatcher::{AnalysisDispatcher, DispatcherHandle, ScrapeDispatcher};
pub use enricher::{EnricherConfig, EnricherHandle, EntityEnricher};
pub use gate::{ConcurrencyGate, GatePermit};
pub use registry::EntityRegistry;
pub use scrape::ScrapeExecutor;
