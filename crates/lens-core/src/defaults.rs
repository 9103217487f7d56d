//! Centralized default constants for the promptlens engine.
//!
//! **This module is the single source of truth** for all shared default
//! values. The crates reference these constants instead of defining their
//! own magic numbers.

// =============================================================================
// DISPATCH
// =============================================================================

/// Fixed tick between dispatcher polls (milliseconds).
pub const POLL_INTERVAL_MS: u64 = 5_000;

/// Maximum in-flight scrape executions per source.
pub const SCRAPE_MAX_CONCURRENT: usize = 3;

/// Maximum in-flight analysis executions.
pub const ANALYSIS_MAX_CONCURRENT: usize = 5;

// =============================================================================
// RETRY / SCHEDULING
// =============================================================================

/// Minimum age of a FAILED work item before it becomes claimable again.
pub const BACKOFF_WINDOW_SECS: i64 = 3_600;

/// Delay before the follow-up work item for a completed scrape runs.
/// Each (prompt, source) pair is re-monitored on this cadence.
pub const RESCHEDULE_DELAY_SECS: i64 = 86_400;

// =============================================================================
// ENRICHMENT
// =============================================================================

/// Entities fetched per enrichment round.
pub const ENRICH_BATCH_SIZE: i64 = 10;

/// Sleep between enrichment rounds when no entity needs a website.
pub const ENRICH_IDLE_INTERVAL_SECS: u64 = 10;

/// Sleep after an enrichment round that errored.
pub const ENRICH_ERROR_BACKOFF_SECS: u64 = 5;

/// Lookup-service request budget (requests per second).
pub const ENRICH_REQUESTS_PER_SEC: u64 = 10;
