//! # lens-core
//!
//! Core types, traits, and abstractions for the promptlens engine.
//!
//! This crate provides the foundational data structures and trait definitions
//! that the other promptlens crates depend on: the work-queue and artifact
//! models, the entity ("brand") model, the repository traits implemented by
//! `lens-db`, and the mention scoring formula.

pub mod defaults;
pub mod error;
pub mod models;
pub mod scoring;
pub mod traits;

// Re-export commonly used types at crate root
pub use error::{Error, Result};
pub use models::{
    AiSource, AnalysisStatus, Artifact, ClaimedWorkItem, Entity, Mention, NewArtifact, NewEntity,
    NewMention, Prompt, QueueStats, RawMention, Sentiment, WorkItem, WorkStatus,
};
pub use scoring::mention_score;
pub use traits::{
    ArtifactRepository, EntityRepository, MentionRepository, PromptRepository, WorkItemRepository,
};
