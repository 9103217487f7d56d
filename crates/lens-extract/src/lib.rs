//! # lens-extract
//!
//! External collaborators of the promptlens engine, behind capability
//! traits:
//!
//! - [`ExtractionBackend`]: runs one prompt against an AI assistant through
//!   a browser-automation sidecar and captures the response.
//! - [`CompletionService`]: extracts entity mentions (name, position,
//!   sentiment) from captured content via an LLM with a fixed JSON contract.
//! - [`WebsiteLookup`]: resolves an entity's official website through a
//!   SERP API, rate-limited by the caller.
//!
//! Each trait ships an HTTP implementation and a deterministic mock for
//! engine tests.

pub mod backend;
pub mod completion;
pub mod lookup;
pub mod mock;

pub use backend::{BackendRegistry, ExtractionBackend, HttpExtractionBackend, ScrapedResponse};
pub use completion::{CompletionService, HttpCompletionService};
pub use lookup::{HttpWebsiteLookup, WebsiteLookup};
pub use mock::{MockCompletionService, MockExtractionBackend, MockWebsiteLookup};
