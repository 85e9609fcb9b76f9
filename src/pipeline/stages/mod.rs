//! # Built-in Pipeline Stages
//!
//! The sync pipeline chains fetch -> extract -> store; the enrich pipeline
//! runs the single enrich stage. Stages communicate through named slots on
//! the run context so the same extract/store logic serves any upstream
//! listing source.

pub mod enrich;
pub mod extract;
pub mod fetch;
pub mod store;

pub use enrich::EnrichStage;
pub use extract::ExtractStage;
pub use fetch::FetchStage;
pub use store::StoreStage;

/// Context slot the fetch stage fills and the extract stage consumes
pub const RAW_REPOSITORIES_SLOT: &str = "raw_repositories";

/// Context slot the extract stage fills and the store stage consumes
pub const REPOSITORIES_SLOT: &str = "repositories";
