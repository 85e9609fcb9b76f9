//! # GitHarvest - GitHub Ingestion Core
//!
//! Resilient ingestion of repository metadata from the GitHub REST API:
//! a composed API client (cache, circuit breaker, quota tracking, retries),
//! staged pipelines that normalize and persist entities, and a cron
//! scheduler that fires pipelines on persisted schedules.
//!
//! ## Overview
//!
//! Every outbound call flows through one resilience stack, so cache hits
//! skip the network, open circuits fail fast, and quota exhaustion turns
//! into bounded waits instead of 403 storms. Pipelines are plain-data
//! definitions over named stages; a stage failure is recorded on the run
//! context and the run continues. Schedules live in the database and the
//! timer registry is rebuilt from it at startup, with one overlap guard
//! per pipeline type.
//!
//! ## Architecture
//!
//! - [`client`] - Resilient GitHub API client and batch executor
//! - [`resilience`] - Per-endpoint-group circuit breakers
//! - [`pipeline`] - Stage registry, sequential runner, built-in stages
//! - [`scheduler`] - Cron timers over persisted schedule records
//! - [`models`] / [`store`] - Typed rows and idempotent persistence
//! - [`config`] / [`logging`] / [`error`] - Ambient concerns
//!
//! ## Usage
//!
//! ```rust,no_run
//! use githarvest::client::{BatchExecutor, GitHubApi};
//! use githarvest::config::ConfigManager;
//! use githarvest::pipeline::{
//!     register_builtin_pipelines, register_builtin_stages, PipelineRegistry, PipelineRunner,
//! };
//! use githarvest::scheduler::SchedulerService;
//! use githarvest::store::{InMemoryEntityStore, InMemoryScheduleStore};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ConfigManager::load()?;
//! let api = GitHubApi::new(
//!     &config.config().github,
//!     config.config().client.clone(),
//!     config.config().circuit_breaker.clone(),
//! )?;
//!
//! let registry = Arc::new(PipelineRegistry::new());
//! let entity_store = Arc::new(InMemoryEntityStore::new());
//! register_builtin_stages(
//!     &registry,
//!     api,
//!     entity_store,
//!     BatchExecutor::from_config(&config.config().batch),
//! )
//! .await;
//! register_builtin_pipelines(
//!     &registry,
//!     serde_json::json!({"targets": [{"owner": "rust-lang", "repo": "rust"}]}),
//! )
//! .await?;
//!
//! let runner = Arc::new(PipelineRunner::new(Arc::clone(&registry)));
//! let scheduler = SchedulerService::new(
//!     Arc::new(InMemoryScheduleStore::new()),
//!     runner,
//!     registry,
//! );
//! scheduler.initialize_from_database().await?;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod logging;
pub mod models;
pub mod pipeline;
pub mod resilience;
pub mod scheduler;
pub mod store;

pub use client::{ApiClientError, BatchExecutor, GitHubApi, ResilientApiClient};
pub use config::{ConfigManager, GitHarvestConfig};
pub use error::{GitHarvestError, Result};
pub use logging::init_structured_logging;
pub use pipeline::{PipelineContext, PipelineRegistry, PipelineRunner};
pub use scheduler::{RunOutcome, SchedulerError, SchedulerService};
