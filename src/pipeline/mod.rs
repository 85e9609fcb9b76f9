//! # Pipeline Orchestration
//!
//! Named, reusable transformation stages composed into pipeline definitions
//! and executed in order against a run context. Stage and pipeline
//! registration happens once at startup; definitions are plain data resolved
//! through the registry at run time.
//!
//! ## Architecture
//!
//! - [`types`] - Definitions, run context, and pipeline errors
//! - [`stage`] - The `PipelineStage` trait every stage implements
//! - [`registry`] - Stage factories and validated pipeline definitions
//! - [`runner`] - Sequential execution with per-stage error capture
//! - [`stages`] - The built-in fetch/extract/store/enrich stages
//! - [`bootstrap`] - Startup wiring of the built-in sync and enrich pipelines

pub mod bootstrap;
pub mod registry;
pub mod runner;
pub mod stage;
pub mod stages;
pub mod types;

pub use bootstrap::{register_builtin_pipelines, register_builtin_stages};
pub use registry::PipelineRegistry;
pub use runner::PipelineRunner;
pub use stage::{PipelineStage, StageError, StageFactory};
pub use types::{PipelineContext, PipelineDefinition, PipelineError, StageBinding, StageConfig, StageFailure};
