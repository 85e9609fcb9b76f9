//! # Pipeline Stage Trait
//!
//! Every transformation unit implements [`PipelineStage`]. Stages receive
//! the run context by value and return the updated context, so a failing
//! stage can never corrupt the work of earlier stages.

use crate::client::ApiClientError;
use crate::pipeline::types::{PipelineContext, StageConfig};
use crate::store::StoreError;
use async_trait::async_trait;
use std::sync::Arc;

/// Error raised by a stage; the runner normalizes it onto the run context
#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct StageError {
    pub message: String,
}

impl StageError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<ApiClientError> for StageError {
    fn from(err: ApiClientError) -> Self {
        StageError::new(err.to_string())
    }
}

impl From<StoreError> for StageError {
    fn from(err: StoreError) -> Self {
        StageError::new(err.to_string())
    }
}

impl From<serde_json::Error> for StageError {
    fn from(err: serde_json::Error) -> Self {
        StageError::new(format!("serialization failure: {err}"))
    }
}

/// A named transformation step within a pipeline
#[async_trait]
pub trait PipelineStage: Send + Sync {
    /// Stage name as referenced by pipeline definitions
    fn name(&self) -> &str;

    /// Execute against the run context, returning the updated context
    async fn execute(
        &self,
        context: PipelineContext,
        config: &StageConfig,
    ) -> Result<PipelineContext, StageError>;
}

/// Factory producing stage instances; registered by name at startup
pub type StageFactory = Arc<dyn Fn() -> Arc<dyn PipelineStage> + Send + Sync>;
