//! # Extract Stage
//!
//! Normalizes raw GitHub response bodies into typed rows ready for upsert.
//! Malformed entries are skipped and tallied rather than failing the run;
//! upstream payloads drift and one bad record must not block the rest.

use crate::models::NewRepository;
use crate::pipeline::stage::{PipelineStage, StageError};
use crate::pipeline::stages::{RAW_REPOSITORIES_SLOT, REPOSITORIES_SLOT};
use crate::pipeline::types::{PipelineContext, StageConfig};
use async_trait::async_trait;
use serde_json::Value;
use tracing::warn;

/// Stage mapping `raw_repositories` into typed `repositories`
pub struct ExtractStage;

impl ExtractStage {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ExtractStage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PipelineStage for ExtractStage {
    fn name(&self) -> &str {
        "extract"
    }

    async fn execute(
        &self,
        mut context: PipelineContext,
        _config: &StageConfig,
    ) -> Result<PipelineContext, StageError> {
        let raw = context
            .take(RAW_REPOSITORIES_SLOT)
            .ok_or_else(|| StageError::new("no raw repositories to extract"))?;

        let Value::Array(entries) = raw else {
            return Err(StageError::new("raw repositories slot is not an array"));
        };

        let mut rows: Vec<NewRepository> = Vec::with_capacity(entries.len());
        for entry in &entries {
            match NewRepository::from_github_json(entry) {
                Some(row) => rows.push(row),
                None => {
                    warn!(
                        run_id = %context.run_id,
                        "Skipping repository entry with missing identity fields"
                    );
                    context.increment_stat("extract_skipped", 1);
                }
            }
        }

        context.increment_stat("repositories_extracted", rows.len() as i64);
        context.put(REPOSITORIES_SLOT, serde_json::to_value(rows)?);
        Ok(context)
    }
}
