//! # Fetch Stage
//!
//! Pulls raw repository metadata from the GitHub API for the targets named
//! in the stage options. Per-target failures are tallied on the run context
//! and only a fully failed fetch surfaces as a stage error; the resilience
//! stack underneath handles caching, retries, and circuit breaking.

use crate::client::GitHubApi;
use crate::pipeline::stage::{PipelineStage, StageError};
use crate::pipeline::stages::RAW_REPOSITORIES_SLOT;
use crate::pipeline::types::{PipelineContext, StageConfig};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

/// One repository to fetch, as declared in the stage options
#[derive(Debug, Clone, Deserialize)]
pub struct FetchTarget {
    pub owner: String,
    pub repo: String,
}

#[derive(Debug, Deserialize)]
struct FetchOptions {
    #[serde(default)]
    targets: Vec<FetchTarget>,
}

/// Stage fetching raw repository bodies into the `raw_repositories` slot
pub struct FetchStage {
    api: GitHubApi,
}

impl FetchStage {
    pub fn new(api: GitHubApi) -> Self {
        Self { api }
    }
}

#[async_trait]
impl PipelineStage for FetchStage {
    fn name(&self) -> &str {
        "fetch"
    }

    async fn execute(
        &self,
        mut context: PipelineContext,
        config: &StageConfig,
    ) -> Result<PipelineContext, StageError> {
        let options: FetchOptions = serde_json::from_value(config.options.clone())
            .map_err(|e| StageError::new(format!("invalid fetch options: {e}")))?;

        if options.targets.is_empty() {
            return Err(StageError::new("fetch stage configured with no targets"));
        }

        let total = options.targets.len();
        let mut raw = Vec::with_capacity(total);

        for target in &options.targets {
            match self.api.get_repository(&target.owner, &target.repo).await {
                Ok(body) => raw.push(body),
                Err(err) => {
                    warn!(
                        run_id = %context.run_id,
                        owner = %target.owner,
                        repo = %target.repo,
                        error = %err,
                        "Fetch target failed"
                    );
                    context.increment_stat("fetch_failures", 1);
                }
            }
        }

        if raw.is_empty() {
            return Err(StageError::new(format!(
                "all {total} fetch targets failed"
            )));
        }

        context.increment_stat("repositories_fetched", raw.len() as i64);
        context.put(RAW_REPOSITORIES_SLOT, Value::Array(raw));
        Ok(context)
    }
}
