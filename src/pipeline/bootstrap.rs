//! # Pipeline Bootstrap
//!
//! Startup wiring: registers the built-in stage factories and the two
//! built-in pipeline definitions. The sync pipeline chains
//! fetch -> extract -> store; the enrich pipeline runs the enrich stage
//! alone. Fetch is fatal within sync because the later stages have nothing
//! to work with when it fails.

use crate::client::{BatchExecutor, GitHubApi};
use crate::pipeline::registry::PipelineRegistry;
use crate::pipeline::stages::{EnrichStage, ExtractStage, FetchStage, StoreStage};
use crate::pipeline::types::{PipelineDefinition, PipelineError, StageBinding};
use crate::store::EntityStore;
use std::sync::Arc;

/// Pipeline type handling the initial listing ingest
pub const SYNC_PIPELINE: &str = "sync";

/// Pipeline type handling the second-pass detail fill
pub const ENRICH_PIPELINE: &str = "enrich";

/// Register factories for the built-in fetch/extract/store/enrich stages
pub async fn register_builtin_stages(
    registry: &PipelineRegistry,
    api: GitHubApi,
    entity_store: Arc<dyn EntityStore>,
    batch: BatchExecutor,
) {
    {
        let api = api.clone();
        registry
            .register_stage("fetch", Arc::new(move || Arc::new(FetchStage::new(api.clone()))))
            .await;
    }

    registry
        .register_stage("extract", Arc::new(|| Arc::new(ExtractStage::new())))
        .await;

    {
        let entity_store = Arc::clone(&entity_store);
        registry
            .register_stage(
                "store",
                Arc::new(move || Arc::new(StoreStage::new(Arc::clone(&entity_store)))),
            )
            .await;
    }

    registry
        .register_stage(
            "enrich",
            Arc::new(move || {
                Arc::new(EnrichStage::new(
                    api.clone(),
                    Arc::clone(&entity_store),
                    batch.clone(),
                ))
            }),
        )
        .await;
}

/// Register the built-in sync and enrich pipeline definitions. `fetch_options`
/// carries the target list for the sync pipeline's fetch stage.
pub async fn register_builtin_pipelines(
    registry: &PipelineRegistry,
    fetch_options: serde_json::Value,
) -> Result<(), PipelineError> {
    registry
        .register_pipeline(PipelineDefinition::new(
            SYNC_PIPELINE,
            vec![
                StageBinding::new("fetch").fatal().with_options(fetch_options),
                StageBinding::new("extract"),
                StageBinding::new("store"),
            ],
        ))
        .await?;

    registry
        .register_pipeline(PipelineDefinition::new(
            ENRICH_PIPELINE,
            vec![StageBinding::new("enrich")],
        ))
        .await
}
