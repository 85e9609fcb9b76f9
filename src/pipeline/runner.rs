//! # Pipeline Runner
//!
//! Executes a pipeline's stages strictly in definition order, awaiting each
//! before starting the next. A stage failure is normalized onto the run
//! context and execution proceeds; only a stage flagged fatal aborts the
//! remaining stages. Work completed by earlier stages is never lost and the
//! host process never crashes on a stage error.

use crate::pipeline::registry::PipelineRegistry;
use crate::pipeline::types::{PipelineContext, PipelineError};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Sequential pipeline executor
pub struct PipelineRunner {
    registry: Arc<PipelineRegistry>,
}

impl PipelineRunner {
    pub fn new(registry: Arc<PipelineRegistry>) -> Self {
        Self { registry }
    }

    /// Run the named pipeline against the given context
    pub async fn run(
        &self,
        pipeline_type: &str,
        mut context: PipelineContext,
    ) -> Result<PipelineContext, PipelineError> {
        let definition = self
            .registry
            .pipeline(pipeline_type)
            .await
            .ok_or_else(|| PipelineError::UnknownPipeline(pipeline_type.to_string()))?;

        let stages = self.registry.resolve_stages(&definition).await?;

        info!(
            run_id = %context.run_id,
            pipeline_type = %pipeline_type,
            stage_count = stages.len(),
            "🚀 Pipeline run started"
        );

        for (stage, config) in stages {
            debug!(
                run_id = %context.run_id,
                stage = stage.name(),
                "Executing stage"
            );

            // Snapshot so a failing stage cannot lose earlier stages' work
            let snapshot = context.clone();
            match stage.execute(context, &config).await {
                Ok(next) => {
                    context = next;
                }
                Err(err) => {
                    if config.fatal {
                        error!(
                            run_id = %snapshot.run_id,
                            stage = stage.name(),
                            error = %err,
                            "💥 Fatal stage failure - aborting remaining stages"
                        );
                        return Err(PipelineError::FatalStage {
                            stage: stage.name().to_string(),
                            message: err.message,
                        });
                    }

                    warn!(
                        run_id = %snapshot.run_id,
                        stage = stage.name(),
                        error = %err,
                        "Stage failed - continuing with remaining stages"
                    );
                    context = snapshot;
                    let stage_name = stage.name().to_string();
                    context.record_failure(&stage_name, err.message);
                }
            }
        }

        info!(
            run_id = %context.run_id,
            pipeline_type = %pipeline_type,
            errors = context.errors.len(),
            stats = ?context.stats,
            "🏁 Pipeline run finished"
        );

        Ok(context)
    }
}
