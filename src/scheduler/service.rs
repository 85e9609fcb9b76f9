//! # Scheduler Service
//!
//! Cron-driven pipeline triggering. Persisted schedule records are the
//! single source of truth; the in-memory timer registry is a derived cache
//! rebuilt from the database at startup. Each active schedule owns one timer
//! task that arms itself for the next fire time and spawns the actual run
//! detached, so a slow run never delays the timer rearm and deleting a
//! schedule never cancels an in-flight run.
//!
//! ## Overlap Guard
//!
//! At most one run per pipeline type executes at a time. The guard is
//! acquired atomically in the store (`try_mark_running`), so concurrent
//! timers and manual triggers across processes cannot both win. A fire that
//! loses the guard is skipped, not queued.

use crate::models::{NewSchedule, ScheduleRecord, ScheduleUpdate};
use crate::pipeline::{PipelineContext, PipelineRegistry, PipelineRunner};
use crate::scheduler::cron::{self, CronError};
use crate::store::{ScheduleStore, StoreError};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Scheduler-level failures
#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    #[error("Invalid schedule: {0}")]
    Validation(String),

    #[error("Schedule not found: {0}")]
    NotFound(Uuid),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<CronError> for SchedulerError {
    fn from(err: CronError) -> Self {
        SchedulerError::Validation(err.to_string())
    }
}

/// What happened when a schedule fired or was triggered manually
#[derive(Debug)]
pub enum RunOutcome {
    /// The pipeline ran to completion (possibly with non-fatal stage errors
    /// recorded on the context)
    Completed(PipelineContext),
    /// A fatal stage aborted the run; the schedule stays active
    Failed { message: String },
    /// Another run of the same pipeline type held the overlap guard
    SkippedOverlap,
    /// The schedule is soft-disabled
    SkippedInactive,
}

/// Cron scheduler over persisted schedule records
pub struct SchedulerService {
    store: Arc<dyn ScheduleStore>,
    runner: Arc<PipelineRunner>,
    registry: Arc<PipelineRegistry>,
    timers: Mutex<HashMap<Uuid, JoinHandle<()>>>,
}

impl SchedulerService {
    pub fn new(
        store: Arc<dyn ScheduleStore>,
        runner: Arc<PipelineRunner>,
        registry: Arc<PipelineRegistry>,
    ) -> Arc<Self> {
        Arc::new(Self {
            store,
            runner,
            registry,
            timers: Mutex::new(HashMap::new()),
        })
    }

    /// Rebuild the timer registry from the database. Clears `is_running`
    /// flags orphaned by a previous process, then arms a timer for every
    /// active schedule. Returns how many timers were armed.
    pub async fn initialize_from_database(self: &Arc<Self>) -> Result<usize, SchedulerError> {
        let cleared = self.store.clear_running_flags().await?;
        if cleared > 0 {
            warn!(cleared, "Cleared stale running flags from previous process");
        }

        let records = self.store.list(true).await?;
        let count = records.len();
        for record in records {
            self.arm_timer(&record).await;
        }

        info!(timers = count, "⏰ Scheduler initialized from database");
        Ok(count)
    }

    /// Validate and persist a new schedule, arming its timer when active
    pub async fn schedule_job(
        self: &Arc<Self>,
        spec: NewSchedule,
    ) -> Result<ScheduleRecord, SchedulerError> {
        if spec.name.trim().is_empty() {
            return Err(SchedulerError::Validation(
                "schedule name must not be empty".to_string(),
            ));
        }
        cron::parse_cron(&spec.cron_expression)?;
        cron::parse_time_zone(&spec.time_zone)?;
        if !self.registry.has_pipeline(&spec.pipeline_type).await {
            return Err(SchedulerError::Validation(format!(
                "unknown pipeline type '{}'",
                spec.pipeline_type
            )));
        }

        let next_run_at =
            cron::next_fire_time(&spec.cron_expression, &spec.time_zone, Utc::now())?;
        let record = spec.into_record(next_run_at);
        self.store.insert(&record).await?;

        info!(
            schedule_id = %record.id,
            name = %record.name,
            pipeline_type = %record.pipeline_type,
            cron = %record.cron_expression,
            "Schedule created"
        );

        if record.is_active {
            self.arm_timer(&record).await;
        }
        Ok(record)
    }

    /// Apply a partial update. Timer-affecting changes (cron, time zone,
    /// active flag) are written through to the database first, then the
    /// timer is rebuilt from the updated record.
    pub async fn update_schedule(
        self: &Arc<Self>,
        id: Uuid,
        patch: ScheduleUpdate,
    ) -> Result<ScheduleRecord, SchedulerError> {
        if let Some(expression) = &patch.cron_expression {
            cron::parse_cron(expression)?;
        }
        if let Some(time_zone) = &patch.time_zone {
            cron::parse_time_zone(time_zone)?;
        }

        let updated = self.store.update(id, &patch).await.map_err(|e| match e {
            StoreError::NotFound(id) => SchedulerError::NotFound(id),
            other => SchedulerError::Store(other),
        })?;

        if patch.affects_timer() {
            self.disarm_timer(id).await;
            if updated.is_active {
                self.arm_timer(&updated).await;
            } else {
                self.store.set_next_run_at(id, None).await?;
            }
        }

        info!(schedule_id = %id, "Schedule updated");
        Ok(updated)
    }

    /// Cancel the timer and hard-delete the record. An in-flight run keeps
    /// going; only the future firing is cancelled. Returns false when the
    /// id was unknown.
    pub async fn delete_schedule(&self, id: Uuid) -> Result<bool, SchedulerError> {
        self.disarm_timer(id).await;
        let deleted = self.store.delete(id).await?;
        if deleted {
            info!(schedule_id = %id, "Schedule deleted");
        }
        Ok(deleted)
    }

    /// Fire a schedule now, outside its cron cadence. Subject to the same
    /// overlap guard as timer fires.
    pub async fn trigger_job(self: &Arc<Self>, id: Uuid) -> Result<RunOutcome, SchedulerError> {
        if self.store.find_by_id(id).await?.is_none() {
            return Err(SchedulerError::NotFound(id));
        }
        self.execute_run(id).await
    }

    pub async fn get_schedule(&self, id: Uuid) -> Result<ScheduleRecord, SchedulerError> {
        self.store
            .find_by_id(id)
            .await?
            .ok_or(SchedulerError::NotFound(id))
    }

    pub async fn get_schedules(
        &self,
        active_only: bool,
    ) -> Result<Vec<ScheduleRecord>, SchedulerError> {
        Ok(self.store.list(active_only).await?)
    }

    /// Cancel every timer. Detached in-flight runs are left to finish.
    pub async fn shutdown(&self) {
        let mut timers = self.timers.lock().await;
        for (_, handle) in timers.drain() {
            handle.abort();
        }
        info!("Scheduler timers cancelled");
    }

    /// Arm (or re-arm) the timer task for a schedule
    async fn arm_timer(self: &Arc<Self>, record: &ScheduleRecord) {
        self.disarm_timer(record.id).await;

        let service = Arc::clone(self);
        let id = record.id;
        let handle = tokio::spawn(async move {
            loop {
                let record = match service.store.find_by_id(id).await {
                    Ok(Some(record)) if record.is_active => record,
                    _ => break,
                };

                let next = match cron::next_fire_time(
                    &record.cron_expression,
                    &record.time_zone,
                    Utc::now(),
                ) {
                    Ok(Some(next)) => next,
                    Ok(None) => {
                        warn!(schedule_id = %id, "Cron expression has no future occurrence");
                        break;
                    }
                    Err(e) => {
                        error!(schedule_id = %id, error = %e, "Stored cron expression unparseable");
                        break;
                    }
                };

                if let Err(e) = service.store.set_next_run_at(id, Some(next)).await {
                    error!(schedule_id = %id, error = %e, "Failed to persist next fire time");
                }

                let wait = (next - Utc::now()).to_std().unwrap_or(Duration::ZERO);
                tokio::time::sleep(wait).await;

                // Detached: a slow run must not delay the rearm, and
                // cancelling this timer must not kill the run
                let run_service = Arc::clone(&service);
                tokio::spawn(async move {
                    if let Err(e) = run_service.execute_run(id).await {
                        error!(schedule_id = %id, error = %e, "Scheduled run failed");
                    }
                });
            }
        });

        self.timers.lock().await.insert(id, handle);
    }

    async fn disarm_timer(&self, id: Uuid) {
        if let Some(handle) = self.timers.lock().await.remove(&id) {
            handle.abort();
        }
    }

    /// One guarded run of a schedule's pipeline. Pipeline failures are
    /// logged and reported in the outcome; they never deactivate the
    /// schedule, and the overlap guard is always released.
    async fn execute_run(self: &Arc<Self>, id: Uuid) -> Result<RunOutcome, SchedulerError> {
        let record = self
            .store
            .find_by_id(id)
            .await?
            .ok_or(SchedulerError::NotFound(id))?;

        if !record.is_active {
            info!(schedule_id = %id, "Skipping run: schedule is inactive");
            return Ok(RunOutcome::SkippedInactive);
        }

        if !self.store.try_mark_running(id).await? {
            warn!(
                schedule_id = %id,
                pipeline_type = %record.pipeline_type,
                "⏭️ Skipping run: another run of this pipeline type is in progress"
            );
            return Ok(RunOutcome::SkippedOverlap);
        }

        info!(
            schedule_id = %id,
            pipeline_type = %record.pipeline_type,
            "▶️ Schedule fired"
        );

        let context = PipelineContext::new(&record.pipeline_type);
        let result = self.runner.run(&record.pipeline_type, context).await;

        let now = Utc::now();
        let next = cron::next_fire_time(&record.cron_expression, &record.time_zone, now)
            .ok()
            .flatten();
        self.store.complete_run(id, now, next).await?;

        match result {
            Ok(context) => {
                if context.is_clean() {
                    info!(
                        schedule_id = %id,
                        run_id = %context.run_id,
                        "✅ Scheduled run completed"
                    );
                } else {
                    warn!(
                        schedule_id = %id,
                        run_id = %context.run_id,
                        errors = context.errors.len(),
                        "Scheduled run completed with stage errors"
                    );
                }
                Ok(RunOutcome::Completed(context))
            }
            Err(e) => {
                error!(schedule_id = %id, error = %e, "Scheduled run aborted");
                Ok(RunOutcome::Failed {
                    message: e.to_string(),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::stage::{PipelineStage, StageError};
    use crate::pipeline::types::{PipelineDefinition, StageBinding, StageConfig};
    use crate::store::InMemoryScheduleStore;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingStage {
        runs: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl PipelineStage for CountingStage {
        fn name(&self) -> &str {
            "counting"
        }

        async fn execute(
            &self,
            context: PipelineContext,
            _config: &StageConfig,
        ) -> Result<PipelineContext, StageError> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            Ok(context)
        }
    }

    async fn service_with_pipeline(
        pipeline_type: &str,
    ) -> (Arc<SchedulerService>, Arc<InMemoryScheduleStore>, Arc<AtomicUsize>) {
        let runs = Arc::new(AtomicUsize::new(0));
        let registry = Arc::new(PipelineRegistry::new());
        {
            let runs = Arc::clone(&runs);
            registry
                .register_stage(
                    "counting",
                    Arc::new(move || {
                        Arc::new(CountingStage {
                            runs: Arc::clone(&runs),
                        })
                    }),
                )
                .await;
        }
        registry
            .register_pipeline(PipelineDefinition::new(
                pipeline_type,
                vec![StageBinding::new("counting")],
            ))
            .await
            .unwrap();

        let store = Arc::new(InMemoryScheduleStore::new());
        let runner = Arc::new(PipelineRunner::new(Arc::clone(&registry)));
        let service = SchedulerService::new(store.clone(), runner, registry);
        (service, store, runs)
    }

    fn spec(pipeline_type: &str, cron_expression: &str) -> NewSchedule {
        NewSchedule {
            name: format!("{pipeline_type}-schedule"),
            pipeline_type: pipeline_type.to_string(),
            cron_expression: cron_expression.to_string(),
            time_zone: "UTC".to_string(),
            is_active: true,
        }
    }

    #[tokio::test]
    async fn test_schedule_job_validates_inputs() {
        let (service, _store, _runs) = service_with_pipeline("sync").await;

        let bad_cron = spec("sync", "not a cron");
        assert!(matches!(
            service.schedule_job(bad_cron).await,
            Err(SchedulerError::Validation(_))
        ));

        let bad_pipeline = spec("unknown", "*/5 * * * *");
        assert!(matches!(
            service.schedule_job(bad_pipeline).await,
            Err(SchedulerError::Validation(_))
        ));

        let mut bad_tz = spec("sync", "*/5 * * * *");
        bad_tz.time_zone = "Mars/Olympus_Mons".to_string();
        assert!(matches!(
            service.schedule_job(bad_tz).await,
            Err(SchedulerError::Validation(_))
        ));

        service.shutdown().await;
    }

    #[tokio::test]
    async fn test_schedule_job_persists_with_next_fire_time() {
        let (service, store, _runs) = service_with_pipeline("sync").await;

        let record = service.schedule_job(spec("sync", "0 2 * * *")).await.unwrap();
        assert!(record.next_run_at.is_some());
        assert!(!record.is_running);

        let stored = store.find_by_id(record.id).await.unwrap().unwrap();
        assert_eq!(stored.cron_expression, "0 2 * * *");

        service.shutdown().await;
    }

    #[tokio::test]
    async fn test_trigger_runs_pipeline_and_releases_guard() {
        let (service, store, runs) = service_with_pipeline("sync").await;
        let record = service.schedule_job(spec("sync", "0 2 * * *")).await.unwrap();

        let outcome = service.trigger_job(record.id).await.unwrap();
        assert!(matches!(outcome, RunOutcome::Completed(_)));
        assert_eq!(runs.load(Ordering::SeqCst), 1);

        let stored = store.find_by_id(record.id).await.unwrap().unwrap();
        assert!(!stored.is_running);
        assert!(stored.last_run_at.is_some());

        service.shutdown().await;
    }

    #[tokio::test]
    async fn test_trigger_skips_when_guard_held() {
        let (service, store, runs) = service_with_pipeline("sync").await;
        let record = service.schedule_job(spec("sync", "0 2 * * *")).await.unwrap();

        // Simulate another in-flight run of the same pipeline type
        assert!(store.try_mark_running(record.id).await.unwrap());

        let outcome = service.trigger_job(record.id).await.unwrap();
        assert!(matches!(outcome, RunOutcome::SkippedOverlap));
        assert_eq!(runs.load(Ordering::SeqCst), 0);

        service.shutdown().await;
    }

    #[tokio::test]
    async fn test_trigger_skips_inactive_schedule() {
        let (service, _store, runs) = service_with_pipeline("sync").await;
        let record = service.schedule_job(spec("sync", "0 2 * * *")).await.unwrap();

        service
            .update_schedule(
                record.id,
                ScheduleUpdate {
                    is_active: Some(false),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let outcome = service.trigger_job(record.id).await.unwrap();
        assert!(matches!(outcome, RunOutcome::SkippedInactive));
        assert_eq!(runs.load(Ordering::SeqCst), 0);

        service.shutdown().await;
    }

    #[tokio::test]
    async fn test_update_rejects_bad_patch_values() {
        let (service, _store, _runs) = service_with_pipeline("sync").await;
        let record = service.schedule_job(spec("sync", "0 2 * * *")).await.unwrap();

        let err = service
            .update_schedule(
                record.id,
                ScheduleUpdate {
                    cron_expression: Some("bogus".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, SchedulerError::Validation(_)));

        // Record unchanged by the rejected patch
        let stored = service.get_schedule(record.id).await.unwrap();
        assert_eq!(stored.cron_expression, "0 2 * * *");

        service.shutdown().await;
    }

    #[tokio::test]
    async fn test_delete_unknown_id_returns_false() {
        let (service, _store, _runs) = service_with_pipeline("sync").await;
        assert!(!service.delete_schedule(Uuid::new_v4()).await.unwrap());
        service.shutdown().await;
    }

    #[tokio::test]
    async fn test_delete_cancels_future_firing() {
        let (service, store, _runs) = service_with_pipeline("sync").await;
        let record = service.schedule_job(spec("sync", "0 2 * * *")).await.unwrap();

        assert!(service.delete_schedule(record.id).await.unwrap());
        assert!(store.find_by_id(record.id).await.unwrap().is_none());
        assert!(service.timers.lock().await.is_empty());

        service.shutdown().await;
    }

    #[tokio::test]
    async fn test_initialize_clears_stale_flags_and_arms_timers() {
        let (service, store, _runs) = service_with_pipeline("sync").await;

        // A record left running by a crashed process
        let stale = spec("sync", "0 2 * * *").into_record(None);
        store.insert(&stale).await.unwrap();
        store.try_mark_running(stale.id).await.unwrap();

        let armed = service.initialize_from_database().await.unwrap();
        assert_eq!(armed, 1);

        let recovered = store.find_by_id(stale.id).await.unwrap().unwrap();
        assert!(!recovered.is_running);
        assert!(recovered.next_run_at.is_some());

        service.shutdown().await;
    }

    #[tokio::test]
    async fn test_timer_fires_on_cadence() {
        let (service, store, runs) = service_with_pipeline("sync").await;

        // Seconds-resolution cron: fires every second
        let record = service
            .schedule_job(spec("sync", "* * * * * *"))
            .await
            .unwrap();

        // Wait for at least one fire; the run task is detached from the timer
        let mut fired = false;
        for _ in 0..30 {
            tokio::time::sleep(Duration::from_millis(100)).await;
            if runs.load(Ordering::SeqCst) >= 1 {
                fired = true;
                break;
            }
        }
        assert!(fired, "timer never fired");

        service.shutdown().await;
        tokio::time::sleep(Duration::from_millis(100)).await;

        let stored = store.find_by_id(record.id).await.unwrap().unwrap();
        assert!(stored.last_run_at.is_some());
    }
}
