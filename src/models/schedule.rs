//! # Schedule Model
//!
//! Persisted schedule records are the single source of truth for scheduler
//! state; the in-memory timer registry is a derived, rebuildable cache of
//! these rows.
//!
//! ## Database Schema
//!
//! Maps to `harvest_schedules`:
//! - `pipeline_type`: the registered pipeline this schedule fires
//! - `cron_expression` / `time_zone`: when it fires
//! - `is_active`: soft-disable flag (operator action)
//! - `is_running`: overlap guard; at most one true row per pipeline type

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A persisted schedule row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct ScheduleRecord {
    pub id: Uuid,
    pub name: String,
    pub pipeline_type: String,
    pub cron_expression: String,
    pub time_zone: String,
    pub is_active: bool,
    pub is_running: bool,
    pub last_run_at: Option<DateTime<Utc>>,
    pub next_run_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Specification for a new schedule (validated before persistence)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewSchedule {
    pub name: String,
    pub pipeline_type: String,
    pub cron_expression: String,
    /// IANA time zone name; defaults to UTC
    #[serde(default = "default_time_zone")]
    pub time_zone: String,
    #[serde(default = "default_is_active")]
    pub is_active: bool,
}

fn default_time_zone() -> String {
    "UTC".to_string()
}

fn default_is_active() -> bool {
    true
}

/// Partial update for an existing schedule; None fields are left unchanged
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScheduleUpdate {
    pub name: Option<String>,
    pub cron_expression: Option<String>,
    pub time_zone: Option<String>,
    pub is_active: Option<bool>,
}

impl ScheduleUpdate {
    /// Whether applying this patch requires the timer to be re-registered
    pub fn affects_timer(&self) -> bool {
        self.cron_expression.is_some() || self.time_zone.is_some() || self.is_active.is_some()
    }
}

impl NewSchedule {
    /// Materialize a full record with generated fields
    pub fn into_record(self, next_run_at: Option<DateTime<Utc>>) -> ScheduleRecord {
        let now = Utc::now();
        ScheduleRecord {
            id: Uuid::new_v4(),
            name: self.name,
            pipeline_type: self.pipeline_type,
            cron_expression: self.cron_expression,
            time_zone: self.time_zone,
            is_active: self.is_active,
            is_running: false,
            last_run_at: None,
            next_run_at,
            created_at: now,
            updated_at: now,
        }
    }
}
