//! # Scheduler
//!
//! Cron-driven triggering of registered pipelines. Schedules live in the
//! database; timers are an in-memory cache rebuilt at startup. Fires and
//! manual triggers share one overlap guard per pipeline type, acquired
//! atomically in the store.
//!
//! ## Architecture
//!
//! - [`cron`] - Expression validation and next-fire computation
//! - [`service`] - Timer registry, schedule CRUD, and guarded run execution

pub mod cron;
pub mod service;

pub use cron::{next_fire_time, parse_cron, parse_time_zone, CronError};
pub use service::{RunOutcome, SchedulerError, SchedulerService};
