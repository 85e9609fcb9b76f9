//! # Data Model Layer
//!
//! Persisted rows for the ingestion core: schedules owned by the scheduler
//! service, and the entities produced by extraction and written by the store
//! stage. Entities key on their upstream natural ids so repeated ingestion
//! passes upsert instead of duplicating.

pub mod commit;
pub mod contributor;
pub mod merge_request;
pub mod repository;
pub mod schedule;

pub use commit::{Commit, NewCommit};
pub use contributor::{Contributor, NewContributor};
pub use merge_request::{MergeRequest, NewMergeRequest};
pub use repository::{NewRepository, Repository};
pub use schedule::{NewSchedule, ScheduleRecord, ScheduleUpdate};
