//! # Cron Expression Handling
//!
//! Validation and next-fire computation for schedule records. Expressions
//! are accepted in the conventional 5-field form and normalized to the
//! 6-field form the `cron` crate parses (a leading seconds column). Fire
//! times are computed in the schedule's IANA time zone, then converted back
//! to UTC for persistence and timer arming.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use cron::Schedule as CronSchedule;
use std::str::FromStr;

/// Validation failures for cron expressions and time zone names
#[derive(Debug, Clone, thiserror::Error)]
pub enum CronError {
    #[error("Invalid cron expression '{expression}': {message}")]
    InvalidExpression { expression: String, message: String },

    #[error("Unknown time zone '{0}'")]
    InvalidTimeZone(String),
}

/// Parse a cron expression, accepting both 5-field (minute-first) and
/// 6-field (seconds-first) forms
pub fn parse_cron(expression: &str) -> Result<CronSchedule, CronError> {
    let normalized = normalize(expression);
    CronSchedule::from_str(&normalized).map_err(|e| CronError::InvalidExpression {
        expression: expression.to_string(),
        message: e.to_string(),
    })
}

/// Resolve an IANA time zone name
pub fn parse_time_zone(name: &str) -> Result<Tz, CronError> {
    name.parse::<Tz>()
        .map_err(|_| CronError::InvalidTimeZone(name.to_string()))
}

/// Next UTC fire time strictly after `after`, or None when the expression
/// has no future occurrence
pub fn next_fire_time(
    expression: &str,
    time_zone: &str,
    after: DateTime<Utc>,
) -> Result<Option<DateTime<Utc>>, CronError> {
    let schedule = parse_cron(expression)?;
    let tz = parse_time_zone(time_zone)?;

    let local_after = after.with_timezone(&tz);
    Ok(schedule
        .after(&local_after)
        .next()
        .map(|fire| fire.with_timezone(&Utc)))
}

/// The conventional crontab format has 5 fields; the parser wants a seconds
/// column, so 5-field expressions fire at second zero
fn normalize(expression: &str) -> String {
    let fields = expression.split_whitespace().count();
    if fields == 5 {
        format!("0 {expression}")
    } else {
        expression.to_string()
    }
}
