//! # Quota Tracker
//!
//! Tracks upstream rate-limit state per quota category from the
//! `X-RateLimit-*` headers carried on every GitHub response, and computes
//! the pre-emptive wait required before the next call when the remaining
//! budget drops below the low-water mark.

use chrono::{DateTime, TimeZone, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// GitHub rate-limit buckets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QuotaCategory {
    Core,
    Search,
    Graphql,
}

impl std::fmt::Display for QuotaCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QuotaCategory::Core => write!(f, "core"),
            QuotaCategory::Search => write!(f, "search"),
            QuotaCategory::Graphql => write!(f, "graphql"),
        }
    }
}

/// Last-known rate-limit state for one category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuotaSnapshot {
    pub limit: u32,
    pub remaining: u32,
    pub reset_at: DateTime<Utc>,
}

/// Rate-limit fields parsed from one response's headers
#[derive(Debug, Clone, PartialEq)]
pub struct QuotaUpdate {
    pub category: QuotaCategory,
    pub limit: u32,
    pub remaining: u32,
    pub reset_at: DateTime<Utc>,
}

impl QuotaUpdate {
    /// Parse `X-RateLimit-Limit` / `-Remaining` / `-Reset` (epoch seconds)
    /// header values. Returns None when the upstream omitted them.
    pub fn from_header_values(
        category: QuotaCategory,
        limit: Option<&str>,
        remaining: Option<&str>,
        reset: Option<&str>,
    ) -> Option<Self> {
        let remaining: u32 = remaining?.parse().ok()?;
        let reset_epoch: i64 = reset?.parse().ok()?;
        let limit: u32 = limit.and_then(|v| v.parse().ok()).unwrap_or(0);
        let reset_at = Utc.timestamp_opt(reset_epoch, 0).single()?;

        Some(Self {
            category,
            limit,
            remaining,
            reset_at,
        })
    }
}

/// Process-wide tracker of per-category quota snapshots
#[derive(Debug)]
pub struct QuotaTracker {
    snapshots: DashMap<QuotaCategory, QuotaSnapshot>,
    low_water_mark: u32,
    max_wait: Duration,
}

impl QuotaTracker {
    pub fn new(low_water_mark: u32, max_wait: Duration) -> Self {
        Self {
            snapshots: DashMap::new(),
            low_water_mark,
            max_wait,
        }
    }

    /// Refresh a category's snapshot from response headers
    pub fn record(&self, update: QuotaUpdate) {
        debug!(
            category = %update.category,
            remaining = update.remaining,
            limit = update.limit,
            "Quota snapshot refreshed"
        );
        self.snapshots.insert(
            update.category,
            QuotaSnapshot {
                limit: update.limit,
                remaining: update.remaining,
                reset_at: update.reset_at,
            },
        );
    }

    /// Record an explicit exhaustion (429) for a category
    pub fn record_exhausted(&self, category: QuotaCategory, reset_at: DateTime<Utc>) {
        warn!(
            category = %category,
            reset_at = %reset_at,
            "⏳ Quota exhausted - calls will wait until reset"
        );
        let limit = self
            .snapshots
            .get(&category)
            .map(|s| s.limit)
            .unwrap_or(0);
        self.snapshots.insert(
            category,
            QuotaSnapshot {
                limit,
                remaining: 0,
                reset_at,
            },
        );
    }

    /// Wait required before the next call in this category, if the remaining
    /// budget is below the low-water mark. Bounded by the configured maximum
    /// so a bogus reset timestamp can never stall the process indefinitely.
    pub fn required_wait(&self, category: QuotaCategory) -> Option<Duration> {
        let snapshot = self.snapshots.get(&category)?;
        if snapshot.remaining >= self.low_water_mark {
            return None;
        }

        let until_reset = (snapshot.reset_at - Utc::now()).to_std().ok()?;
        if until_reset.is_zero() {
            return None;
        }

        Some(until_reset.min(self.max_wait))
    }

    /// Last-known snapshot for a category
    pub fn snapshot(&self, category: QuotaCategory) -> Option<QuotaSnapshot> {
        self.snapshots.get(&category).map(|s| s.clone())
    }
}
