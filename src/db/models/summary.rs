//! Summary rows: the persisted per-day store and the derived fold outputs.

use std::collections::BTreeSet;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Persisted per-(user, subject, day) aggregate, the unit of incremental
/// maintenance. Unique on `(user_id, subject_id, study_date)`.
///
/// Invariant: `total_study_time` equals the minute sum and
/// `study_sessions_count` the count of every session recorded for the key.
/// `first_study_time` is set when the row is created and preserved by every
/// later update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailySummary {
    pub user_id: String,
    pub subject_id: String,
    pub study_date: NaiveDate,
    pub total_study_time: u64,
    pub study_sessions_count: u64,
    pub first_study_time: DateTime<Utc>,
    pub last_study_time: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One all-subjects day bucket, derived by folding [`DailySummary`] rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyTotal {
    pub date: NaiveDate,
    pub total_time: u64,
    pub sessions_count: u64,
}

/// One week or month bucket. Recomputed on demand, never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeriodSummary {
    pub period_key: String,
    pub total_time: u64,
    pub sessions_count: u64,
    pub member_dates: BTreeSet<NaiveDate>,
}
