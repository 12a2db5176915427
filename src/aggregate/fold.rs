//! Pure folding steps of the aggregation engine.
//!
//! Everything here operates on rows already loaded from the store, so the
//! calendar arithmetic can be tested without a database. `BTreeMap` keeps
//! buckets in ascending key order, which is chronological order because all
//! period keys are zero-padded.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use chrono::NaiveDate;

use crate::db::models::{DailySummary, DailyTotal, PeriodSummary};

/// Streaks stop counting after a year even if every day is active.
pub const STREAK_SCAN_LIMIT_DAYS: u32 = 365;

/// Merge per-subject daily rows into all-subjects day buckets, ascending by
/// date.
pub fn merge_by_day(per_subject: Vec<Vec<DailySummary>>) -> Vec<DailyTotal> {
    let mut by_day: BTreeMap<NaiveDate, DailyTotal> = BTreeMap::new();

    for rows in per_subject {
        for row in rows {
            let entry = by_day.entry(row.study_date).or_insert_with(|| DailyTotal {
                date: row.study_date,
                total_time: 0,
                sessions_count: 0,
            });
            entry.total_time += row.total_study_time;
            entry.sessions_count += row.study_sessions_count;
        }
    }

    by_day.into_values().collect()
}

/// Group day buckets into periods (weeks or months), ascending by period
/// key.
pub fn bucket_by_period<F>(days: &[DailyTotal], period_key: F) -> Vec<PeriodSummary>
where
    F: Fn(NaiveDate) -> String,
{
    let mut buckets: BTreeMap<String, PeriodSummary> = BTreeMap::new();

    for day in days {
        let key = period_key(day.date);
        let bucket = buckets
            .entry(key.clone())
            .or_insert_with(|| PeriodSummary {
                period_key: key,
                total_time: 0,
                sessions_count: 0,
                member_dates: BTreeSet::new(),
            });
        bucket.total_time += day.total_time;
        bucket.sessions_count += day.sessions_count;
        bucket.member_dates.insert(day.date);
    }

    buckets.into_values().collect()
}

/// Count consecutive active days walking backward from `reference_day`.
/// Stops at the first gap or after [`STREAK_SCAN_LIMIT_DAYS`].
pub fn streak_from_days(active_days: &HashSet<NaiveDate>, reference_day: NaiveDate) -> u32 {
    let mut streak = 0;
    let mut current = reference_day;

    while streak < STREAK_SCAN_LIMIT_DAYS && active_days.contains(&current) {
        streak += 1;
        match current.pred_opt() {
            Some(previous) => current = previous,
            None => break,
        }
    }

    streak
}
