//! Derives week/month series and streaks from the daily summary store.

use std::collections::HashSet;

use chrono::NaiveDate;

use crate::calendar;
use crate::db::models::{DailyTotal, PeriodSummary};
use crate::db::Database;
use crate::error::StudyError;

use super::fold;

/// Read side of the summary store. Holds an injected [`Database`] handle;
/// every operation is scoped to the caller-supplied user id.
#[derive(Clone)]
pub struct Aggregator {
    db: Database,
}

impl Aggregator {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Subject ids with any recorded time. Scopes the all-subjects fan-out
    /// and feeds the subject-filter UI.
    pub async fn subjects_with_data(&self, user_id: &str) -> Result<Vec<String>, StudyError> {
        Ok(self.db.subjects_with_data(user_id).await?)
    }

    /// Day buckets for a single subject, ascending by date.
    pub async fn daily_for_subject(
        &self,
        user_id: &str,
        subject_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<DailyTotal>, StudyError> {
        if start > end {
            return Ok(Vec::new());
        }

        let rows = self
            .db
            .daily_summaries_in_range(user_id, subject_id, start, end)
            .await?;
        Ok(rows
            .into_iter()
            .map(|row| DailyTotal {
                date: row.study_date,
                total_time: row.total_study_time,
                sessions_count: row.study_sessions_count,
            })
            .collect())
    }

    /// All-subjects day buckets: one range query per subject with data,
    /// folded by day. A failed subject query aborts the whole operation —
    /// a partial total must never pass for a complete one.
    pub async fn daily_all_subjects(
        &self,
        user_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<DailyTotal>, StudyError> {
        if start > end {
            return Ok(Vec::new());
        }

        let subject_ids = self.db.subjects_with_data(user_id).await?;
        if subject_ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut per_subject = Vec::with_capacity(subject_ids.len());
        for subject_id in subject_ids {
            let rows = self
                .db
                .daily_summaries_in_range(user_id, &subject_id, start, end)
                .await
                .map_err(|cause| StudyError::PartialAggregation { subject_id, cause })?;
            per_subject.push(rows);
        }

        Ok(fold::merge_by_day(per_subject))
    }

    /// ISO-week buckets over the range, ascending by week key. `subject_id`
    /// of `None` folds across all subjects with data.
    pub async fn weekly_summaries(
        &self,
        user_id: &str,
        start: NaiveDate,
        end: NaiveDate,
        subject_id: Option<&str>,
    ) -> Result<Vec<PeriodSummary>, StudyError> {
        let days = self.daily_totals(user_id, subject_id, start, end).await?;
        Ok(fold::bucket_by_period(&days, calendar::iso_week_key))
    }

    /// Month buckets over the range, ascending by month key.
    pub async fn monthly_summaries(
        &self,
        user_id: &str,
        start: NaiveDate,
        end: NaiveDate,
        subject_id: Option<&str>,
    ) -> Result<Vec<PeriodSummary>, StudyError> {
        let days = self.daily_totals(user_id, subject_id, start, end).await?;
        Ok(fold::bucket_by_period(&days, calendar::month_key))
    }

    /// Consecutive active days ending at `reference_day`, bounded to a
    /// year. Active means any subject recorded time on the day.
    pub async fn consecutive_day_streak(
        &self,
        user_id: &str,
        reference_day: NaiveDate,
    ) -> Result<u32, StudyError> {
        let active: HashSet<NaiveDate> = self.db.active_days(user_id).await?.into_iter().collect();
        Ok(fold::streak_from_days(&active, reference_day))
    }

    async fn daily_totals(
        &self,
        user_id: &str,
        subject_id: Option<&str>,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<DailyTotal>, StudyError> {
        match subject_id {
            Some(subject_id) => self.daily_for_subject(user_id, subject_id, start, end).await,
            None => self.daily_all_subjects(user_id, start, end).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    async fn seed(db: &Database, subject: &str, day: NaiveDate, minutes: u32) {
        db.add_session_to_daily_summary("user-1", subject, day, minutes, Utc::now())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn inverted_range_is_empty_not_an_error() {
        let db = Database::open_in_memory().unwrap();
        seed(&db, "math", date(2024, 5, 1), 30).await;
        let engine = Aggregator::new(db);

        let daily = engine
            .daily_all_subjects("user-1", date(2024, 5, 2), date(2024, 5, 1))
            .await
            .unwrap();
        assert!(daily.is_empty());

        let weekly = engine
            .weekly_summaries("user-1", date(2024, 5, 2), date(2024, 5, 1), None)
            .await
            .unwrap();
        assert!(weekly.is_empty());
    }

    #[tokio::test]
    async fn no_subjects_with_data_yields_empty_series() {
        let db = Database::open_in_memory().unwrap();
        let engine = Aggregator::new(db);

        let daily = engine
            .daily_all_subjects("user-1", date(2024, 5, 1), date(2024, 5, 31))
            .await
            .unwrap();
        assert!(daily.is_empty());
    }

    #[tokio::test]
    async fn all_subjects_fold_merges_by_day() {
        let db = Database::open_in_memory().unwrap();
        seed(&db, "math", date(2024, 5, 1), 30).await;
        seed(&db, "art", date(2024, 5, 1), 15).await;
        seed(&db, "art", date(2024, 5, 2), 10).await;
        let engine = Aggregator::new(db);

        let daily = engine
            .daily_all_subjects("user-1", date(2024, 5, 1), date(2024, 5, 31))
            .await
            .unwrap();
        assert_eq!(daily.len(), 2);
        assert_eq!(daily[0].total_time, 45);
        assert_eq!(daily[0].sessions_count, 2);
        assert_eq!(daily[1].total_time, 10);
    }

    #[tokio::test]
    async fn monthly_total_equals_daily_sum() {
        let db = Database::open_in_memory().unwrap();
        seed(&db, "math", date(2024, 5, 1), 30).await;
        seed(&db, "math", date(2024, 5, 15), 45).await;
        seed(&db, "math", date(2024, 5, 31), 25).await;
        let engine = Aggregator::new(db);

        let monthly = engine
            .monthly_summaries("user-1", date(2024, 5, 1), date(2024, 5, 31), None)
            .await
            .unwrap();
        assert_eq!(monthly.len(), 1);
        assert_eq!(monthly[0].period_key, "2024-05");
        assert_eq!(monthly[0].total_time, 100);
        assert_eq!(monthly[0].member_dates.len(), 3);
    }

    #[tokio::test]
    async fn weekly_respects_subject_filter() {
        let db = Database::open_in_memory().unwrap();
        seed(&db, "math", date(2024, 5, 6), 30).await;
        seed(&db, "art", date(2024, 5, 6), 999).await;
        let engine = Aggregator::new(db);

        let weekly = engine
            .weekly_summaries(
                "user-1",
                date(2024, 5, 1),
                date(2024, 5, 31),
                Some("math"),
            )
            .await
            .unwrap();
        assert_eq!(weekly.len(), 1);
        assert_eq!(weekly[0].total_time, 30);
    }

    #[tokio::test]
    async fn streak_counts_any_subject_and_stops_at_gaps() {
        let db = Database::open_in_memory().unwrap();
        seed(&db, "math", date(2024, 5, 1), 30).await;
        seed(&db, "art", date(2024, 5, 2), 30).await;
        seed(&db, "art", date(2024, 5, 4), 30).await;
        let engine = Aggregator::new(db);

        // 05-02 counts through a different subject than 05-01.
        assert_eq!(
            engine
                .consecutive_day_streak("user-1", date(2024, 5, 2))
                .await
                .unwrap(),
            2
        );
        // 05-03 is a gap, so the reference day stands alone.
        assert_eq!(
            engine
                .consecutive_day_streak("user-1", date(2024, 5, 4))
                .await
                .unwrap(),
            1
        );
    }
}
