use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Row};

use crate::calendar;
use crate::db::{
    helpers::{parse_date, parse_datetime, to_i64, to_u64},
    models::DailySummary,
    Database,
};

fn row_to_summary(row: &Row) -> Result<DailySummary> {
    let study_date: String = row.get("study_date")?;
    let total_study_time: i64 = row.get("total_study_time")?;
    let study_sessions_count: i64 = row.get("study_sessions_count")?;
    let first_study_time: String = row.get("first_study_time")?;
    let last_study_time: String = row.get("last_study_time")?;
    let updated_at: String = row.get("updated_at")?;

    Ok(DailySummary {
        user_id: row.get("user_id")?,
        subject_id: row.get("subject_id")?,
        study_date: parse_date(&study_date, "study_date")?,
        total_study_time: to_u64(total_study_time, "total_study_time")?,
        study_sessions_count: to_u64(study_sessions_count, "study_sessions_count")?,
        first_study_time: parse_datetime(&first_study_time, "first_study_time")?,
        last_study_time: parse_datetime(&last_study_time, "last_study_time")?,
        updated_at: parse_datetime(&updated_at, "updated_at")?,
    })
}

impl Database {
    /// Fold one recorded session into its summary row.
    ///
    /// Single-statement increment upsert: a fresh row starts at
    /// (minutes, count 1, first = last = now); an existing row gains the
    /// minutes and one count, keeps its `first_study_time`, and refreshes
    /// `last_study_time`. The arithmetic happens inside SQLite, so two
    /// recordings for the same key can interleave in any order without
    /// losing an update.
    pub async fn add_session_to_daily_summary(
        &self,
        user_id: &str,
        subject_id: &str,
        study_date: NaiveDate,
        minutes: u32,
        recorded_at: DateTime<Utc>,
    ) -> Result<()> {
        let user_id = user_id.to_string();
        let subject_id = subject_id.to_string();
        let date_key = calendar::day_key(study_date);
        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO daily_summaries (
                     user_id, subject_id, study_date,
                     total_study_time, study_sessions_count,
                     first_study_time, last_study_time, updated_at
                 ) VALUES (?1, ?2, ?3, ?4, 1, ?5, ?5, ?5)
                 ON CONFLICT(user_id, subject_id, study_date) DO UPDATE SET
                     total_study_time = total_study_time + excluded.total_study_time,
                     study_sessions_count = study_sessions_count + 1,
                     last_study_time = excluded.last_study_time,
                     updated_at = excluded.updated_at",
                params![
                    user_id,
                    subject_id,
                    date_key,
                    i64::from(minutes),
                    recorded_at.to_rfc3339(),
                ],
            )
            .context("failed to upsert daily summary")?;
            Ok(())
        })
        .await
    }

    /// Overwrite a summary row with recomputed totals. Used by the backfill
    /// job; re-running over the same raw data writes the same row.
    pub async fn replace_daily_summary(&self, summary: &DailySummary) -> Result<()> {
        let record = summary.clone();
        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO daily_summaries (
                     user_id, subject_id, study_date,
                     total_study_time, study_sessions_count,
                     first_study_time, last_study_time, updated_at
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                 ON CONFLICT(user_id, subject_id, study_date) DO UPDATE SET
                     total_study_time = excluded.total_study_time,
                     study_sessions_count = excluded.study_sessions_count,
                     first_study_time = excluded.first_study_time,
                     last_study_time = excluded.last_study_time,
                     updated_at = excluded.updated_at",
                params![
                    record.user_id,
                    record.subject_id,
                    calendar::day_key(record.study_date),
                    to_i64(record.total_study_time)?,
                    to_i64(record.study_sessions_count)?,
                    record.first_study_time.to_rfc3339(),
                    record.last_study_time.to_rfc3339(),
                    record.updated_at.to_rfc3339(),
                ],
            )
            .context("failed to replace daily summary")?;
            Ok(())
        })
        .await
    }

    /// Summary rows for one subject between `start` and `end` inclusive,
    /// ascending by day.
    pub async fn daily_summaries_in_range(
        &self,
        user_id: &str,
        subject_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<DailySummary>> {
        let user_id = user_id.to_string();
        let subject_id = subject_id.to_string();
        let start_key = calendar::day_key(start);
        let end_key = calendar::day_key(end);
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT user_id, subject_id, study_date, total_study_time,
                        study_sessions_count, first_study_time, last_study_time, updated_at
                 FROM daily_summaries
                 WHERE user_id = ?1 AND subject_id = ?2
                   AND study_date >= ?3 AND study_date <= ?4
                 ORDER BY study_date ASC",
            )?;

            let mut rows = stmt.query(params![user_id, subject_id, start_key, end_key])?;
            let mut summaries = Vec::new();
            while let Some(row) = rows.next()? {
                summaries.push(row_to_summary(row)?);
            }

            Ok(summaries)
        })
        .await
    }

    /// Distinct subject ids with any recorded time, for fan-out scoping and
    /// the subject-filter UI.
    pub async fn subjects_with_data(&self, user_id: &str) -> Result<Vec<String>> {
        let user_id = user_id.to_string();
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT DISTINCT subject_id
                 FROM daily_summaries
                 WHERE user_id = ?1 AND total_study_time != 0
                 ORDER BY subject_id ASC",
            )?;

            let mut rows = stmt.query(params![user_id])?;
            let mut subject_ids = Vec::new();
            while let Some(row) = rows.next()? {
                subject_ids.push(row.get::<_, String>(0)?);
            }

            Ok(subject_ids)
        })
        .await
    }

    /// Distinct days with any recorded time across all subjects. Streak
    /// input.
    pub async fn active_days(&self, user_id: &str) -> Result<Vec<NaiveDate>> {
        let user_id = user_id.to_string();
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT DISTINCT study_date
                 FROM daily_summaries
                 WHERE user_id = ?1 AND total_study_time != 0
                 ORDER BY study_date DESC",
            )?;

            let mut rows = stmt.query(params![user_id])?;
            let mut days = Vec::new();
            while let Some(row) = rows.next()? {
                let raw: String = row.get(0)?;
                days.push(parse_date(&raw, "study_date")?);
            }

            Ok(days)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, TimeZone, Utc};

    use crate::db::models::DailySummary;
    use crate::db::Database;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn summary_row(user: &str, subject: &str, day: NaiveDate, total: u64) -> DailySummary {
        let now = Utc::now();
        DailySummary {
            user_id: user.to_string(),
            subject_id: subject.to_string(),
            study_date: day,
            total_study_time: total,
            study_sessions_count: 1,
            first_study_time: now,
            last_study_time: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn add_session_accumulates_and_preserves_first_time() {
        let db = Database::open_in_memory().unwrap();
        let day = date(2024, 5, 1);
        let morning = Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap();
        let evening = Utc.with_ymd_and_hms(2024, 5, 1, 21, 0, 0).unwrap();

        db.add_session_to_daily_summary("user-1", "math", day, 20, morning)
            .await
            .unwrap();
        db.add_session_to_daily_summary("user-1", "math", day, 15, evening)
            .await
            .unwrap();

        let rows = db
            .daily_summaries_in_range("user-1", "math", day, day)
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].total_study_time, 35);
        assert_eq!(rows[0].study_sessions_count, 2);
        assert_eq!(rows[0].first_study_time, morning);
        assert_eq!(rows[0].last_study_time, evening);
    }

    #[tokio::test]
    async fn concurrent_adds_do_not_lose_updates() {
        let db = Database::open_in_memory().unwrap();
        let day = date(2024, 5, 1);
        let now = Utc::now();

        let (first, second) = tokio::join!(
            db.add_session_to_daily_summary("user-1", "math", day, 20, now),
            db.add_session_to_daily_summary("user-1", "math", day, 15, now),
        );
        first.unwrap();
        second.unwrap();

        let rows = db
            .daily_summaries_in_range("user-1", "math", day, day)
            .await
            .unwrap();
        assert_eq!(rows[0].total_study_time, 35);
        assert_eq!(rows[0].study_sessions_count, 2);
    }

    #[tokio::test]
    async fn replace_overwrites_instead_of_accumulating() {
        let db = Database::open_in_memory().unwrap();
        let day = date(2024, 5, 1);
        let row = summary_row("user-1", "math", day, 45);

        db.replace_daily_summary(&row).await.unwrap();
        db.replace_daily_summary(&row).await.unwrap();

        let rows = db
            .daily_summaries_in_range("user-1", "math", day, day)
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].total_study_time, 45);
        assert_eq!(rows[0].study_sessions_count, 1);
    }

    #[tokio::test]
    async fn range_is_inclusive_and_ascending() {
        let db = Database::open_in_memory().unwrap();
        let now = Utc::now();
        for day in [date(2024, 5, 3), date(2024, 5, 1), date(2024, 5, 2)] {
            db.add_session_to_daily_summary("user-1", "math", day, 10, now)
                .await
                .unwrap();
        }

        let rows = db
            .daily_summaries_in_range("user-1", "math", date(2024, 5, 1), date(2024, 5, 2))
            .await
            .unwrap();
        let days: Vec<_> = rows.iter().map(|r| r.study_date).collect();
        assert_eq!(days, vec![date(2024, 5, 1), date(2024, 5, 2)]);
    }

    #[tokio::test]
    async fn subjects_with_data_skips_zero_total_rows() {
        let db = Database::open_in_memory().unwrap();
        let day = date(2024, 5, 1);
        db.replace_daily_summary(&summary_row("user-1", "math", day, 30))
            .await
            .unwrap();
        db.replace_daily_summary(&summary_row("user-1", "idle", day, 0))
            .await
            .unwrap();
        db.replace_daily_summary(&summary_row("user-2", "art", day, 10))
            .await
            .unwrap();

        let subjects = db.subjects_with_data("user-1").await.unwrap();
        assert_eq!(subjects, vec!["math".to_string()]);
    }

    #[tokio::test]
    async fn active_days_are_distinct_across_subjects() {
        let db = Database::open_in_memory().unwrap();
        let day = date(2024, 5, 1);
        let now = Utc::now();
        db.add_session_to_daily_summary("user-1", "math", day, 10, now)
            .await
            .unwrap();
        db.add_session_to_daily_summary("user-1", "art", day, 10, now)
            .await
            .unwrap();

        let days = db.active_days("user-1").await.unwrap();
        assert_eq!(days, vec![day]);
    }
}
