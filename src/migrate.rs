//! One-time rebuild of the daily summary store from raw session records.
//!
//! Administrative reconciliation path: never triggered by normal writes.
//! Groups every raw session by (local day, subject) and overwrites the
//! matching summary rows, so re-running over the same raw data always
//! converges to the same store.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, FixedOffset, Local, NaiveDate, Offset, Utc};
use log::{error, info};
use serde::{Deserialize, Serialize};

use crate::calendar;
use crate::db::models::DailySummary;
use crate::db::Database;
use crate::error::StudyError;
use crate::identity::IdentityProvider;

/// Outcome shape consumed by the admin UI.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationReport {
    pub success: bool,
    /// Number of (day, subject) groups written.
    pub migrated_count: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

struct SummaryGroup {
    total_minutes: u64,
    sessions_count: u64,
    first_study_time: DateTime<Utc>,
    last_study_time: DateTime<Utc>,
}

pub struct SummaryBackfill {
    db: Database,
    identity: Arc<dyn IdentityProvider>,
    offset: FixedOffset,
}

impl SummaryBackfill {
    pub fn new(db: Database, identity: Arc<dyn IdentityProvider>) -> Self {
        Self::with_offset(db, identity, Local::now().offset().fix())
    }

    pub fn with_offset(
        db: Database,
        identity: Arc<dyn IdentityProvider>,
        offset: FixedOffset,
    ) -> Self {
        Self {
            db,
            identity,
            offset,
        }
    }

    /// Rebuild the current user's summary rows from their raw sessions.
    ///
    /// A store failure mid-sweep is reported in the result shape rather
    /// than as an `Err`; groups written before the failure are safe to
    /// leave in place because a retry overwrites them.
    pub async fn run(&self) -> Result<MigrationReport, StudyError> {
        let user_id = self
            .identity
            .current_user_id()
            .ok_or(StudyError::NotAuthenticated)?;

        match self.rebuild(&user_id).await {
            Ok(migrated_count) => {
                info!("Summary backfill wrote {migrated_count} groups for {user_id}");
                Ok(MigrationReport {
                    success: true,
                    migrated_count,
                    error: None,
                })
            }
            Err(err) => {
                error!("Summary backfill failed for {user_id}: {err:#}");
                Ok(MigrationReport {
                    success: false,
                    migrated_count: 0,
                    error: Some(format!("{err:#}")),
                })
            }
        }
    }

    async fn rebuild(&self, user_id: &str) -> anyhow::Result<u64> {
        let sessions = self.db.list_study_sessions(user_id).await?;

        let mut groups: BTreeMap<(NaiveDate, String), SummaryGroup> = BTreeMap::new();
        for session in sessions {
            let day = calendar::local_day(session.created_at, self.offset);
            let group = groups
                .entry((day, session.subject_id))
                .or_insert_with(|| SummaryGroup {
                    total_minutes: 0,
                    sessions_count: 0,
                    first_study_time: session.created_at,
                    last_study_time: session.created_at,
                });
            group.total_minutes += u64::from(session.time_minutes);
            group.sessions_count += 1;
            if session.created_at < group.first_study_time {
                group.first_study_time = session.created_at;
            }
            if session.created_at > group.last_study_time {
                group.last_study_time = session.created_at;
            }
        }

        let mut written = 0u64;
        for ((study_date, subject_id), group) in groups {
            self.db
                .replace_daily_summary(&DailySummary {
                    user_id: user_id.to_string(),
                    subject_id,
                    study_date,
                    total_study_time: group.total_minutes,
                    study_sessions_count: group.sessions_count,
                    first_study_time: group.first_study_time,
                    last_study_time: group.last_study_time,
                    updated_at: Utc::now(),
                })
                .await?;
            written += 1;
        }

        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use uuid::Uuid;

    use crate::db::models::{StudySession, Subject};
    use crate::identity::StaticIdentity;

    fn utc_offset() -> FixedOffset {
        FixedOffset::east_opt(0).unwrap()
    }

    async fn seed_subject(db: &Database, name: &str) -> Subject {
        let subject = Subject {
            id: Uuid::new_v4().to_string(),
            user_id: "user-1".to_string(),
            name: name.to_string(),
            created_at: Utc::now(),
            last_accessed_at: None,
            access_count: 0,
        };
        db.insert_subject(&subject).await.unwrap();
        subject
    }

    async fn seed_session(
        db: &Database,
        subject_id: &str,
        minutes: u32,
        day: u32,
        hour: u32,
    ) -> StudySession {
        let session = StudySession {
            id: Uuid::new_v4().to_string(),
            user_id: "user-1".to_string(),
            subject_id: subject_id.to_string(),
            time_minutes: minutes,
            comment: None,
            created_at: Utc.with_ymd_and_hms(2024, 5, day, hour, 0, 0).unwrap(),
        };
        db.insert_study_session(&session).await.unwrap();
        session
    }

    fn backfill(db: &Database) -> SummaryBackfill {
        SummaryBackfill::with_offset(db.clone(), StaticIdentity::signed_in("user-1"), utc_offset())
    }

    #[tokio::test]
    async fn rejects_when_signed_out() {
        let db = Database::open_in_memory().unwrap();
        let job = SummaryBackfill::with_offset(db, StaticIdentity::signed_out(), utc_offset());

        let result = job.run().await;
        assert!(matches!(result, Err(StudyError::NotAuthenticated)));
    }

    #[tokio::test]
    async fn groups_by_day_then_subject() {
        let db = Database::open_in_memory().unwrap();
        let math = seed_subject(&db, "math").await;
        let art = seed_subject(&db, "art").await;
        seed_session(&db, &math.id, 20, 1, 9).await;
        seed_session(&db, &math.id, 15, 1, 20).await;
        seed_session(&db, &math.id, 30, 2, 10).await;
        seed_session(&db, &art.id, 10, 1, 12).await;

        let report = backfill(&db).run().await.unwrap();
        assert!(report.success);
        assert_eq!(report.migrated_count, 3);

        let day = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        let rows = db
            .daily_summaries_in_range("user-1", &math.id, day, day)
            .await
            .unwrap();
        assert_eq!(rows[0].total_study_time, 35);
        assert_eq!(rows[0].study_sessions_count, 2);
        assert_eq!(
            rows[0].first_study_time,
            Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap()
        );
        assert_eq!(
            rows[0].last_study_time,
            Utc.with_ymd_and_hms(2024, 5, 1, 20, 0, 0).unwrap()
        );
    }

    #[tokio::test]
    async fn rerunning_produces_identical_rows() {
        let db = Database::open_in_memory().unwrap();
        let math = seed_subject(&db, "math").await;
        seed_session(&db, &math.id, 25, 1, 9).await;
        seed_session(&db, &math.id, 35, 1, 11).await;

        let job = backfill(&db);
        let first = job.run().await.unwrap();
        let second = job.run().await.unwrap();
        assert_eq!(first.migrated_count, second.migrated_count);

        let day = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        let rows = db
            .daily_summaries_in_range("user-1", &math.id, day, day)
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].total_study_time, 60);
        assert_eq!(rows[0].study_sessions_count, 2);
    }

    #[tokio::test]
    async fn overwrites_drifted_summary_rows() {
        let db = Database::open_in_memory().unwrap();
        let math = seed_subject(&db, "math").await;
        let session = seed_session(&db, &math.id, 40, 1, 9).await;

        // A doubled increment left the summary out of step with the raw log.
        let day = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        db.add_session_to_daily_summary("user-1", &math.id, day, 40, session.created_at)
            .await
            .unwrap();
        db.add_session_to_daily_summary("user-1", &math.id, day, 40, session.created_at)
            .await
            .unwrap();

        backfill(&db).run().await.unwrap();

        let rows = db
            .daily_summaries_in_range("user-1", &math.id, day, day)
            .await
            .unwrap();
        assert_eq!(rows[0].total_study_time, 40);
        assert_eq!(rows[0].study_sessions_count, 1);
    }

    #[tokio::test]
    async fn empty_history_writes_nothing() {
        let db = Database::open_in_memory().unwrap();
        let report = backfill(&db).run().await.unwrap();
        assert!(report.success);
        assert_eq!(report.migrated_count, 0);
    }
}
