//! Session recording: the write path that feeds the summary store.

use std::sync::Arc;

use chrono::{FixedOffset, Local, Offset, Utc};
use log::info;
use uuid::Uuid;

use crate::calendar;
use crate::db::models::{StudySession, Subject};
use crate::db::Database;
use crate::error::StudyError;
use crate::identity::IdentityProvider;

/// Validates and persists study sessions, keeping the daily summary store
/// and subject access metadata in step with every raw record.
#[derive(Clone)]
pub struct TimeRecorder {
    db: Database,
    identity: Arc<dyn IdentityProvider>,
    offset: FixedOffset,
}

impl TimeRecorder {
    /// Viewer offset is captured once at construction; see the timezone
    /// contract in [`crate::calendar`].
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

    /// Record one study interval.
    ///
    /// Validation happens before any write; on success the raw session row,
    /// the daily summary increment and the subject access bump have all been
    /// applied.
    pub async fn record_time(
        &self,
        subject_id: &str,
        minutes: u32,
        comment: Option<&str>,
    ) -> Result<StudySession, StudyError> {
        let user_id = self.current_user()?;

        if minutes == 0 {
            return Err(StudyError::InvalidInput(
                "study time must be greater than zero".to_string(),
            ));
        }

        let subject = self
            .db
            .get_subject(&user_id, subject_id)
            .await?
            .ok_or_else(|| StudyError::InvalidInput(format!("unknown subject {subject_id}")))?;

        let comment = comment
            .map(str::trim)
            .filter(|text| !text.is_empty())
            .map(str::to_string);

        let recorded_at = Utc::now();
        let session = StudySession {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.clone(),
            subject_id: subject.id.clone(),
            time_minutes: minutes,
            comment,
            created_at: recorded_at,
        };

        self.db.insert_study_session(&session).await?;

        let study_date = calendar::local_day(recorded_at, self.offset);
        self.db
            .add_session_to_daily_summary(&user_id, &subject.id, study_date, minutes, recorded_at)
            .await?;
        self.db
            .record_subject_access(&user_id, &subject.id, recorded_at)
            .await?;

        info!(
            "Recorded {minutes} minutes of {} for {user_id} on {study_date}",
            subject.name
        );

        Ok(session)
    }

    pub async fn create_subject(&self, name: &str) -> Result<Subject, StudyError> {
        let user_id = self.current_user()?;

        let name = name.trim();
        if name.is_empty() {
            return Err(StudyError::InvalidInput(
                "subject name must not be empty".to_string(),
            ));
        }
        if self.db.subject_name_exists(&user_id, name).await? {
            return Err(StudyError::InvalidInput(format!(
                "subject {name} already exists"
            )));
        }

        let subject = Subject {
            id: Uuid::new_v4().to_string(),
            user_id,
            name: name.to_string(),
            created_at: Utc::now(),
            last_accessed_at: None,
            access_count: 0,
        };
        self.db.insert_subject(&subject).await?;

        Ok(subject)
    }

    pub async fn list_subjects(&self) -> Result<Vec<Subject>, StudyError> {
        let user_id = self.current_user()?;
        Ok(self.db.list_subjects(&user_id).await?)
    }

    /// Newest-first sessions for the running-log view.
    pub async fn recent_sessions(&self, limit: usize) -> Result<Vec<StudySession>, StudyError> {
        let user_id = self.current_user()?;
        Ok(self.db.list_recent_study_sessions(&user_id, limit).await?)
    }

    fn current_user(&self) -> Result<String, StudyError> {
        self.identity
            .current_user_id()
            .ok_or(StudyError::NotAuthenticated)
    }
}
