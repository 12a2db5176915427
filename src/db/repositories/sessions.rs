use anyhow::{Context, Result};
use rusqlite::{params, Row};

use crate::db::{
    helpers::{parse_datetime, to_u32},
    models::StudySession,
    Database,
};

fn row_to_session(row: &Row) -> Result<StudySession> {
    let created_at: String = row.get("created_at")?;
    let time_minutes: i64 = row.get("time_minutes")?;

    Ok(StudySession {
        id: row.get("id")?,
        user_id: row.get("user_id")?,
        subject_id: row.get("subject_id")?,
        time_minutes: to_u32(time_minutes, "time_minutes")?,
        comment: row.get("comment")?,
        created_at: parse_datetime(&created_at, "created_at")?,
    })
}

impl Database {
    pub async fn insert_study_session(&self, session: &StudySession) -> Result<()> {
        let record = session.clone();
        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO study_sessions (id, user_id, subject_id, time_minutes, comment, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    record.id,
                    record.user_id,
                    record.subject_id,
                    i64::from(record.time_minutes),
                    record.comment,
                    record.created_at.to_rfc3339(),
                ],
            )
            .context("failed to insert study session")?;
            Ok(())
        })
        .await
    }

    /// Every raw session of the user, oldest first. Input to the summary
    /// backfill job.
    pub async fn list_study_sessions(&self, user_id: &str) -> Result<Vec<StudySession>> {
        let user_id = user_id.to_string();
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, user_id, subject_id, time_minutes, comment, created_at
                 FROM study_sessions
                 WHERE user_id = ?1
                 ORDER BY created_at ASC",
            )?;

            let mut rows = stmt.query(params![user_id])?;
            let mut sessions = Vec::new();
            while let Some(row) = rows.next()? {
                sessions.push(row_to_session(row)?);
            }

            Ok(sessions)
        })
        .await
    }

    /// Newest sessions for the running-log view.
    pub async fn list_recent_study_sessions(
        &self,
        user_id: &str,
        limit: usize,
    ) -> Result<Vec<StudySession>> {
        let user_id = user_id.to_string();
        let limit = limit as i64;
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, user_id, subject_id, time_minutes, comment, created_at
                 FROM study_sessions
                 WHERE user_id = ?1
                 ORDER BY created_at DESC
                 LIMIT ?2",
            )?;

            let mut rows = stmt.query(params![user_id, limit])?;
            let mut sessions = Vec::new();
            while let Some(row) = rows.next()? {
                sessions.push(row_to_session(row)?);
            }

            Ok(sessions)
        })
        .await
    }
}
