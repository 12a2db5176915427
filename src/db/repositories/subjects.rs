use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};

use crate::db::{
    helpers::{parse_datetime, parse_optional_datetime, to_i64, to_u64},
    models::Subject,
    Database,
};

fn row_to_subject(row: &Row) -> Result<Subject> {
    let created_at: String = row.get("created_at")?;
    let last_accessed_at: Option<String> = row.get("last_accessed_at")?;
    let access_count: i64 = row.get("access_count")?;

    Ok(Subject {
        id: row.get("id")?,
        user_id: row.get("user_id")?,
        name: row.get("name")?,
        created_at: parse_datetime(&created_at, "created_at")?,
        last_accessed_at: parse_optional_datetime(last_accessed_at, "last_accessed_at")?,
        access_count: to_u64(access_count, "access_count")?,
    })
}

impl Database {
    pub async fn insert_subject(&self, subject: &Subject) -> Result<()> {
        let record = subject.clone();
        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO subjects (id, user_id, name, created_at, last_accessed_at, access_count)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    record.id,
                    record.user_id,
                    record.name,
                    record.created_at.to_rfc3339(),
                    record.last_accessed_at.as_ref().map(|dt| dt.to_rfc3339()),
                    to_i64(record.access_count)?,
                ],
            )
            .context("failed to insert subject")?;
            Ok(())
        })
        .await
    }

    pub async fn get_subject(&self, user_id: &str, subject_id: &str) -> Result<Option<Subject>> {
        let user_id = user_id.to_string();
        let subject_id = subject_id.to_string();
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, user_id, name, created_at, last_accessed_at, access_count
                 FROM subjects
                 WHERE id = ?1 AND user_id = ?2",
            )?;

            let mut rows = stmt.query(params![subject_id, user_id])?;
            match rows.next()? {
                Some(row) => Ok(Some(row_to_subject(row)?)),
                None => Ok(None),
            }
        })
        .await
    }

    pub async fn list_subjects(&self, user_id: &str) -> Result<Vec<Subject>> {
        let user_id = user_id.to_string();
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, user_id, name, created_at, last_accessed_at, access_count
                 FROM subjects
                 WHERE user_id = ?1
                 ORDER BY created_at ASC",
            )?;

            let mut rows = stmt.query(params![user_id])?;
            let mut subjects = Vec::new();
            while let Some(row) = rows.next()? {
                subjects.push(row_to_subject(row)?);
            }

            Ok(subjects)
        })
        .await
    }

    /// Bump `access_count` and refresh `last_accessed_at` in one statement.
    /// The increment happens inside SQLite, so concurrent recordings cannot
    /// lose counts to a read-modify-write interleaving.
    pub async fn record_subject_access(
        &self,
        user_id: &str,
        subject_id: &str,
        accessed_at: DateTime<Utc>,
    ) -> Result<()> {
        let user_id = user_id.to_string();
        let subject_id = subject_id.to_string();
        self.execute(move |conn| {
            let rows_affected = conn
                .execute(
                    "UPDATE subjects
                     SET access_count = access_count + 1,
                         last_accessed_at = ?1
                     WHERE id = ?2 AND user_id = ?3",
                    params![accessed_at.to_rfc3339(), subject_id, user_id],
                )
                .context("failed to record subject access")?;

            if rows_affected == 0 {
                return Err(anyhow!("subject {subject_id} not found"));
            }

            Ok(())
        })
        .await
    }

    pub async fn subject_name_exists(&self, user_id: &str, name: &str) -> Result<bool> {
        let user_id = user_id.to_string();
        let name = name.to_string();
        self.execute(move |conn| {
            let existing: Option<String> = conn
                .query_row(
                    "SELECT id FROM subjects WHERE user_id = ?1 AND name = ?2",
                    params![user_id, name],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(existing.is_some())
        })
        .await
    }
}
