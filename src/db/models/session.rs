use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One recorded study interval. Immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudySession {
    pub id: String,
    pub user_id: String,
    pub subject_id: String,
    /// Always greater than zero; validated before insertion.
    pub time_minutes: u32,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
}
