use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A subject the user records study time against.
///
/// `access_count` and `last_accessed_at` are bumped atomically each time a
/// session is recorded for the subject; the recorder UI uses them to surface
/// the most recently and most frequently used subjects.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subject {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub last_accessed_at: Option<DateTime<Utc>>,
    pub access_count: u64,
}
