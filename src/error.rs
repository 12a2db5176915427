use thiserror::Error;

/// Error surface of the tracking core.
///
/// Store-level failures carry the underlying [`anyhow::Error`] so callers can
/// log the full context chain, but they are never conflated with "no data":
/// a read failure during aggregation fails the whole operation.
#[derive(Debug, Error)]
pub enum StudyError {
    /// The identity provider reported no signed-in user.
    #[error("not authenticated")]
    NotAuthenticated,

    /// Rejected before any write reached the store.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// An underlying store read or write failed.
    #[error("store unavailable: {0:#}")]
    StoreUnavailable(anyhow::Error),

    /// One subject's range query failed during an all-subjects fan-out.
    /// The operation aborts rather than returning an incomplete total.
    #[error("aggregation failed for subject {subject_id}: {cause:#}")]
    PartialAggregation {
        subject_id: String,
        cause: anyhow::Error,
    },
}

impl From<anyhow::Error> for StudyError {
    fn from(err: anyhow::Error) -> Self {
        StudyError::StoreUnavailable(err)
    }
}
