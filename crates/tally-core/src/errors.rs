use thiserror::Error;

/// Failure taxonomy for the snapshot store and its read surface.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Malformed or incomplete snapshot document; rejected before anything
    /// is persisted.
    #[error("validation failed for '{field}': {reason}")]
    Validation { field: String, reason: String },

    /// Lookup where a single result was required.
    #[error("not found: {0}")]
    NotFound(String),

    /// The backing store could not be reached within the bounded timeout.
    /// Transient; callers may retry with backoff.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("storage error: {0}")]
    Storage(rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        use rusqlite::ErrorCode;
        match &e {
            // A busy/locked database is contention, not corruption. Keep it
            // distinguishable so callers can retry instead of treating the
            // failure as "no data".
            rusqlite::Error::SqliteFailure(f, _)
                if matches!(f.code, ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked) =>
            {
                StoreError::Unavailable(e.to_string())
            }
            _ => StoreError::Storage(e),
        }
    }
}

#[derive(Debug, Error)]
#[error("config error: {0}")]
pub struct ConfigError(pub String);
