use moodring_schemas::InfluenceId;
use thiserror::Error;

/// Failures raised by a store implementation. The message is wrapped, never interpreted.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Invalid timestamp in store: {0}")]
    InvalidTimestamp(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Constraint violated: {0}")]
    Constraint(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Error)]
pub enum JournalError {
    #[error("influence content is empty")]
    EmptyContent,

    #[error("influence {0} not found")]
    NotFound(InfluenceId),

    #[error("influence {0} cannot be linked to itself")]
    SelfLink(InfluenceId),

    #[error("store failure: {0}")]
    Store(#[from] StoreError),
}

impl JournalError {
    /// Message safe to show an end user. Store details stay in the logs.
    pub fn user_message(&self) -> &'static str {
        match self {
            JournalError::EmptyContent => "Cannot save an empty influence.",
            JournalError::NotFound(_) => "That influence no longer exists.",
            JournalError::SelfLink(_) => "An influence cannot be linked to itself.",
            JournalError::Store(_) => "Something went wrong while talking to the journal. Please try again.",
        }
    }
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;
pub type Result<T> = std::result::Result<T, JournalError>;
