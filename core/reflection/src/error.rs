use moodring_journal::JournalError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CompletionError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{provider} API error ({status}): {body}")]
    Api {
        provider: &'static str,
        status: u16,
        body: String,
    },

    #[error("Empty response from {0}")]
    EmptyResponse(&'static str),

    #[error("Completion provider misconfigured: {0}")]
    Config(String),
}

/// Why a reflection flow could not produce text. Logged, never shown to users.
#[derive(Debug, Error)]
pub enum ReflectionError {
    #[error("journal error: {0}")]
    Journal(#[from] JournalError),

    #[error("completion error: {0}")]
    Completion(#[from] CompletionError),
}
