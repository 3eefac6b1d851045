use crate::db::DBError;
use thiserror::Error;

/// Failure taxonomy of the assistant orchestrator. Mapped to the three
/// user-facing categories at the web boundary; full detail stays in the logs.
#[derive(Error, Debug)]
pub enum AssistantError {
    #[error("Assistant is not configured: {0}")]
    Configuration(String),

    #[error("Failed to create remote thread: {0}")]
    ThreadCreation(String),

    #[error("Run did not reach a terminal state within the poll budget")]
    RunTimeout,

    #[error("Run failed: {0}")]
    RunFailed(String),

    #[error("Run ended with status: {0}")]
    RunEnded(String),

    #[error("Assistant reply was empty or had an unexpected shape")]
    MalformedResponse,

    #[error("Assistant API returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Assistant API request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Database(#[from] DBError),
}
