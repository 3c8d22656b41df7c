use thiserror::Error;

/// Failure taxonomy for the chat core. Remote-call failures are converted
/// to one of these at the controller / document-manager boundary; raw
/// transport errors never cross it.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ChatError {
    /// Missing or rejected turn input. No state change.
    #[error("validation error: {0}")]
    Validation(String),

    /// The remote upload call failed; nothing was created remotely.
    #[error("upload error: {0}")]
    Upload(String),

    /// The polling budget ran out before the remote file became active.
    #[error("processing timed out: {0}")]
    ProcessingTimeout(String),

    /// The provider reported the file's processing as failed.
    #[error("processing failed: {0}")]
    ProcessingFailed(String),

    /// The generation call failed. The user message stays in history;
    /// no assistant message is appended.
    #[error("generation error: {0}")]
    Generation(String),

    /// Durable-storage failure. Logged and non-fatal: in-memory state
    /// remains authoritative for the rest of the process lifetime.
    #[error("persistence error: {0}")]
    Persistence(String),
}

pub type ChatResult<T> = Result<T, ChatError>;
