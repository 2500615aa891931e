use thiserror::Error;

/// The only failures a user ever sees. Backend detail stays in the log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TriageError {
    #[error("Failed to fetch emails.")]
    FetchFailed,
    #[error("Failed to generate draft.")]
    DraftFailed,
}
