use reqwest::StatusCode;
use thiserror::Error;

/// Failures talking to the triage backend. These are logged by the
/// coordinators and never shown to the user as-is.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("backend HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("backend returned status {status}: {body}")]
    Status { status: StatusCode, body: String },
    #[error("backend rejected the request: {0}")]
    Rejected(String),
    #[error("backend response is missing `{0}`")]
    MissingField(&'static str),
    #[error("failed to decode backend response: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("invalid backend URL: {0}")]
    Url(#[from] url::ParseError),
}

impl BackendError {
    pub fn rejected(message: impl Into<String>) -> Self {
        BackendError::Rejected(message.into())
    }
}
