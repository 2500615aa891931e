pub mod error;
pub mod http;

use async_trait::async_trait;
use serde::Serialize;
use url::Url;

use crate::domain::email::{Email, EmailId};

pub use error::BackendError;
pub use http::HttpBackend;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DraftRequest {
    pub email_id: EmailId,
    pub body: String,
}

impl DraftRequest {
    pub fn for_email(email: &Email) -> Self {
        Self {
            email_id: email.id.clone(),
            body: email.draft_input().to_string(),
        }
    }
}

/// The services the triage session talks to. Every method is one request;
/// nothing here touches local state.
#[async_trait]
pub trait TriageBackend: Send + Sync {
    /// Up to `count` candidate emails, newest first.
    async fn detect_batch(&self, count: u32) -> Result<Vec<Email>, BackendError>;

    async fn persist_batch(&self, emails: &[Email]) -> Result<(), BackendError>;

    async fn generate_draft(&self, request: &DraftRequest) -> Result<String, BackendError>;

    /// Where the bulk export can be downloaded from. Does not issue a request.
    fn export_url(&self) -> Url;

    async fn download_export(&self) -> Result<Vec<u8>, BackendError>;

    /// The batch the persistence service stored last.
    async fn saved_batch(&self) -> Result<Vec<Email>, BackendError>;

    async fn healthcheck(&self) -> Result<(), BackendError>;
}
