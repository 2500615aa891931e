use async_trait::async_trait;
use reqwest::Response;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

use crate::backend::{BackendError, DraftRequest, TriageBackend};
use crate::domain::email::Email;

const DETECT_PATH: &str = "api/unreplied-detect";
const SAVE_PATH: &str = "api/save-emails";
const DRAFT_PATH: &str = "api/generate-draft";
const EXPORT_PATH: &str = "api/export";
const SAVED_PATH: &str = "api/emails";

/// `reqwest` client for the assistant's HTTP API.
///
/// The API reports application failures with a 200 and an `error` field (or
/// `success: false`), so every body is checked as well as the status.
#[derive(Clone)]
pub struct HttpBackend {
    http: reqwest::Client,
    base: Url,
    export: Url,
}

#[derive(Debug, Deserialize)]
struct BatchResponse {
    #[serde(default)]
    emails: Vec<Email>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Ack {
    #[serde(default)]
    success: Option<bool>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DraftResponse {
    #[serde(default)]
    success: Option<bool>,
    #[serde(default)]
    draft: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Serialize)]
struct SaveRequest<'a> {
    emails: &'a [Email],
}

impl BatchResponse {
    fn into_emails(self) -> Result<Vec<Email>, BackendError> {
        match self.error {
            Some(e) => Err(BackendError::Rejected(e)),
            None => Ok(self.emails),
        }
    }
}

impl Ack {
    fn into_result(self) -> Result<(), BackendError> {
        if let Some(e) = self.error {
            return Err(BackendError::Rejected(e));
        }
        if self.success == Some(false) {
            return Err(BackendError::rejected("success=false"));
        }
        Ok(())
    }
}

impl DraftResponse {
    fn into_draft(self) -> Result<String, BackendError> {
        Ack {
            success: self.success,
            error: self.error,
        }
        .into_result()?;
        self.draft.ok_or(BackendError::MissingField("draft"))
    }
}

impl HttpBackend {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, BackendError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10))
            .user_agent("inbox-triage/0.1")
            .build()?;
        let base = normalize_base(base_url)?;
        let export = base.join(EXPORT_PATH)?;
        Ok(Self { http, base, export })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    fn endpoint(&self, path: &str) -> Result<Url, BackendError> {
        Ok(self.base.join(path)?)
    }
}

/// `Url::join` drops the last path segment unless the base ends in `/`.
fn normalize_base(base_url: &str) -> Result<Url, BackendError> {
    let trimmed = base_url.trim();
    if trimmed.ends_with('/') {
        Ok(Url::parse(trimmed)?)
    } else {
        Ok(Url::parse(&format!("{trimmed}/"))?)
    }
}

async fn check_status(response: Response) -> Result<Response, BackendError> {
    if response.status().is_success() {
        Ok(response)
    } else {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        Err(BackendError::Status { status, body })
    }
}

async fn decode<T: serde::de::DeserializeOwned>(response: Response) -> Result<T, BackendError> {
    let response = check_status(response).await?;
    let bytes = response.bytes().await?;
    Ok(serde_json::from_slice(&bytes)?)
}

#[async_trait]
impl TriageBackend for HttpBackend {
    async fn detect_batch(&self, count: u32) -> Result<Vec<Email>, BackendError> {
        let mut url = self.endpoint(DETECT_PATH)?;
        url.query_pairs_mut()
            .append_pair("count", &count.to_string());
        let response = self.http.get(url).send().await?;
        decode::<BatchResponse>(response).await?.into_emails()
    }

    async fn persist_batch(&self, emails: &[Email]) -> Result<(), BackendError> {
        let url = self.endpoint(SAVE_PATH)?;
        let response = self
            .http
            .post(url)
            .json(&SaveRequest { emails })
            .send()
            .await?;
        decode::<Ack>(response).await?.into_result()
    }

    async fn generate_draft(&self, request: &DraftRequest) -> Result<String, BackendError> {
        let url = self.endpoint(DRAFT_PATH)?;
        let response = self.http.post(url).json(request).send().await?;
        decode::<DraftResponse>(response).await?.into_draft()
    }

    fn export_url(&self) -> Url {
        self.export.clone()
    }

    async fn download_export(&self) -> Result<Vec<u8>, BackendError> {
        let response = self.http.get(self.export.clone()).send().await?;
        let response = check_status(response).await?;
        Ok(response.bytes().await?.to_vec())
    }

    async fn saved_batch(&self) -> Result<Vec<Email>, BackendError> {
        let url = self.endpoint(SAVED_PATH)?;
        let response = self.http.get(url).send().await?;
        decode::<BatchResponse>(response).await?.into_emails()
    }

    async fn healthcheck(&self) -> Result<(), BackendError> {
        let response = self.http.get(self.base.clone()).send().await?;
        check_status(response).await.map(|_| ())
    }
}
