#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::oneshot;
use url::Url;

use inbox_triage::backend::{BackendError, DraftRequest, TriageBackend};
use inbox_triage::domain::email::Email;
use inbox_triage::triage::TriageSession;

type Gate = Option<oneshot::Receiver<()>>;

/// In-memory stand-in for the assistant's API. Responses are scripted per
/// call; a gated response waits until its sender fires (or is dropped).
#[derive(Default)]
pub struct FakeBackend {
    detect: Mutex<VecDeque<(Gate, Result<Vec<Email>, String>)>>,
    drafts: Mutex<HashMap<String, VecDeque<(Gate, Result<String, String>)>>>,
    saved: Mutex<Option<Result<Vec<Email>, String>>>,
    persists: Mutex<VecDeque<(Gate, Result<(), String>)>>,
    persist_fails: AtomicBool,
    detect_calls: AtomicUsize,
    persist_calls: AtomicUsize,
    export_calls: AtomicUsize,
    pub persisted: Mutex<Vec<Vec<Email>>>,
    pub draft_requests: Mutex<Vec<DraftRequest>>,
}

impl FakeBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push_detect(&self, result: Result<Vec<Email>, &str>) {
        self.detect
            .lock()
            .push_back((None, result.map_err(str::to_string)));
    }

    pub fn push_detect_gated(&self, result: Result<Vec<Email>, &str>) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.detect
            .lock()
            .push_back((Some(rx), result.map_err(str::to_string)));
        tx
    }

    pub fn push_draft(&self, id: &str, result: Result<&str, &str>) {
        self.drafts
            .lock()
            .entry(id.to_string())
            .or_default()
            .push_back((None, result.map(str::to_string).map_err(str::to_string)));
    }

    pub fn push_draft_gated(&self, id: &str, result: Result<&str, &str>) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.drafts
            .lock()
            .entry(id.to_string())
            .or_default()
            .push_back((Some(rx), result.map(str::to_string).map_err(str::to_string)));
        tx
    }

    pub fn set_saved(&self, result: Result<Vec<Email>, &str>) {
        *self.saved.lock() = Some(result.map_err(str::to_string));
    }

    /// Scripts the next persist call: it waits for the returned sender, then
    /// records the batch unless `result` is an error.
    pub fn push_persist_gated(&self, result: Result<(), &str>) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.persists
            .lock()
            .push_back((Some(rx), result.map_err(str::to_string)));
        tx
    }

    pub fn fail_persist(&self, fail: bool) {
        self.persist_fails.store(fail, Ordering::SeqCst);
    }

    pub fn detect_calls(&self) -> usize {
        self.detect_calls.load(Ordering::SeqCst)
    }

    pub fn persist_calls(&self) -> usize {
        self.persist_calls.load(Ordering::SeqCst)
    }

    pub fn export_calls(&self) -> usize {
        self.export_calls.load(Ordering::SeqCst)
    }
}

async fn open_gate(gate: Gate) {
    if let Some(rx) = gate {
        let _ = rx.await;
    }
}

#[async_trait]
impl TriageBackend for FakeBackend {
    async fn detect_batch(&self, _count: u32) -> Result<Vec<Email>, BackendError> {
        self.detect_calls.fetch_add(1, Ordering::SeqCst);
        let (gate, result) = self
            .detect
            .lock()
            .pop_front()
            .unwrap_or((None, Ok(Vec::new())));
        open_gate(gate).await;
        result.map_err(BackendError::Rejected)
    }

    async fn persist_batch(&self, emails: &[Email]) -> Result<(), BackendError> {
        self.persist_calls.fetch_add(1, Ordering::SeqCst);
        let scripted = self.persists.lock().pop_front();
        if let Some((gate, result)) = scripted {
            open_gate(gate).await;
            result.map_err(BackendError::Rejected)?;
        } else if self.persist_fails.load(Ordering::SeqCst) {
            return Err(BackendError::rejected("disk full"));
        }
        self.persisted.lock().push(emails.to_vec());
        Ok(())
    }

    async fn generate_draft(&self, request: &DraftRequest) -> Result<String, BackendError> {
        self.draft_requests.lock().push(request.clone());
        let scripted = self
            .drafts
            .lock()
            .get_mut(&request.email_id)
            .and_then(|q| q.pop_front());
        let (gate, result) =
            scripted.unwrap_or_else(|| (None, Ok(format!("Re: {}", request.body))));
        open_gate(gate).await;
        result.map_err(BackendError::Rejected)
    }

    fn export_url(&self) -> Url {
        Url::parse("http://triage.test/api/export").unwrap()
    }

    async fn download_export(&self) -> Result<Vec<u8>, BackendError> {
        self.export_calls.fetch_add(1, Ordering::SeqCst);
        Ok(b"id,thread_id\n".to_vec())
    }

    async fn saved_batch(&self) -> Result<Vec<Email>, BackendError> {
        match self.saved.lock().clone() {
            Some(r) => r.map_err(BackendError::Rejected),
            None => Ok(Vec::new()),
        }
    }

    async fn healthcheck(&self) -> Result<(), BackendError> {
        Ok(())
    }
}

pub fn session(backend: &Arc<FakeBackend>) -> TriageSession {
    TriageSession::new(backend.clone(), Duration::from_millis(1000))
}

pub fn email(id: &str, replied: bool) -> Email {
    Email {
        id: id.to_string(),
        thread_id: format!("thread-{id}"),
        sender: format!("{id}@example.com"),
        subject: format!("Subject {id}"),
        timestamp: "1718000000000".to_string(),
        body: Some(format!("Body of {id}")),
        summary: Some(format!("Summary of {id}")),
        replied: Some(replied),
        draft: if replied { None } else { Some(format!("auto draft {id}")) },
    }
}

/// Lets spawned tasks run until `cond` holds.
pub async fn until(mut cond: impl FnMut() -> bool) {
    for _ in 0..1000 {
        if cond() {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("condition never became true");
}
