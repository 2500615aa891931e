pub mod draft;
pub mod error;
pub mod export;
pub mod fetch;

use std::sync::Arc;
use std::time::Duration;

use crate::backend::TriageBackend;
use crate::domain::email::Email;
use crate::store::{EmailCollection, OperationState, StatusSnapshot};

pub use draft::DraftCoordinator;
pub use error::TriageError;
pub use export::ExportTrigger;
pub use fetch::{FetchCoordinator, FetchOutcome, PersistTask};

/// One triage session: the shared batch, its status, and the coordinators
/// that mutate them. Cloning is cheap and every clone sees the same state.
#[derive(Clone)]
pub struct TriageSession {
    backend: Arc<dyn TriageBackend>,
    collection: Arc<EmailCollection>,
    state: Arc<OperationState>,
    fetcher: FetchCoordinator,
    drafter: DraftCoordinator,
    exporter: ExportTrigger,
}

impl TriageSession {
    pub fn new(backend: Arc<dyn TriageBackend>, export_window: Duration) -> Self {
        let collection = Arc::new(EmailCollection::new());
        let state = OperationState::new();
        let fetcher = FetchCoordinator::new(
            Arc::clone(&backend),
            Arc::clone(&collection),
            Arc::clone(&state),
        );
        let drafter = DraftCoordinator::new(
            Arc::clone(&backend),
            Arc::clone(&collection),
            Arc::clone(&state),
        );
        let exporter = ExportTrigger::new(backend.export_url(), export_window);
        Self {
            backend,
            collection,
            state,
            fetcher,
            drafter,
            exporter,
        }
    }

    pub async fn fetch(&self, count: u32) -> Result<FetchOutcome, TriageError> {
        self.fetcher.fetch(count).await
    }

    pub async fn load_saved(&self) -> Result<FetchOutcome, TriageError> {
        self.fetcher.load_saved().await
    }

    pub async fn generate_draft(&self, email: &Email) -> Result<String, TriageError> {
        self.drafter.generate_draft(email).await
    }

    /// Drafts every replied email in the current batch that has none yet,
    /// concurrently. Returns `(email id, outcome)` in batch order.
    pub async fn draft_pending(&self) -> Vec<(String, Result<String, TriageError>)> {
        let pending: Vec<Email> = self
            .collection
            .snapshot()
            .iter()
            .filter(|e| e.wants_draft())
            .cloned()
            .collect();
        self.draft_all(pending).await
    }

    /// Drafts each of `emails` concurrently, without checking whether they
    /// already have one.
    pub async fn draft_all(&self, emails: Vec<Email>) -> Vec<(String, Result<String, TriageError>)> {
        let mut tasks = tokio::task::JoinSet::new();
        for (idx, email) in emails.into_iter().enumerate() {
            let drafter = self.drafter.clone();
            tasks.spawn(async move {
                let outcome = drafter.generate_draft(&email).await;
                (idx, email.id, outcome)
            });
        }

        let mut results = Vec::with_capacity(tasks.len());
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(r) => results.push(r),
                Err(e) => log::warn!("draft task did not complete: {e}"),
            }
        }
        results.sort_by_key(|(idx, _, _)| *idx);
        results.into_iter().map(|(_, id, r)| (id, r)).collect()
    }

    /// Puts a draft generated earlier back onto the record with `id`,
    /// without a request. Returns false when `id` is not in the batch.
    pub fn restore_draft(&self, id: &str, draft: &str) -> bool {
        self.collection.patch_one(id, |e| e.with_draft(draft))
    }

    pub fn export_now(&self) {
        self.exporter.export_now();
    }

    pub fn exporter(&self) -> &ExportTrigger {
        &self.exporter
    }

    pub fn backend(&self) -> &Arc<dyn TriageBackend> {
        &self.backend
    }

    pub fn emails(&self) -> Arc<Vec<Email>> {
        self.collection.snapshot()
    }

    pub fn email(&self, id: &str) -> Option<Email> {
        self.collection.get(id)
    }

    pub fn status(&self) -> StatusSnapshot {
        self.state.snapshot()
    }

    pub fn state(&self) -> &Arc<OperationState> {
        &self.state
    }
}
