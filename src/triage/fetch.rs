use parking_lot::Mutex;
use std::sync::Arc;
use tokio::task::JoinHandle;

use crate::backend::TriageBackend;
use crate::domain::email::Email;
use crate::store::{EmailCollection, OperationGuard, OperationKind, OperationState};
use crate::triage::error::TriageError;

/// What happened to a fetch that did not fail.
#[derive(Debug)]
pub enum FetchOutcome {
    /// The batch replaced the collection. `persist` is the detached
    /// persistence call, if one was started.
    Applied {
        count: usize,
        persist: Option<PersistTask>,
    },
    /// A newer fetch was issued while this one was in flight; its result was
    /// dropped.
    Superseded,
}

impl FetchOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, FetchOutcome::Applied { .. })
    }

    /// Waits for the background persistence call, if any.
    pub async fn settle(self) {
        if let FetchOutcome::Applied {
            persist: Some(task),
            ..
        } = self
        {
            task.wait().await;
        }
    }
}

/// Handle to a detached persistence call. Dropping it does not cancel the
/// call. The fetch stays `loading` until the call ends, and its outcome lands
/// in [`OperationState::persist_error`] unless a newer batch replaced it.
#[derive(Debug)]
pub struct PersistTask {
    handle: JoinHandle<()>,
}

impl PersistTask {
    pub async fn wait(self) {
        if let Err(e) = self.handle.await {
            log::warn!("persist task did not complete: {e}");
        }
    }
}

/// Drives "load N emails": detect, replace the collection, persist.
///
/// Every call takes a sequence number. A result is only applied while its
/// number is still the newest issued, so a slow, superseded call can never
/// overwrite the batch of a later one.
///
/// Persistence calls run one at a time, in the order they get the lane, and
/// a call whose batch is no longer the applied one is skipped. The backend
/// therefore always ends up holding the batch the collection holds.
#[derive(Clone)]
pub struct FetchCoordinator {
    backend: Arc<dyn TriageBackend>,
    collection: Arc<EmailCollection>,
    state: Arc<OperationState>,
    seqs: Arc<Mutex<Sequence>>,
    persist_lane: Arc<tokio::sync::Mutex<()>>,
}

#[derive(Debug, Default)]
struct Sequence {
    issued: u64,
    applied: u64,
}

impl FetchCoordinator {
    pub fn new(
        backend: Arc<dyn TriageBackend>,
        collection: Arc<EmailCollection>,
        state: Arc<OperationState>,
    ) -> Self {
        Self {
            backend,
            collection,
            state,
            seqs: Arc::new(Mutex::new(Sequence::default())),
            persist_lane: Arc::new(tokio::sync::Mutex::new(())),
        }
    }

    /// Fetches up to `count` emails. Callers keep `count` within 1..=50; it
    /// is passed through unchecked.
    pub async fn fetch(&self, count: u32) -> Result<FetchOutcome, TriageError> {
        let op = self.state.begin(OperationKind::Fetch);
        let seq = self.issue();
        log::debug!("fetch #{seq} requesting {count} emails");

        let result = self.backend.detect_batch(count).await;

        match result {
            Ok(emails) => {
                if !self.apply_if_latest(seq, &emails) {
                    log::info!("fetch #{seq} superseded; dropping {} emails", emails.len());
                    return Ok(FetchOutcome::Superseded);
                }
                log::info!("fetch #{seq} loaded {} emails", emails.len());
                let count = emails.len();
                let persist = self.spawn_persist(seq, emails, op);
                Ok(FetchOutcome::Applied {
                    count,
                    persist: Some(persist),
                })
            }
            Err(e) => {
                if !self.is_latest(seq) {
                    log::info!("fetch #{seq} superseded; ignoring failure: {e}");
                    return Ok(FetchOutcome::Superseded);
                }
                log::warn!("fetch #{seq} failed: {e}");
                op.fail(TriageError::FetchFailed.to_string());
                Err(TriageError::FetchFailed)
            }
        }
    }

    /// Seeds the collection with the batch the persistence service stored
    /// last. Goes through the same sequence gate as [`fetch`](Self::fetch)
    /// but is not persisted again.
    pub async fn load_saved(&self) -> Result<FetchOutcome, TriageError> {
        let op = self.state.begin(OperationKind::Fetch);
        let seq = self.issue();

        match self.backend.saved_batch().await {
            Ok(emails) => {
                if !self.apply_if_latest(seq, &emails) {
                    return Ok(FetchOutcome::Superseded);
                }
                log::info!("restored {} saved emails", emails.len());
                Ok(FetchOutcome::Applied {
                    count: emails.len(),
                    persist: None,
                })
            }
            Err(e) => {
                if !self.is_latest(seq) {
                    return Ok(FetchOutcome::Superseded);
                }
                log::warn!("loading saved emails failed: {e}");
                op.fail(TriageError::FetchFailed.to_string());
                Err(TriageError::FetchFailed)
            }
        }
    }

    fn issue(&self) -> u64 {
        let mut seqs = self.seqs.lock();
        seqs.issued += 1;
        seqs.issued
    }

    fn is_latest(&self, seq: u64) -> bool {
        self.seqs.lock().issued == seq
    }

    // The check and the swap happen under one lock so two completions
    // cannot interleave between them.
    fn apply_if_latest(&self, seq: u64, emails: &[Email]) -> bool {
        let mut seqs = self.seqs.lock();
        if seqs.issued != seq {
            return false;
        }
        self.collection.replace_all(emails.to_vec());
        seqs.applied = seq;
        true
    }

    /// Persists `emails` in the background. `op` moves into the task so the
    /// fetch counts as loading until the backend has answered.
    fn spawn_persist(&self, seq: u64, emails: Vec<Email>, op: OperationGuard) -> PersistTask {
        let backend = Arc::clone(&self.backend);
        let state = Arc::clone(&self.state);
        let seqs = Arc::clone(&self.seqs);
        let lane = Arc::clone(&self.persist_lane);
        let handle = tokio::spawn(async move {
            let _op = op;
            let _lane = lane.lock().await;
            if !is_applied(&seqs, seq) {
                log::debug!("fetch #{seq} replaced before persisting; skipping");
                return;
            }
            let outcome = backend.persist_batch(&emails).await;
            // A newer batch owns the backend state and the outcome now.
            if !is_applied(&seqs, seq) {
                log::debug!("fetch #{seq} replaced while persisting; dropping outcome");
                return;
            }
            match outcome {
                Ok(()) => {
                    log::debug!("fetch #{seq} persisted {} emails", emails.len());
                    state.record_persist(Ok(()));
                }
                Err(e) => {
                    log::warn!("fetch #{seq} persisting batch failed: {e}");
                    state.record_persist(Err(e.to_string()));
                }
            }
        });
        PersistTask { handle }
    }
}

fn is_applied(seqs: &Mutex<Sequence>, seq: u64) -> bool {
    seqs.lock().applied == seq
}
