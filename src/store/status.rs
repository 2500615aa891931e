use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    Fetch,
    Draft,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationKind::Fetch => f.write_str("fetch"),
            OperationKind::Draft => f.write_str("draft"),
        }
    }
}

pub type OperationId = u64;

/// What callers see: the aggregate of every in-flight operation plus the
/// last reported failures.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusSnapshot {
    pub loading: bool,
    pub error: Option<String>,
    pub persist_error: Option<String>,
    pub in_flight: Vec<(OperationId, OperationKind)>,
}

#[derive(Debug, Default)]
struct Inner {
    next_id: OperationId,
    in_flight: BTreeMap<OperationId, OperationKind>,
    error: Option<String>,
    persist_error: Option<String>,
}

/// Shared loading/error status.
///
/// Each coordinator call registers its own record through [`OperationState::begin`]
/// and `loading` is derived from the set of records, so one call finishing
/// never clears the loading state of another. `error` is a single slot:
/// cleared when any operation begins, overwritten by whichever failure is
/// reported last.
#[derive(Debug, Default)]
pub struct OperationState {
    inner: Mutex<Inner>,
}

impl OperationState {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn begin(self: &Arc<Self>, kind: OperationKind) -> OperationGuard {
        let mut inner = self.inner.lock();
        inner.next_id += 1;
        let id = inner.next_id;
        inner.in_flight.insert(id, kind);
        inner.error = None;
        log::debug!("operation {id} ({kind}) started");
        OperationGuard {
            state: Arc::clone(self),
            id,
            kind,
            failure: None,
        }
    }

    pub fn is_loading(&self) -> bool {
        !self.inner.lock().in_flight.is_empty()
    }

    pub fn is_running(&self, kind: OperationKind) -> bool {
        self.inner.lock().in_flight.values().any(|k| *k == kind)
    }

    pub fn error(&self) -> Option<String> {
        self.inner.lock().error.clone()
    }

    pub fn persist_error(&self) -> Option<String> {
        self.inner.lock().persist_error.clone()
    }

    /// Outcome of a background persistence call. It never touches `error`.
    pub fn record_persist(&self, outcome: Result<(), String>) {
        self.inner.lock().persist_error = outcome.err();
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        let inner = self.inner.lock();
        StatusSnapshot {
            loading: !inner.in_flight.is_empty(),
            error: inner.error.clone(),
            persist_error: inner.persist_error.clone(),
            in_flight: inner.in_flight.iter().map(|(id, k)| (*id, *k)).collect(),
        }
    }

    fn finish(&self, id: OperationId, failure: Option<String>) {
        let mut inner = self.inner.lock();
        inner.in_flight.remove(&id);
        if failure.is_some() {
            inner.error = failure;
        }
    }
}

/// Registration of one in-flight operation. Dropping it ends the operation,
/// so every exit path clears its share of `loading`.
#[must_use = "dropping the guard ends the operation immediately"]
pub struct OperationGuard {
    state: Arc<OperationState>,
    id: OperationId,
    kind: OperationKind,
    failure: Option<String>,
}

impl OperationGuard {
    /// Ends the operation and publishes `message` as the current error.
    pub fn fail(mut self, message: impl Into<String>) {
        self.failure = Some(message.into());
    }
}

impl Drop for OperationGuard {
    fn drop(&mut self) {
        match &self.failure {
            Some(msg) => log::debug!("operation {} ({}) failed: {msg}", self.id, self.kind),
            None => log::debug!("operation {} ({}) finished", self.id, self.kind),
        }
        self.state.finish(self.id, self.failure.take());
    }
}
