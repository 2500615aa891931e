use std::sync::Arc;

use crate::backend::{DraftRequest, TriageBackend};
use crate::domain::email::Email;
use crate::store::{EmailCollection, OperationKind, OperationState};
use crate::triage::error::TriageError;

/// Drives per-row draft generation. Each call patches at most the one record
/// whose id it was given, so calls for different ids can run side by side.
#[derive(Clone)]
pub struct DraftCoordinator {
    backend: Arc<dyn TriageBackend>,
    collection: Arc<EmailCollection>,
    state: Arc<OperationState>,
}

impl DraftCoordinator {
    pub fn new(
        backend: Arc<dyn TriageBackend>,
        collection: Arc<EmailCollection>,
        state: Arc<OperationState>,
    ) -> Self {
        Self {
            backend,
            collection,
            state,
        }
    }

    /// Requests a draft for `email` and stores it on the matching record.
    ///
    /// Callers only offer this for replied emails without a draft
    /// ([`Email::wants_draft`]). Nothing is vetoed here: a repeated call that
    /// succeeds replaces the earlier draft.
    pub async fn generate_draft(&self, email: &Email) -> Result<String, TriageError> {
        let op = self.state.begin(OperationKind::Draft);
        if !email.is_replied() {
            log::debug!("generating draft for {} which is not marked replied", email.id);
        }

        let request = DraftRequest::for_email(email);
        match self.backend.generate_draft(&request).await {
            Ok(draft) => {
                let patched = self
                    .collection
                    .patch_one(&email.id, |current| current.with_draft(draft.as_str()));
                if patched {
                    log::info!("draft ready for {}", email.id);
                } else {
                    log::info!("email {} left the batch before its draft arrived", email.id);
                }
                drop(op);
                Ok(draft)
            }
            Err(e) => {
                log::warn!("draft for {} failed: {e}", email.id);
                op.fail(TriageError::DraftFailed.to_string());
                Err(TriageError::DraftFailed)
            }
        }
    }
}
