use parking_lot::RwLock;
use std::sync::Arc;

use crate::domain::email::Email;

/// The current ordered batch of emails.
///
/// Readers get an `Arc` snapshot, so a `replace_all` is observed either fully
/// or not at all. Locks are never held across an `.await`.
#[derive(Debug, Default)]
pub struct EmailCollection {
    emails: RwLock<Arc<Vec<Email>>>,
}

impl EmailCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn replace_all(&self, emails: Vec<Email>) {
        *self.emails.write() = Arc::new(emails);
    }

    /// Replaces the record with the given id by `updater(record)`.
    ///
    /// Returns `false` when no record matches; the id may have been dropped
    /// by an intervening fetch, which is not an error.
    pub fn patch_one<F>(&self, id: &str, updater: F) -> bool
    where
        F: FnOnce(&Email) -> Email,
    {
        let mut guard = self.emails.write();
        let Some(pos) = guard.iter().position(|e| e.id == id) else {
            return false;
        };
        let patched = updater(&guard[pos]);
        Arc::make_mut(&mut *guard)[pos] = patched;
        true
    }

    pub fn snapshot(&self) -> Arc<Vec<Email>> {
        self.emails.read().clone()
    }

    pub fn get(&self, id: &str) -> Option<Email> {
        self.emails.read().iter().find(|e| e.id == id).cloned()
    }

    pub fn len(&self) -> usize {
        self.emails.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.emails.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn email(id: &str) -> Email {
        Email {
            id: id.into(),
            thread_id: format!("t-{id}"),
            sender: "carol@example.com".into(),
            subject: format!("subject {id}"),
            timestamp: "0".into(),
            body: None,
            summary: None,
            replied: Some(true),
            draft: None,
        }
    }

    #[test]
    fn replace_all_does_not_disturb_held_snapshots() {
        let store = EmailCollection::new();
        store.replace_all(vec![email("a"), email("b")]);
        let before = store.snapshot();

        store.replace_all(vec![email("c")]);

        assert_eq!(before.len(), 2);
        assert_eq!(store.len(), 1);
        assert_eq!(store.snapshot()[0].id, "c");
    }

    #[test]
    fn patch_one_only_touches_matching_record() {
        let store = EmailCollection::new();
        store.replace_all(vec![email("a"), email("b"), email("c")]);

        assert!(store.patch_one("b", |e| e.with_draft("ok")));

        let now = store.snapshot();
        assert_eq!(now[0], email("a"));
        assert_eq!(now[1].draft.as_deref(), Some("ok"));
        assert_eq!(now[2], email("c"));
    }

    #[test]
    fn patch_one_on_missing_id_is_a_quiet_miss() {
        let store = EmailCollection::new();
        store.replace_all(vec![email("a")]);

        assert!(!store.patch_one("gone", |e| e.with_draft("x")));
        assert_eq!(*store.snapshot(), vec![email("a")]);
    }
}
