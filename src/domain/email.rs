use serde::{Deserialize, Serialize};

pub type EmailId = String;

/// One candidate email as returned by the detection service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Email {
    pub id: EmailId,
    pub thread_id: String,
    pub sender: String,
    pub subject: String,
    pub timestamp: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replied: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub draft: Option<String>,
}

impl Email {
    pub fn is_replied(&self) -> bool {
        self.replied.unwrap_or(false)
    }

    /// The detection service sends `""` for "no draft yet".
    pub fn has_draft(&self) -> bool {
        self.draft.as_deref().is_some_and(|d| !d.is_empty())
    }

    /// Whether a caller should offer draft generation for this row.
    pub fn wants_draft(&self) -> bool {
        self.is_replied() && !self.has_draft()
    }

    /// Input text for the draft service: the body, or the subject when the
    /// body is missing or empty.
    pub fn draft_input(&self) -> &str {
        match self.body.as_deref() {
            Some(b) if !b.is_empty() => b,
            _ => &self.subject,
        }
    }

    pub fn with_draft(&self, draft: impl Into<String>) -> Self {
        Self {
            draft: Some(draft.into()),
            ..self.clone()
        }
    }
}
