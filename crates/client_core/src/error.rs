use shared::domain::DocumentId;
use thiserror::Error;

use crate::activity::Activity;

pub type Result<T, E = SessionError> = std::result::Result<T, E>;

/// Input rejected before any request leaves the client.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Nothing to analyze: the content is empty.")]
    EmptyContent,
    #[error("Page content is too short to analyze ({len} characters, at least {min} needed).")]
    ContentTooShort { len: usize, min: usize },
    #[error("Only PDF and TXT files are supported (got '{0}').")]
    UnsupportedFileType(String),
    #[error("Please enter a question.")]
    EmptyQuestion,
    #[error("Please load a document first.")]
    NoDocument,
    #[error("Please enter a YouTube video ID.")]
    EmptyVideoId,
    #[error("Please select some text on the page first!")]
    EmptySelection,
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("Server not running! Please start the backend.")]
    NetworkUnavailable { reason: String },
    #[error("{detail}")]
    Backend { status: u16, detail: String },
    #[error("Document '{document_id}' is no longer available on the server. Please load it again.")]
    StaleReference { document_id: DocumentId },
    #[error("Please wait: {0} is still in progress.")]
    Busy(Activity),
    #[error("The session changed while the request was in flight; the result was discarded.")]
    Superseded,
    #[error("Invalid response from server: {0}")]
    MalformedResponse(String),
}

impl SessionError {
    pub fn backend(status: u16, detail: impl Into<String>) -> Self {
        Self::Backend {
            status,
            detail: detail.into(),
        }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// True when the backend says the referenced document does not exist.
    ///
    /// The analyzer backend re-wraps its 404 into a 500 for `/ask` and
    /// `/analyze_risk`, so the detail text is matched as well as the status.
    pub fn is_missing_document(&self) -> bool {
        match self {
            Self::Backend { status, detail } => {
                *status == 404 || detail.to_ascii_lowercase().contains("document not found")
            }
            _ => false,
        }
    }
}

impl From<reqwest::Error> for SessionError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::MalformedResponse(err.to_string())
        } else {
            Self::NetworkUnavailable {
                reason: err.to_string(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_document_matches_status_and_wrapped_detail() {
        assert!(SessionError::backend(404, "Document not found").is_missing_document());
        assert!(SessionError::backend(
            500,
            "Error processing question: 404: Document not found. Please upload a document first."
        )
        .is_missing_document());
        assert!(!SessionError::backend(500, "Analysis failed: quota").is_missing_document());
        assert!(!SessionError::NetworkUnavailable {
            reason: "connection refused".into()
        }
        .is_missing_document());
    }

    #[test]
    fn backend_detail_is_shown_verbatim() {
        let err = SessionError::backend(400, "Only PDF and TXT files are supported");
        assert_eq!(err.to_string(), "Only PDF and TXT files are supported");
    }

    #[test]
    fn empty_question_and_missing_document_read_differently() {
        assert_ne!(
            SessionError::from(ValidationError::EmptyQuestion).to_string(),
            SessionError::from(ValidationError::NoDocument).to_string()
        );
    }
}
