//! Results of dispatched commands, as the view consumes them.

use client_core::{DeleteOutcome, Session, SessionError, SubmittedDocument};
use shared::{
    domain::VideoId,
    protocol::{DocumentSummary, RiskReport, ServiceInfo},
};

#[derive(Debug, Clone)]
pub enum UiEvent {
    Info(String),
    DocumentReady(SubmittedDocument),
    AnalysisReady(RiskReport),
    Answer(String),
    SessionShown(Session),
    Deleted(DeleteOutcome),
    Documents(Vec<DocumentSummary>),
    Status(ServiceInfo),
    VoiceReply(String),
    VideoAnswer { video_id: VideoId, answer: String },
    Error(UiError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiErrorCategory {
    Validation,
    Transport,
    Backend,
    Busy,
    StaleDocument,
    Input,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiErrorContext {
    Startup,
    Submit,
    Analyze,
    Ask,
    Delete,
    Listing,
    Status,
    Voice,
    Video,
    General,
}

#[derive(Debug, Clone)]
pub struct UiError {
    category: UiErrorCategory,
    context: UiErrorContext,
    message: String,
}

impl UiError {
    pub fn from_session(context: UiErrorContext, err: &SessionError) -> Self {
        let category = match err {
            SessionError::Validation(_) => UiErrorCategory::Validation,
            SessionError::NetworkUnavailable { .. } => UiErrorCategory::Transport,
            SessionError::Backend { .. } | SessionError::MalformedResponse(_) => {
                UiErrorCategory::Backend
            }
            SessionError::Busy(_) | SessionError::Superseded => UiErrorCategory::Busy,
            SessionError::StaleReference { .. } => UiErrorCategory::StaleDocument,
        };
        Self {
            category,
            context,
            message: err.to_string(),
        }
    }

    /// Local failures outside the session, such as an unreadable input file.
    pub fn input(context: UiErrorContext, message: impl Into<String>) -> Self {
        Self {
            category: UiErrorCategory::Input,
            context,
            message: message.into(),
        }
    }

    /// The loaded document is gone and the user has to load it again.
    pub fn requires_resubmit(&self) -> bool {
        self.category == UiErrorCategory::StaleDocument
    }

    pub fn category(&self) -> UiErrorCategory {
        self.category
    }

    pub fn context(&self) -> UiErrorContext {
        self.context
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}
