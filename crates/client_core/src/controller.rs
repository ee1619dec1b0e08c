//! Session controller: the single owner of session state transitions.
//!
//! Every user-triggered operation goes through here. The controller keeps at
//! most one network round trip in flight (see [`ActivityTracker`]), discards
//! responses that arrive after the active document changed, and mirrors every
//! successful transition into the key-value store.

use std::{path::Path, sync::Arc};

use shared::{
    domain::{ChatMessage, DocumentId, SourceKind},
    protocol::{DocumentSummary, RiskReport, ServiceInfo, UploadResponse},
};
use storage::KeyValueStore;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::{
    activity::{Activity, ActivityTracker},
    error::{Result, SessionError, ValidationError},
    host::PageSnapshot,
    session::{self, Session},
    DocumentBackend,
};

pub const DEFAULT_MIN_PAGE_TEXT_LEN: usize = 100;
pub const PASTED_TEXT_FILENAME: &str = "Pasted_Agreement.txt";
pub const PAGE_FALLBACK_FILENAME: &str = "Webpage_Content.txt";
pub const SUPPORTED_EXTENSIONS: [&str; 2] = ["pdf", "txt"];

const TEXT_READY_MESSAGE: &str = "Text processed successfully! You can now analyze risks.";
const ANALYSIS_READY_MESSAGE: &str = "Risk analysis complete!";

#[derive(Debug, Clone)]
pub enum ContentSubmission {
    File { filename: String, bytes: Vec<u8> },
    PastedText { text: String, filename: Option<String> },
    ActiveTab(PageSnapshot),
}

impl ContentSubmission {
    pub fn kind(&self) -> SourceKind {
        match self {
            Self::File { .. } => SourceKind::FileUpload,
            Self::PastedText { .. } => SourceKind::PastedText,
            Self::ActiveTab(_) => SourceKind::ActiveTab,
        }
    }
}

/// Validated upload, ready to send.
enum Upload {
    File { filename: String, bytes: Vec<u8> },
    Text { text: String, filename: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmittedDocument {
    pub document_id: DocumentId,
    pub filename: String,
    pub num_chunks: u32,
    pub source: SourceKind,
    /// Readiness message appended to the chat.
    pub announcement: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnalysisOutcome {
    Completed(RiskReport),
    /// No document is loaded; nothing was sent.
    NoDocument,
    /// An analysis is already in flight; this call was ignored.
    AlreadyRunning,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted(DocumentId),
    /// The backend had already forgotten the document.
    AlreadyGone(DocumentId),
    /// Cleared locally; the backend could not be told.
    LocalOnly { document_id: DocumentId, reason: String },
    NothingLoaded,
}

pub struct SessionController {
    backend: Arc<dyn DocumentBackend>,
    store: Arc<dyn KeyValueStore>,
    session: Mutex<Session>,
    activity: ActivityTracker,
    min_page_text_len: usize,
}

impl SessionController {
    pub fn new(backend: Arc<dyn DocumentBackend>, store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            backend,
            store,
            session: Mutex::new(Session::default()),
            activity: ActivityTracker::new(),
            min_page_text_len: DEFAULT_MIN_PAGE_TEXT_LEN,
        }
    }

    pub fn with_min_page_text_len(mut self, min_page_text_len: usize) -> Self {
        self.min_page_text_len = min_page_text_len;
        self
    }

    pub async fn snapshot(&self) -> Session {
        self.session.lock().await.clone()
    }

    pub fn activity(&self) -> Activity {
        self.activity.current()
    }

    /// Loads the persisted session, if any. Never touches the network.
    pub async fn restore(&self) -> Session {
        let restored = session::load(self.store.as_ref()).await;
        if let Some(document_id) = restored.document_id() {
            info!(
                %document_id,
                filename = restored.filename().unwrap_or_default(),
                cached_analysis = restored.analysis().is_some(),
                "restored session"
            );
        }
        let mut guard = self.session.lock().await;
        *guard = restored;
        guard.clone()
    }

    pub async fn submit_content(&self, content: ContentSubmission) -> Result<SubmittedDocument> {
        let source = content.kind();
        let upload = self.prepare_upload(content)?;
        let _activity = self
            .activity
            .try_begin(Activity::Submitting)
            .map_err(SessionError::Busy)?;

        // The old analysis must be gone before the request: a slow or failed
        // upload may never leave it attached to the pending document.
        let generation = {
            let mut guard = self.session.lock().await;
            guard.discard_analysis();
            guard.generation()
        };
        session::forget_analysis(self.store.as_ref()).await;

        info!(%source, "submitting content");
        let response = match upload {
            Upload::File { filename, bytes } => self.backend.upload_file(&filename, bytes).await,
            Upload::Text { text, filename } => self.backend.upload_text(&text, &filename).await,
        }
        .inspect_err(|err| warn!(%source, error = %err, "content submission failed"))?;
        let UploadResponse {
            document_id,
            filename,
            num_chunks,
            ..
        } = response;

        let announcement = match source {
            SourceKind::FileUpload => {
                format!("Document \"{filename}\" uploaded! You can now run a risk analysis.")
            }
            SourceKind::PastedText | SourceKind::ActiveTab => TEXT_READY_MESSAGE.to_string(),
        };

        let snapshot = {
            let mut guard = self.session.lock().await;
            if guard.generation() != generation {
                warn!(%document_id, "session changed during submission; discarding result");
                return Err(SessionError::Superseded);
            }
            guard.bind_document(document_id.clone(), filename.clone());
            guard.push_message(ChatMessage::bot(announcement.clone()));
            guard.clone()
        };
        session::persist_identity(self.store.as_ref(), &snapshot).await;
        info!(%document_id, %filename, num_chunks, "document ready");

        Ok(SubmittedDocument {
            document_id,
            filename,
            num_chunks,
            source,
            announcement,
        })
    }

    pub async fn run_analysis(&self) -> Result<AnalysisOutcome> {
        let Some((document_id, generation)) = self.active_document().await else {
            debug!("analysis requested without a document; ignoring");
            return Ok(AnalysisOutcome::NoDocument);
        };
        let _activity = match self.activity.try_begin(Activity::Analyzing) {
            Ok(guard) => guard,
            Err(Activity::Analyzing) => {
                debug!(%document_id, "analysis already running; ignoring repeat");
                return Ok(AnalysisOutcome::AlreadyRunning);
            }
            Err(other) => return Err(SessionError::Busy(other)),
        };

        info!(%document_id, "running risk analysis");
        let report = self
            .backend
            .analyze_risk(&document_id)
            .await
            .inspect_err(|err| warn!(%document_id, error = %err, "risk analysis failed"))?;

        let (cached, snapshot) = {
            let mut guard = self.session.lock().await;
            if guard.generation() != generation {
                warn!(%document_id, "session changed during analysis; discarding report");
                return Err(SessionError::Superseded);
            }
            let cached = guard.store_analysis(report.clone()).cloned();
            guard.push_message(ChatMessage::bot(ANALYSIS_READY_MESSAGE));
            (cached, guard.clone())
        };
        if let Some(cached) = cached {
            session::persist_analysis(self.store.as_ref(), &cached).await;
        }
        session::persist_chat(self.store.as_ref(), &snapshot).await;
        info!(%document_id, score = report.risk_score, band = ?report.band(), "analysis stored");

        Ok(AnalysisOutcome::Completed(report))
    }

    pub async fn ask(&self, question: &str) -> Result<String> {
        let question = question.trim();
        if question.is_empty() {
            return Err(ValidationError::EmptyQuestion.into());
        }
        let Some((document_id, generation)) = self.active_document().await else {
            return Err(ValidationError::NoDocument.into());
        };
        let _activity = self
            .activity
            .try_begin(Activity::Asking)
            .map_err(SessionError::Busy)?;

        let snapshot = {
            let mut guard = self.session.lock().await;
            guard.push_message(ChatMessage::user(question));
            guard.clone()
        };
        session::persist_chat(self.store.as_ref(), &snapshot).await;

        debug!(%document_id, "asking question");
        match self.backend.ask(&document_id, question).await {
            Ok(answer) => {
                let snapshot = {
                    let mut guard = self.session.lock().await;
                    if guard.generation() != generation {
                        warn!(%document_id, "session changed while asking; discarding answer");
                        return Err(SessionError::Superseded);
                    }
                    guard.push_message(ChatMessage::bot(answer.clone()));
                    guard.clone()
                };
                session::persist_chat(self.store.as_ref(), &snapshot).await;
                Ok(answer)
            }
            Err(err) if err.is_missing_document() => {
                warn!(%document_id, error = %err, "backend no longer knows document; invalidating");
                let invalidated = {
                    let mut guard = self.session.lock().await;
                    let current = guard.generation() == generation;
                    if current {
                        guard.clear();
                    }
                    current
                };
                if !invalidated {
                    debug!(%document_id, "session already moved on; leaving it untouched");
                    return Err(SessionError::Superseded);
                }
                session::forget_all(self.store.as_ref()).await;
                Err(SessionError::StaleReference { document_id })
            }
            Err(err) => {
                warn!(%document_id, error = %err, "question failed");
                Err(err)
            }
        }
    }

    /// Forgets the active document locally, then asks the backend to drop it.
    ///
    /// Local state is cleared whatever the backend answers.
    pub async fn delete_session(&self) -> Result<DeleteOutcome> {
        let document_id = {
            let mut guard = self.session.lock().await;
            let Some(document_id) = guard.document_id().cloned() else {
                return Ok(DeleteOutcome::NothingLoaded);
            };
            guard.clear();
            document_id
        };
        session::forget_all(self.store.as_ref()).await;
        info!(%document_id, "session cleared");

        let outcome = match self.backend.delete_document(&document_id).await {
            Ok(()) => DeleteOutcome::Deleted(document_id),
            Err(SessionError::Backend { status: 404, .. }) => DeleteOutcome::AlreadyGone(document_id),
            Err(err) => {
                warn!(%document_id, error = %err, "backend delete failed; local state already cleared");
                DeleteOutcome::LocalOnly {
                    document_id,
                    reason: err.to_string(),
                }
            }
        };
        Ok(outcome)
    }

    pub async fn list_documents(&self) -> Result<Vec<DocumentSummary>> {
        self.backend.list_documents().await
    }

    pub async fn service_info(&self) -> Result<ServiceInfo> {
        self.backend.service_info().await
    }

    async fn active_document(&self) -> Option<(DocumentId, u64)> {
        let guard = self.session.lock().await;
        guard
            .document_id()
            .cloned()
            .map(|document_id| (document_id, guard.generation()))
    }

    fn prepare_upload(&self, content: ContentSubmission) -> Result<Upload, ValidationError> {
        match content {
            ContentSubmission::File { filename, bytes } => {
                if !has_supported_extension(&filename) {
                    return Err(ValidationError::UnsupportedFileType(filename));
                }
                if bytes.is_empty() {
                    return Err(ValidationError::EmptyContent);
                }
                Ok(Upload::File { filename, bytes })
            }
            ContentSubmission::PastedText { text, filename } => {
                let text = text.trim();
                if text.is_empty() {
                    return Err(ValidationError::EmptyContent);
                }
                Ok(Upload::Text {
                    text: text.to_string(),
                    filename: non_blank(filename).unwrap_or_else(|| PASTED_TEXT_FILENAME.into()),
                })
            }
            ContentSubmission::ActiveTab(PageSnapshot { title, text }) => {
                let text = text.trim();
                if text.is_empty() {
                    return Err(ValidationError::EmptyContent);
                }
                let len = text.chars().count();
                if len < self.min_page_text_len {
                    return Err(ValidationError::ContentTooShort {
                        len,
                        min: self.min_page_text_len,
                    });
                }
                Ok(Upload::Text {
                    text: text.to_string(),
                    filename: non_blank(title).unwrap_or_else(|| PAGE_FALLBACK_FILENAME.into()),
                })
            }
        }
    }
}

fn has_supported_extension(filename: &str) -> bool {
    Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            SUPPORTED_EXTENSIONS
                .iter()
                .any(|supported| ext.eq_ignore_ascii_case(supported))
        })
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|raw| raw.trim().to_string())
        .filter(|raw| !raw.is_empty())
}

#[cfg(test)]
#[path = "tests/controller_tests.rs"]
mod tests;
