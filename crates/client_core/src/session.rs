//! Client-side record of the active document and its persisted mirror.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use shared::{
    domain::{ChatMessage, DocumentId},
    protocol::RiskReport,
};
use storage::KeyValueStore;
use tracing::{debug, warn};

pub const DOCUMENT_ID_KEY: &str = "documentId";
pub const FILENAME_KEY: &str = "filename";
pub const ANALYSIS_KEY: &str = "analysisData";
pub const CHAT_HISTORY_KEY: &str = "chatHistory";

const SESSION_KEYS: [&str; 4] = [DOCUMENT_ID_KEY, FILENAME_KEY, ANALYSIS_KEY, CHAT_HISTORY_KEY];

/// Risk report tagged with the document it was computed for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedAnalysis {
    pub document_id: DocumentId,
    pub data: RiskReport,
}

#[derive(Debug, Clone, Default)]
pub struct Session {
    document_id: Option<DocumentId>,
    filename: Option<String>,
    analysis: Option<CachedAnalysis>,
    chat_history: Vec<ChatMessage>,
    generation: u64,
}

impl Session {
    pub fn document_id(&self) -> Option<&DocumentId> {
        self.document_id.as_ref()
    }

    pub fn filename(&self) -> Option<&str> {
        self.filename.as_deref()
    }

    pub fn has_document(&self) -> bool {
        self.document_id.is_some()
    }

    /// The cached analysis, only while it belongs to the active document.
    pub fn analysis(&self) -> Option<&RiskReport> {
        let cached = self.analysis.as_ref()?;
        (Some(&cached.document_id) == self.document_id.as_ref()).then_some(&cached.data)
    }

    pub fn chat_history(&self) -> &[ChatMessage] {
        &self.chat_history
    }

    /// Bumped whenever the active identity changes.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub(crate) fn bind_document(&mut self, document_id: DocumentId, filename: String) {
        self.document_id = Some(document_id);
        self.filename = Some(filename);
        self.analysis = None;
        self.chat_history.clear();
        self.generation += 1;
    }

    pub(crate) fn store_analysis(&mut self, report: RiskReport) -> Option<&CachedAnalysis> {
        let document_id = self.document_id.clone()?;
        self.analysis = Some(CachedAnalysis {
            document_id,
            data: report,
        });
        self.analysis.as_ref()
    }

    pub(crate) fn discard_analysis(&mut self) {
        self.analysis = None;
    }

    pub(crate) fn push_message(&mut self, message: ChatMessage) {
        self.chat_history.push(message);
    }

    pub(crate) fn clear(&mut self) {
        self.document_id = None;
        self.filename = None;
        self.analysis = None;
        self.chat_history.clear();
        self.generation += 1;
    }
}

/// Reads the persisted session. Anything missing or malformed yields an empty session.
pub async fn load(store: &dyn KeyValueStore) -> Session {
    let records = match store.get_many(&SESSION_KEYS).await {
        Ok(records) => records,
        Err(err) => {
            warn!(error = %err, "session storage unreadable; starting empty");
            return Session::default();
        }
    };

    let document_id = records
        .get(DOCUMENT_ID_KEY)
        .and_then(non_empty_string)
        .map(DocumentId);
    let filename = records.get(FILENAME_KEY).and_then(non_empty_string);
    let (Some(document_id), Some(filename)) = (document_id, filename) else {
        debug!("no persisted session");
        return Session::default();
    };

    let analysis = records
        .get(ANALYSIS_KEY)
        .and_then(|raw| decode::<CachedAnalysis>(ANALYSIS_KEY, raw))
        .filter(|cached| cached.document_id == document_id);
    let chat_history = records
        .get(CHAT_HISTORY_KEY)
        .and_then(|raw| decode::<Vec<ChatMessage>>(CHAT_HISTORY_KEY, raw))
        .unwrap_or_default();

    Session {
        document_id: Some(document_id),
        filename: Some(filename),
        analysis,
        chat_history,
        generation: 0,
    }
}

fn non_empty_string(value: &Value) -> Option<String> {
    value
        .as_str()
        .filter(|raw| !raw.trim().is_empty())
        .map(str::to_string)
}

fn decode<T: for<'de> Deserialize<'de>>(key: &str, raw: &Value) -> Option<T> {
    match serde_json::from_value(raw.clone()) {
        Ok(value) => Some(value),
        Err(err) => {
            warn!(key, error = %err, "ignoring malformed persisted record");
            None
        }
    }
}

// Writes below are a convenience cache: failures are logged, never surfaced.

pub async fn persist_identity(store: &dyn KeyValueStore, session: &Session) {
    let (Some(document_id), Some(filename)) = (session.document_id(), session.filename()) else {
        return;
    };
    let entries = [
        (DOCUMENT_ID_KEY, Value::String(document_id.0.clone())),
        (FILENAME_KEY, Value::String(filename.to_string())),
        (CHAT_HISTORY_KEY, encode(session.chat_history())),
    ];
    if let Err(err) = store.set_many(&entries).await {
        warn!(%document_id, error = %err, "failed to persist session identity");
    }
}

pub async fn persist_analysis(store: &dyn KeyValueStore, cached: &CachedAnalysis) {
    if let Err(err) = store.set(ANALYSIS_KEY, encode(cached)).await {
        warn!(document_id = %cached.document_id, error = %err, "failed to persist analysis");
    }
}

pub async fn forget_analysis(store: &dyn KeyValueStore) {
    if let Err(err) = store.remove(&[ANALYSIS_KEY]).await {
        warn!(error = %err, "failed to drop persisted analysis");
    }
}

pub async fn persist_chat(store: &dyn KeyValueStore, session: &Session) {
    if !session.has_document() {
        return;
    }
    if let Err(err) = store.set(CHAT_HISTORY_KEY, encode(session.chat_history())).await {
        debug!(error = %err, "failed to persist chat history");
    }
}

pub async fn forget_all(store: &dyn KeyValueStore) {
    if let Err(err) = store.remove(&SESSION_KEYS).await {
        warn!(error = %err, "failed to clear persisted session");
    }
}

fn encode<T: Serialize + ?Sized>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or(Value::Null)
}

#[cfg(test)]
#[path = "tests/session_tests.rs"]
mod tests;
