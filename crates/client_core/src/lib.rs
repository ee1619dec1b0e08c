use std::time::Duration;

use anyhow::{anyhow, Context};
use async_trait::async_trait;
use reqwest::{multipart, Client, Response};
use serde::de::DeserializeOwned;
use shared::{
    domain::{DocumentId, VideoId},
    error::detail_from_body,
    protocol::{
        AnswerResponse, DocumentListResponse, DocumentQuery, DocumentSummary, RiskReport,
        ServiceInfo, UploadResponse, UploadTextRequest, VideoQuery, VoiceReply, VoiceRequest,
        START_ANALYSIS_QUESTION,
    },
};
use tracing::{debug, warn};
use url::Url;

pub mod activity;
pub mod assistants;
pub mod controller;
pub mod error;
pub mod host;
pub mod session;

pub use activity::{Activity, ActivityGuard, ActivityTracker};
pub use assistants::{VideoChat, VoiceAssistant};
pub use controller::{
    AnalysisOutcome, ContentSubmission, DeleteOutcome, SessionController, SubmittedDocument,
};
pub use error::{Result, SessionError, ValidationError};
pub use host::{Narrator, PageSnapshot, PageSource, SpeechEngine};
pub use session::Session;

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

const METHOD_NOT_ALLOWED_MESSAGE: &str = "Method Not Allowed (405). Check CORS configuration.";

/// The document analyzer service.
#[async_trait]
pub trait DocumentBackend: Send + Sync {
    async fn upload_file(&self, filename: &str, bytes: Vec<u8>) -> Result<UploadResponse>;
    async fn upload_text(&self, text: &str, filename: &str) -> Result<UploadResponse>;
    async fn analyze_risk(&self, document_id: &DocumentId) -> Result<RiskReport>;
    async fn ask(&self, document_id: &DocumentId, question: &str) -> Result<String>;
    async fn delete_document(&self, document_id: &DocumentId) -> Result<()>;
    async fn list_documents(&self) -> Result<Vec<DocumentSummary>>;
    async fn service_info(&self) -> Result<ServiceInfo>;
}

/// Single-purpose text-to-reply service behind the voice assistant.
#[async_trait]
pub trait ReplyBackend: Send + Sync {
    async fn reply(&self, text: &str) -> Result<String>;
}

/// Transcript question-answering service behind the video chat.
#[async_trait]
pub trait VideoBackend: Send + Sync {
    async fn ask_video(&self, video_id: &VideoId, question: &str) -> Result<String>;
}

/// reqwest client bound to one backend base URL.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    http: Client,
    base_url: Url,
}

impl HttpBackend {
    pub fn new(base_url: &str, request_timeout: Duration) -> anyhow::Result<Self> {
        let http = Client::builder()
            .timeout(request_timeout)
            .build()
            .context("failed to build http client")?;
        Self::with_client(http, base_url)
    }

    pub fn with_client(http: Client, base_url: &str) -> anyhow::Result<Self> {
        let mut base_url =
            Url::parse(base_url.trim()).with_context(|| format!("invalid backend url '{base_url}'"))?;
        if base_url.cannot_be_a_base() {
            return Err(anyhow!("backend url '{base_url}' cannot carry paths"));
        }
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Ok(Self { http, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }
}

async fn decode_json<T: DeserializeOwned>(response: Response, fallback: &str) -> Result<T> {
    let response = check_status(response, fallback).await?;
    Ok(response.json::<T>().await?)
}

async fn check_status(response: Response, fallback: &str) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let detail = detail_from_body(&body).unwrap_or_else(|| fallback.to_string());
    warn!(status = status.as_u16(), %detail, "backend rejected request");
    Err(SessionError::backend(status.as_u16(), detail))
}

#[async_trait]
impl DocumentBackend for HttpBackend {
    async fn upload_file(&self, filename: &str, bytes: Vec<u8>) -> Result<UploadResponse> {
        let url = self.endpoint(&["upload"]);
        debug!(%url, filename, size = bytes.len(), "uploading file");
        let part = multipart::Part::bytes(bytes).file_name(filename.to_string());
        let form = multipart::Form::new().part("file", part);
        let response = self.http.post(url).multipart(form).send().await?;
        decode_json(response, "Upload failed").await
    }

    async fn upload_text(&self, text: &str, filename: &str) -> Result<UploadResponse> {
        let url = self.endpoint(&["upload_text"]);
        debug!(%url, filename, chars = text.chars().count(), "uploading text");
        let response = self
            .http
            .post(url)
            .json(&UploadTextRequest {
                text: text.to_string(),
                filename: filename.to_string(),
            })
            .send()
            .await?;
        decode_json(response, "Processing failed").await
    }

    async fn analyze_risk(&self, document_id: &DocumentId) -> Result<RiskReport> {
        let url = self.endpoint(&["analyze_risk"]);
        debug!(%url, %document_id, "requesting risk analysis");
        let response = self
            .http
            .post(url)
            .json(&DocumentQuery {
                document_id: document_id.clone(),
                question: START_ANALYSIS_QUESTION.to_string(),
            })
            .send()
            .await?;
        decode_json(response, "Analysis failed").await
    }

    async fn ask(&self, document_id: &DocumentId, question: &str) -> Result<String> {
        let url = self.endpoint(&["ask"]);
        debug!(%url, %document_id, "asking question");
        let response = self
            .http
            .post(url)
            .json(&DocumentQuery {
                document_id: document_id.clone(),
                question: question.to_string(),
            })
            .send()
            .await?;
        let body: AnswerResponse = decode_json(response, "Failed to get answer").await?;
        Ok(body.answer)
    }

    async fn delete_document(&self, document_id: &DocumentId) -> Result<()> {
        let url = self.endpoint(&["documents", document_id.as_str()]);
        debug!(%url, %document_id, "deleting document");
        let response = self.http.delete(url).send().await?;
        check_status(response, "Delete failed").await?;
        Ok(())
    }

    async fn list_documents(&self) -> Result<Vec<DocumentSummary>> {
        let response = self.http.get(self.endpoint(&["documents"])).send().await?;
        let body: DocumentListResponse = decode_json(response, "Failed to list documents").await?;
        Ok(body.documents)
    }

    async fn service_info(&self) -> Result<ServiceInfo> {
        let response = self.http.get(self.base_url.clone()).send().await?;
        decode_json(response, "Service check failed").await
    }
}

#[async_trait]
impl ReplyBackend for HttpBackend {
    async fn reply(&self, text: &str) -> Result<String> {
        let url = self.endpoint(&["ask"]);
        debug!(%url, chars = text.chars().count(), "requesting spoken reply");
        let response = self
            .http
            .post(url)
            .json(&VoiceRequest {
                text: text.to_string(),
            })
            .send()
            .await?;
        let status = response.status().as_u16();
        if status == 405 {
            warn!(%status, "reply service rejected the method");
            return Err(SessionError::backend(status, METHOD_NOT_ALLOWED_MESSAGE));
        }
        let body: VoiceReply = decode_json(response, &format!("Server error: {status}")).await?;
        body.reply
            .filter(|reply| !reply.trim().is_empty())
            .ok_or_else(|| SessionError::MalformedResponse("missing reply".to_string()))
    }
}

#[async_trait]
impl VideoBackend for HttpBackend {
    async fn ask_video(&self, video_id: &VideoId, question: &str) -> Result<String> {
        let url = self.endpoint(&["ask"]);
        debug!(%url, %video_id, "asking about video");
        let response = self
            .http
            .post(url)
            .json(&VideoQuery {
                video_id: video_id.clone(),
                question: question.to_string(),
            })
            .send()
            .await?;
        let body: AnswerResponse = decode_json(response, "Something went wrong").await?;
        Ok(body.answer)
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
