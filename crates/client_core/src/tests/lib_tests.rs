use super::*;
use std::sync::{Arc, Mutex};

use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, post},
    Json, Router,
};
use serde_json::{json, Value};
use shared::domain::Severity;
use tokio::net::TcpListener;

#[derive(Clone, Default)]
struct ServerState {
    requests: Arc<Mutex<Vec<String>>>,
}

impl ServerState {
    fn record(&self, entry: impl Into<String>) {
        self.requests.lock().expect("requests").push(entry.into());
    }

    fn requests(&self) -> Vec<String> {
        self.requests.lock().expect("requests").clone()
    }
}

async fn handle_upload(State(state): State<ServerState>, mut multipart: Multipart) -> Json<Value> {
    while let Ok(Some(field)) = multipart.next_field().await {
        let name = field.name().unwrap_or_default().to_string();
        let filename = field.file_name().unwrap_or_default().to_string();
        let bytes = field.bytes().await.unwrap_or_default();
        state.record(format!("upload:{name}:{filename}:{}", bytes.len()));
    }
    Json(json!({
        "document_id": "lease_pdf",
        "filename": "lease.pdf",
        "text_length": 1200,
        "num_chunks": 12,
        "message": "Document uploaded and processed successfully"
    }))
}

async fn handle_upload_text(
    State(state): State<ServerState>,
    Json(body): Json<UploadTextRequest>,
) -> Json<Value> {
    state.record(format!("upload_text:{}:{}", body.filename, body.text));
    Json(json!({
        "document_id": "pasted_txt",
        "filename": body.filename,
        "num_chunks": 1
    }))
}

async fn handle_analyze(
    State(state): State<ServerState>,
    Json(query): Json<DocumentQuery>,
) -> Json<Value> {
    state.record(format!("analyze:{}:{}", query.document_id, query.question));
    Json(json!({
        "risk_score": 85,
        "risk_level": "High",
        "detailed_analysis": "The agreement favours the landlord.",
        "key_risks": [
            {"title": "Termination", "description": "At will", "severity": "HIGH"},
            {"title": "Deposit", "description": "Non-refundable", "severity": "Low"}
        ]
    }))
}

async fn handle_ask(
    State(state): State<ServerState>,
    Json(query): Json<DocumentQuery>,
) -> impl IntoResponse {
    state.record(format!("ask:{}:{}", query.document_id, query.question));
    if query.document_id.as_str() == "gone" {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({
                "detail": "Error processing question: 404: Document not found. Please upload a document first."
            })),
        );
    }
    (
        StatusCode::OK,
        Json(json!({"answer": "Thirty days notice.", "document_id": query.document_id})),
    )
}

async fn handle_delete(
    State(state): State<ServerState>,
    Path(document_id): Path<String>,
) -> impl IntoResponse {
    state.record(format!("delete:{document_id}"));
    if document_id == "missing" {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({"detail": "Document not found"})),
        );
    }
    (
        StatusCode::OK,
        Json(json!({"message": format!("Document {document_id} deleted successfully")})),
    )
}

async fn handle_list() -> Json<Value> {
    Json(json!({
        "documents": [
            {"document_id": "lease_pdf", "filename": "lease.pdf", "text_length": 1200, "num_chunks": 12}
        ]
    }))
}

async fn handle_root() -> Json<Value> {
    Json(json!({"message": "Legal Agreement Analyzer API", "version": "1.0"}))
}

fn analyzer_router(state: ServerState) -> Router {
    Router::new()
        .route("/", get(handle_root))
        .route("/upload", post(handle_upload))
        .route("/upload_text", post(handle_upload_text))
        .route("/analyze_risk", post(handle_analyze))
        .route("/ask", post(handle_ask))
        .route("/documents", get(handle_list))
        .route("/documents/:document_id", delete(handle_delete))
        .with_state(state)
}

async fn spawn_server(app: Router) -> Result<String, std::io::Error> {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    Ok(format!("http://{addr}"))
}

async fn analyzer() -> (HttpBackend, ServerState) {
    let state = ServerState::default();
    let server_url = spawn_server(analyzer_router(state.clone()))
        .await
        .expect("spawn server");
    let backend = HttpBackend::new(&server_url, Duration::from_secs(5)).expect("backend");
    (backend, state)
}

#[tokio::test]
async fn upload_file_sends_multipart_file_field() {
    let (backend, state) = analyzer().await;

    let response = backend
        .upload_file("lease.pdf", b"%PDF-1.7 body".to_vec())
        .await
        .expect("upload");

    assert_eq!(response.document_id.as_str(), "lease_pdf");
    assert_eq!(response.num_chunks, 12);
    assert_eq!(response.text_length, Some(1200));
    assert_eq!(state.requests(), vec!["upload:file:lease.pdf:13"]);
}

#[tokio::test]
async fn upload_text_posts_json_body() {
    let (backend, state) = analyzer().await;

    let response = backend
        .upload_text("The tenant pays rent.", "Pasted_Agreement.txt")
        .await
        .expect("upload text");

    assert_eq!(response.filename, "Pasted_Agreement.txt");
    assert_eq!(
        state.requests(),
        vec!["upload_text:Pasted_Agreement.txt:The tenant pays rent."]
    );
}

#[tokio::test]
async fn analyze_risk_uses_start_question_and_normalizes_severity() {
    let (backend, state) = analyzer().await;

    let report = backend
        .analyze_risk(&DocumentId::from("lease_pdf"))
        .await
        .expect("analysis");

    assert_eq!(report.risk_score, 85);
    assert_eq!(report.key_risks[0].severity, Severity::High);
    assert_eq!(report.key_risks[1].severity, Severity::Low);
    assert_eq!(state.requests(), vec!["analyze:lease_pdf:start_analysis"]);
}

#[tokio::test]
async fn ask_surfaces_backend_detail_verbatim() {
    let (backend, _state) = analyzer().await;

    let answer = DocumentBackend::ask(&backend, &DocumentId::from("lease_pdf"), "Notice period?")
        .await
        .expect("answer");
    assert_eq!(answer, "Thirty days notice.");

    let err = DocumentBackend::ask(&backend, &DocumentId::from("gone"), "Notice period?")
        .await
        .expect_err("missing document");
    assert!(matches!(err, SessionError::Backend { status: 500, .. }));
    assert!(err.is_missing_document());
    assert!(err.to_string().starts_with("Error processing question"));
}

#[tokio::test]
async fn delete_encodes_document_id_and_reports_not_found() {
    let (backend, state) = analyzer().await;

    backend
        .delete_document(&DocumentId::from("my lease/v2"))
        .await
        .expect("delete");
    let err = backend
        .delete_document(&DocumentId::from("missing"))
        .await
        .expect_err("not found");

    assert!(matches!(err, SessionError::Backend { status: 404, .. }));
    assert_eq!(
        state.requests(),
        vec!["delete:my lease/v2", "delete:missing"]
    );
}

#[tokio::test]
async fn lists_documents_and_service_info() {
    let (backend, _state) = analyzer().await;

    let documents = backend.list_documents().await.expect("list");
    assert_eq!(documents.len(), 1);
    assert_eq!(documents[0].filename, "lease.pdf");

    let info = backend.service_info().await.expect("info");
    assert_eq!(info.message, "Legal Agreement Analyzer API");
    assert_eq!(info.version.as_deref(), Some("1.0"));
}

#[tokio::test]
async fn base_url_path_prefix_is_kept() {
    let state = ServerState::default();
    let app = Router::new().nest("/api", analyzer_router(state.clone()));
    let server_url = spawn_server(app).await.expect("spawn server");
    let backend = HttpBackend::new(&format!("{server_url}/api"), Duration::from_secs(5))
        .expect("backend");

    backend
        .upload_text("Clause 1.", "notes.txt")
        .await
        .expect("upload text");
    assert_eq!(state.requests(), vec!["upload_text:notes.txt:Clause 1."]);
}

#[tokio::test]
async fn refused_connection_is_network_unavailable() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);

    let backend = HttpBackend::new(&format!("http://{addr}"), Duration::from_secs(2))
        .expect("backend");
    let err = backend
        .upload_text("Clause 1.", "notes.txt")
        .await
        .expect_err("offline");

    assert!(matches!(err, SessionError::NetworkUnavailable { .. }));
    assert_eq!(
        err.to_string(),
        "Server not running! Please start the backend."
    );
}

#[tokio::test]
async fn success_body_outside_contract_is_malformed() {
    let app = Router::new().route(
        "/upload_text",
        post(|| async { Json(json!({"unexpected": true})) }),
    );
    let server_url = spawn_server(app).await.expect("spawn server");
    let backend = HttpBackend::new(&server_url, Duration::from_secs(5)).expect("backend");

    let err = backend
        .upload_text("Clause 1.", "notes.txt")
        .await
        .expect_err("malformed");
    assert!(matches!(err, SessionError::MalformedResponse(_)));
}

#[tokio::test]
async fn voice_reply_requires_reply_field() {
    let app = Router::new().route(
        "/ask",
        post(|Json(body): Json<VoiceRequest>| async move {
            match body.text.as_str() {
                "broken" => (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response(),
                "silent" => Json(json!({})).into_response(),
                text => Json(json!({"reply": format!("You said: {text}")})).into_response(),
            }
        }),
    );
    let server_url = spawn_server(app).await.expect("spawn server");
    let backend = HttpBackend::new(&server_url, Duration::from_secs(5)).expect("backend");

    assert_eq!(
        backend.reply("hello").await.expect("reply"),
        "You said: hello"
    );
    assert!(matches!(
        backend.reply("silent").await,
        Err(SessionError::MalformedResponse(_))
    ));
    let err = backend.reply("broken").await.expect_err("server error");
    assert_eq!(err.to_string(), "Server error: 500");
}

#[tokio::test]
async fn voice_method_not_allowed_points_at_cors() {
    let app = Router::new().route(
        "/ask",
        get(|| async { "only GET here" }),
    );
    let server_url = spawn_server(app).await.expect("spawn server");
    let backend = HttpBackend::new(&server_url, Duration::from_secs(5)).expect("backend");

    let err = backend.reply("hello").await.expect_err("method not allowed");

    assert!(matches!(err, SessionError::Backend { status: 405, .. }));
    assert_eq!(
        err.to_string(),
        "Method Not Allowed (405). Check CORS configuration."
    );
}

#[tokio::test]
async fn video_question_posts_video_id() {
    let state = ServerState::default();
    let app = Router::new()
        .route(
            "/ask",
            post(
                |State(state): State<ServerState>, Json(query): Json<VideoQuery>| async move {
                    state.record(format!("video:{}:{}", query.video_id, query.question));
                    Json(json!({"answer": "It is about borrowing."}))
                },
            ),
        )
        .with_state(state.clone());
    let server_url = spawn_server(app).await.expect("spawn server");
    let backend = HttpBackend::new(&server_url, Duration::from_secs(5)).expect("backend");

    let answer = backend
        .ask_video(&VideoId::from("abc123"), "Topic?")
        .await
        .expect("answer");
    assert_eq!(answer, "It is about borrowing.");
    assert_eq!(state.requests(), vec!["video:abc123:Topic?"]);
}

#[test]
fn rejects_unusable_base_urls() {
    assert!(HttpBackend::new("not a url", Duration::from_secs(1)).is_err());
    assert!(HttpBackend::new("mailto:someone@example.com", Duration::from_secs(1)).is_err());
    let backend = HttpBackend::new("http://localhost:8000", Duration::from_secs(1)).expect("ok");
    assert_eq!(backend.base_url().as_str(), "http://localhost:8000/");
}
