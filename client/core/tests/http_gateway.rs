//! HTTP gateway against a local axum server

use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use bjorn_client_core::gateway::{
    ConversationGateway, CreateConversationRequest, GatewayError, HttpGateway, KnowledgeGateway,
    SendMessageRequest, UploadFile,
};
use bjorn_client_core::{ConversationId, MessageId, UploadProgress};
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use tokio::sync::mpsc;

#[derive(Clone, Default)]
struct Seen {
    create_body: Arc<Mutex<Option<Value>>>,
    list_ids: Arc<Mutex<Vec<String>>>,
    send_bodies: Arc<Mutex<Vec<Value>>>,
}

async fn create(State(seen): State<Seen>, Json(body): Json<Value>) -> impl IntoResponse {
    let without_id = body.get("title").and_then(Value::as_str) == Some("sem-id");
    *seen.create_body.lock() = Some(body);
    if without_id {
        return (StatusCode::CREATED, Json(json!({ "title": "sem-id" })));
    }
    (
        StatusCode::CREATED,
        Json(json!({ "conversationId": 42, "title": "Conversa Bjorn AI" })),
    )
}

async fn list(State(seen): State<Seen>, Path(id): Path<String>) -> impl IntoResponse {
    seen.list_ids.lock().push(id.clone());
    if id == "missing" {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({ "message": "Conversa não encontrada" })),
        )
            .into_response();
    }
    Json(json!([
        { "id": 2, "role": "ASSISTANT", "content": "Oi", "createdAt": "2024-01-01T12:01:00Z" },
        { "id": "1", "role": "user", "content": "Olá", "createdAt": "2024-01-01T12:00:00Z" },
        { "role": null, "content": 3 }
    ]))
    .into_response()
}

async fn send(
    State(seen): State<Seen>,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> impl IntoResponse {
    seen.send_bodies.lock().push(body.clone());
    match id.as_str() {
        "quiet" => (StatusCode::ACCEPTED, String::new()).into_response(),
        "broken" => (StatusCode::INTERNAL_SERVER_ERROR, "stack trace").into_response(),
        _ => Json(json!({
            "id": 5,
            "role": "ASSISTANT",
            "content": format!("eco: {}", body["content"].as_str().unwrap_or_default()),
            "createdAt": "2024-01-01T12:02:00"
        }))
        .into_response(),
    }
}

async fn upload(Path(specialist): Path<String>, mut multipart: Multipart) -> impl IntoResponse {
    let mut received = Vec::new();
    while let Some(field) = multipart.next_field().await.unwrap() {
        let field_name = field.name().unwrap_or_default().to_string();
        let file_name = field.file_name().unwrap_or_default().to_string();
        let data = field.bytes().await.unwrap();
        received.push(format!("{field_name}:{file_name}:{}", data.len()));
    }
    format!("{specialist} {}", received.join(","))
}

async fn documents(Path(specialist): Path<String>) -> impl IntoResponse {
    if specialist == "vazio" {
        return (StatusCode::BAD_GATEWAY, Json(json!({ "message": "" }))).into_response();
    }
    Json(json!([
        { "name": "manual.pdf", "size": 1024, "uploadedAt": "2024-03-01T10:00:00Z", "id": "doc-1" },
        { "name": "faq.txt" }
    ]))
    .into_response()
}

async fn serve() -> (HttpGateway, Seen) {
    let seen = Seen::default();
    let app = Router::new()
        .route("/api/conversations", post(create))
        .route("/api/conversations/{id}/messages", get(list).post(send))
        .route("/api/knowledge/{specialist}/docs", get(documents).post(upload))
        .with_state(seen.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let gateway = HttpGateway::new(&format!("http://{addr}"), Duration::from_secs(5)).unwrap();
    (gateway, seen)
}

#[tokio::test]
async fn create_conversation_reads_either_id_field() {
    let (gateway, seen) = serve().await;

    let request =
        CreateConversationRequest::new("Conversa Bjorn AI").with_knowledge_base(Some("rh".into()));
    let id = gateway.create_conversation(&request).await.unwrap();

    assert_eq!(id, ConversationId::new("42"));
    assert_eq!(
        seen.create_body.lock().clone(),
        Some(json!({ "title": "Conversa Bjorn AI", "knowledgeBaseId": "rh" }))
    );

    let missing = gateway
        .create_conversation(&CreateConversationRequest::new("sem-id"))
        .await;
    assert!(matches!(missing, Err(GatewayError::MissingConversationId)));
}

#[tokio::test]
async fn list_messages_is_lenient() {
    let (gateway, _seen) = serve().await;

    let messages = gateway
        .list_messages(&ConversationId::new("42"))
        .await
        .unwrap();

    assert_eq!(messages.len(), 3);
    assert_eq!(messages[0].id, Some(MessageId::from(2_i64)));
    assert_eq!(messages[1].id, Some(MessageId::from("1")));
    assert_eq!(messages[1].created_at.as_deref(), Some("2024-01-01T12:00:00Z"));
    assert_eq!(messages[2].role, None);
    assert_eq!(messages[2].content, None);
}

#[tokio::test]
async fn path_segments_are_encoded() {
    let (gateway, seen) = serve().await;

    gateway
        .list_messages(&ConversationId::new("a b?c"))
        .await
        .unwrap();

    assert_eq!(seen.list_ids.lock().clone(), vec!["a b?c".to_string()]);
}

#[tokio::test]
async fn error_body_message_is_exposed() {
    let (gateway, _seen) = serve().await;

    let err = gateway
        .list_messages(&ConversationId::new("missing"))
        .await
        .unwrap_err();

    assert!(matches!(err, GatewayError::Http { status: 404, .. }));
    assert_eq!(err.server_message(), Some("Conversa não encontrada"));
}

#[tokio::test]
async fn send_message_handles_reply_and_empty_body() {
    let (gateway, seen) = serve().await;

    let reply = gateway
        .send_message(&ConversationId::new("42"), &SendMessageRequest::new("Olá"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(reply.role.as_deref(), Some("ASSISTANT"));
    assert_eq!(reply.content.as_deref(), Some("eco: Olá"));
    assert_eq!(seen.send_bodies.lock()[0], json!({ "content": "Olá" }));

    let none = gateway
        .send_message(&ConversationId::new("quiet"), &SendMessageRequest::new("Olá"))
        .await
        .unwrap();
    assert_eq!(none, None);

    let err = gateway
        .send_message(&ConversationId::new("broken"), &SendMessageRequest::new("Olá"))
        .await
        .unwrap_err();
    assert!(matches!(err, GatewayError::Http { status: 500, .. }));
    assert_eq!(err.server_message(), None);
    assert_eq!(err.user_message("fallback"), "fallback");
}

#[tokio::test]
async fn upload_streams_files_with_progress() {
    let (gateway, _seen) = serve().await;
    let (tx, mut rx) = mpsc::channel(64);

    let files = vec![
        UploadFile::new("grande.bin", vec![7_u8; 150_000]),
        UploadFile::new("nota.txt", b"ola".to_vec()).with_content_type("text/plain"),
    ];
    let response = gateway.upload_documents("jurídico", files, tx).await.unwrap();

    assert_eq!(
        response,
        "jurídico files:grande.bin:150000,files:nota.txt:3"
    );

    let mut reports: Vec<UploadProgress> = Vec::new();
    while let Ok(progress) = rx.try_recv() {
        reports.push(progress);
    }
    assert!(reports.len() >= 2);
    assert!(reports.windows(2).all(|w| w[0].sent <= w[1].sent));
    let last = reports.last().unwrap();
    assert_eq!(last.sent, 150_003);
    assert_eq!(last.total, 150_003);
    assert_eq!(last.percent(), 100);
}

#[tokio::test]
async fn list_documents_and_blank_server_message() {
    let (gateway, _seen) = serve().await;

    let docs = gateway.list_documents("rh").await.unwrap();
    assert_eq!(docs.len(), 2);
    assert_eq!(docs[0].name.as_deref(), Some("manual.pdf"));
    assert_eq!(docs[0].size, Some(1024));
    assert_eq!(docs[0].id, Some(MessageId::from("doc-1")));
    assert_eq!(docs[1].size, None);

    let err = gateway.list_documents("vazio").await.unwrap_err();
    assert_eq!(err.user_message("Não foi possível carregar os documentos."), "Não foi possível carregar os documentos.");
}

#[tokio::test]
async fn unreachable_backend_is_a_transport_error() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let gateway = HttpGateway::new(&format!("http://{addr}"), Duration::from_secs(2)).unwrap();
    let err = gateway
        .list_messages(&ConversationId::new("1"))
        .await
        .unwrap_err();

    assert!(matches!(err, GatewayError::Transport(_)));
    assert_eq!(err.server_message(), None);
}
