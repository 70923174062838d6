//! REST backend integration tests against a mock PostgREST server

use serde_json::json;

use wiremock::matchers::{body_json, body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use gasket::assistant::{ChatMessage, Sender};
use gasket::backend::{ChatBackend, MessageEvent};
use gasket::session::new_session_id;

mod common;
use common::rest_backend_for;

#[tokio::test]
async fn test_create_session_posts_row_with_auth_headers() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/chat_sessions"))
        .and(header("apikey", "test-key"))
        .and(header("authorization", "Bearer test-key"))
        .and(body_partial_json(json!({ "title": "Brake noise" })))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    let backend = rest_backend_for(&server.uri());
    let session_id = backend.create_session("Brake noise", None).await.unwrap();

    // The id is minted client-side.
    assert!(gasket::session::is_valid_session_id(&session_id.to_string()));
}

#[tokio::test]
async fn test_store_user_message_inserts_row_and_touches_session() {
    let server = MockServer::start().await;
    let session_id = new_session_id();
    let message = ChatMessage::user("My brakes squeal");

    Mock::given(method("POST"))
        .and(path("/rest/v1/chat_messages"))
        .and(body_partial_json(json!({
            "id": message.id,
            "session_id": session_id,
            "role": "user",
            "content": "My brakes squeal",
        })))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    // Session ordering follows message activity: every insert bumps
    // updated_at.
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/chat_sessions"))
        .and(query_param("id", format!("eq.{}", session_id)))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let backend = rest_backend_for(&server.uri());
    backend
        .store_user_message(&message, session_id)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_store_message_propagates_server_error() {
    let server = MockServer::start().await;
    let session_id = new_session_id();

    Mock::given(method("POST"))
        .and(path("/rest/v1/chat_messages"))
        .respond_with(ResponseTemplate::new(500).set_body_string("insert failed"))
        .mount(&server)
        .await;

    let backend = rest_backend_for(&server.uri());
    let result = backend
        .store_ai_message(&ChatMessage::ai("reply"), session_id)
        .await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_fetch_messages_roundtrip_is_field_equal() {
    let server = MockServer::start().await;
    let session_id = new_session_id();
    let message = ChatMessage::user("round trip");

    let row = json!({
        "id": message.id,
        "session_id": session_id,
        "role": "user",
        "content": message.text,
        "created_at": message.timestamp,
    });

    Mock::given(method("GET"))
        .and(path("/rest/v1/chat_messages"))
        .and(query_param("session_id", format!("eq.{}", session_id)))
        .and(query_param("order", "created_at.asc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([row])))
        .expect(1)
        .mount(&server)
        .await;

    let backend = rest_backend_for(&server.uri());
    let fetched = backend.fetch_messages(session_id).await.unwrap();

    assert_eq!(fetched.len(), 1);
    assert_eq!(fetched[0], message);
}

#[tokio::test]
async fn test_fetch_messages_preserves_server_order() {
    let server = MockServer::start().await;
    let session_id = new_session_id();

    let rows: Vec<serde_json::Value> = ["first", "second", "third"]
        .iter()
        .map(|text| {
            let m = ChatMessage::user(*text);
            json!({
                "id": m.id,
                "session_id": session_id,
                "role": "user",
                "content": m.text,
                "created_at": m.timestamp,
            })
        })
        .collect();

    Mock::given(method("GET"))
        .and(path("/rest/v1/chat_messages"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!(rows)))
        .mount(&server)
        .await;

    let backend = rest_backend_for(&server.uri());
    let fetched = backend.fetch_messages(session_id).await.unwrap();
    let texts: Vec<&str> = fetched.iter().map(|m| m.text.as_str()).collect();
    assert_eq!(texts, vec!["first", "second", "third"]);
}

#[tokio::test]
async fn test_fetch_messages_errors_on_server_failure() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/chat_messages"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let backend = rest_backend_for(&server.uri());
    assert!(backend.fetch_messages(new_session_id()).await.is_err());
}

#[tokio::test]
async fn test_fetch_last_session_returns_most_recent() {
    let server = MockServer::start().await;
    let user_id = uuid::Uuid::new_v4();
    let session_id = new_session_id();

    Mock::given(method("GET"))
        .and(path("/rest/v1/chat_sessions"))
        .and(query_param("user_id", format!("eq.{}", user_id)))
        .and(query_param("order", "updated_at.desc"))
        .and(query_param("limit", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
            "id": session_id,
            "user_id": user_id,
            "title": "Coolant leak",
            "created_at": "2026-08-01T10:00:00Z",
            "updated_at": "2026-08-05T18:30:00Z",
        }])))
        .expect(1)
        .mount(&server)
        .await;

    let backend = rest_backend_for(&server.uri());
    let session = backend.fetch_last_session(user_id).await.unwrap().unwrap();
    assert_eq!(session.id, session_id);
    assert_eq!(session.title, "Coolant leak");
}

#[tokio::test]
async fn test_fetch_last_session_none_when_empty() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/chat_sessions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let backend = rest_backend_for(&server.uri());
    let session = backend
        .fetch_last_session(uuid::Uuid::new_v4())
        .await
        .unwrap();
    assert!(session.is_none());
}

#[tokio::test]
async fn test_rename_sends_title_only() {
    let server = MockServer::start().await;
    let session_id = new_session_id();

    // Exact body match: the rename payload must not carry updated_at, so a
    // renamed session keeps its position in the activity-ordered list.
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/chat_sessions"))
        .and(query_param("id", format!("eq.{}", session_id)))
        .and(body_json(json!({ "title": "New title" })))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let backend = rest_backend_for(&server.uri());
    backend
        .rename_session(session_id, "New title")
        .await
        .unwrap();
}

#[tokio::test]
async fn test_delete_removes_messages_then_session() {
    let server = MockServer::start().await;
    let session_id = new_session_id();

    Mock::given(method("DELETE"))
        .and(path("/rest/v1/chat_messages"))
        .and(query_param("session_id", format!("eq.{}", session_id)))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("DELETE"))
        .and(path("/rest/v1/chat_sessions"))
        .and(query_param("id", format!("eq.{}", session_id)))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let backend = rest_backend_for(&server.uri());
    backend.delete_session(session_id).await.unwrap();
}

#[tokio::test]
async fn test_subscribe_delivers_matching_insert_events() {
    let server = MockServer::start().await;
    let session_id = new_session_id();
    let ours = ChatMessage::user("ours");
    let theirs = ChatMessage::user("not ours");

    let body = format!(
        "event: INSERT\ndata: {}\n\nevent: INSERT\ndata: {}\n\n",
        json!({
            "table": "chat_messages",
            "record": {
                "id": theirs.id,
                "session_id": new_session_id(),
                "role": "user",
                "content": theirs.text,
                "created_at": theirs.timestamp,
            }
        }),
        json!({
            "table": "chat_messages",
            "record": {
                "id": ours.id,
                "session_id": session_id,
                "role": "user",
                "content": ours.text,
                "created_at": ours.timestamp,
            }
        }),
    );

    Mock::given(method("GET"))
        .and(path("/realtime/v1/stream"))
        .and(query_param("table", "chat_messages"))
        .and(query_param("event", "INSERT"))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw(body.into_bytes(), "text/event-stream"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let backend = rest_backend_for(&server.uri());
    let mut events = backend.subscribe(session_id).await.unwrap();

    let MessageEvent::Inserted(message) = events.recv().await.unwrap();
    assert_eq!(message.id, ours.id);
    assert_eq!(message.text, "ours");
    assert_eq!(message.sender, Sender::User);

    // Stream ends after the body; the channel closes cleanly.
    assert!(events.recv().await.is_none());
}

#[tokio::test]
async fn test_subscribe_errors_on_unavailable_stream() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/realtime/v1/stream"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let backend = rest_backend_for(&server.uri());
    assert!(backend.subscribe(new_session_id()).await.is_err());
}
