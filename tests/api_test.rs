//! HTTP API tests
//!
//! Requests go through the full router with `tower::ServiceExt::oneshot`.

mod common;

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use chatmint::backend::realtime::GroupBroadcast;
use chatmint::backend::server::{build_app, App, AppState};
use chatmint::shared::message::MessageRecord;
use common::{pipeline, seeded_store, test_config, KeywordOracle, Seeded, SPAM_MARKER};
use futures_util::StreamExt;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use std::time::Duration;
use tower::ServiceExt;
use uuid::Uuid;

async fn test_app() -> (App, Seeded) {
    let seeded = seeded_store().await;
    let (pipeline, _cache) = pipeline(&test_config(), KeywordOracle::new(), &seeded.store);
    let app = build_app(AppState {
        pipeline,
        broadcast: GroupBroadcast::new(),
    });
    (app, seeded)
}

async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
    };
    (status, body)
}

fn post_message(group_id: Uuid, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(format!("/groups/{}/messages", group_id))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: String) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn delete(uri: String) -> Request<Body> {
    Request::builder()
        .method("DELETE")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn test_health() {
    let (app, _seeded) = test_app().await;
    let (status, body) = send(&app.router, get("/health".to_string())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, Value::String("ok".to_string()));
    app.shutdown().await;
}

#[tokio::test]
async fn test_post_message_returns_committed_record() {
    let (app, seeded) = test_app().await;

    let (status, body) = send(
        &app.router,
        post_message(
            seeded.group.id,
            json!({ "sender_id": seeded.sender.id, "text": "Lifetimes finally clicked" }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["tokensMined"], json!(1.3));
    assert_eq!(body["contentQuality"], json!(80.0));
    assert_eq!(body["sentiment"], json!("positive"));
    assert_eq!(body["sender"]["address"], json!("0xa11ce"));
    assert_eq!(body["groupId"], json!(seeded.group.id));
    assert_eq!(body["isDeleted"], json!(false));
    app.shutdown().await;
}

#[tokio::test]
async fn test_post_message_error_statuses() {
    let (app, seeded) = test_app().await;

    let (status, body) = send(
        &app.router,
        post_message(seeded.group.id, json!({ "sender_id": seeded.sender.id, "text": "  " })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], json!(400));

    let (status, body) = send(
        &app.router,
        post_message(
            seeded.group.id,
            json!({ "sender_id": seeded.sender.id, "text": format!("{} now", SPAM_MARKER) }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["status"], json!(422));
    assert!(body["error"].as_str().unwrap().contains("spam"));

    let (status, _) = send(
        &app.router,
        post_message(seeded.group.id, json!({ "sender_id": Uuid::new_v4(), "text": "hi" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(
        &app.router,
        post_message(Uuid::new_v4(), json!({ "sender_id": seeded.sender.id, "text": "hi" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    app.shutdown().await;
}

#[tokio::test]
async fn test_history_and_delete() {
    let (app, seeded) = test_app().await;
    let history_uri = format!("/groups/{}/messages", seeded.group.id);

    let (status, body) = send(&app.router, get(history_uri.clone())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([]));

    let mut ids = Vec::new();
    for text in ["older", "newer"] {
        let (status, body) = send(
            &app.router,
            post_message(seeded.group.id, json!({ "sender_id": seeded.sender.id, "text": text })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let record: MessageRecord = serde_json::from_value(body).unwrap();
        ids.push(record.id);
    }

    let (_, body) = send(&app.router, get(history_uri.clone())).await;
    let page: Vec<MessageRecord> = serde_json::from_value(body).unwrap();
    assert_eq!(page.iter().map(|m| m.id).collect::<Vec<_>>(), vec![ids[1], ids[0]]);

    let (_, body) = send(&app.router, get(format!("{}?before={}", history_uri, ids[1]))).await;
    let page: Vec<MessageRecord> = serde_json::from_value(body).unwrap();
    assert_eq!(page.iter().map(|m| m.id).collect::<Vec<_>>(), vec![ids[0]]);

    let (status, _) = send(&app.router, delete(format!("/messages/{}", ids[1]))).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = send(&app.router, delete(format!("/messages/{}", ids[1]))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, body) = send(&app.router, get(history_uri)).await;
    let page: Vec<MessageRecord> = serde_json::from_value(body).unwrap();
    assert_eq!(page.iter().map(|m| m.id).collect::<Vec<_>>(), vec![ids[0]]);
    app.shutdown().await;
}

#[tokio::test]
async fn test_unknown_route_is_json_404() {
    let (app, _seeded) = test_app().await;
    let (status, body) = send(&app.router, get("/nope".to_string())).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["status"], json!(404));
    app.shutdown().await;
}

#[tokio::test]
async fn test_event_stream_receives_committed_message() {
    let (app, seeded) = test_app().await;

    let response = app
        .router
        .clone()
        .oneshot(get(format!("/groups/{}/events", seeded.group.id)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "text/event-stream"
    );
    assert_eq!(app.state.broadcast.subscriber_count(seeded.group.id), 1);
    let mut frames = response.into_body().into_data_stream();

    let (status, _) = send(
        &app.router,
        post_message(seeded.group.id, json!({ "sender_id": seeded.sender.id, "text": "live" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let frame = tokio::time::timeout(Duration::from_secs(2), frames.next())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    let frame = String::from_utf8(frame.to_vec()).unwrap();
    assert!(frame.contains("event: message\n"));
    assert!(frame.contains("\"live\""));
    app.shutdown().await;
}
