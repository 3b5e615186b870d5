/**
 * Chat HTTP Handlers
 *
 * Thin adapters between HTTP and the pipeline. Committed and deleted
 * messages are published to the group's subscribers after the store change
 * succeeded; publishing is best-effort and never fails the request.
 */
use crate::backend::chat::ChatPipeline;
use crate::backend::error::BackendError;
use crate::backend::realtime::GroupBroadcast;
use crate::shared::event::GroupEvent;
use crate::shared::message::MessageRecord;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

/// Body of `POST /groups/{group_id}/messages`
#[derive(Debug, Deserialize)]
pub struct PostMessageRequest {
    pub sender_id: Uuid,
    pub text: String,
}

/// Query of `GET /groups/{group_id}/messages`
#[derive(Debug, Default, Deserialize)]
pub struct HistoryQuery {
    pub before: Option<Uuid>,
}

/// Submit a message to a group
///
/// Responds `201 Created` with the committed record once the pipeline has
/// analysed, rewarded and committed it.
pub async fn handle_post_message(
    State(pipeline): State<ChatPipeline>,
    State(broadcast): State<GroupBroadcast>,
    Path(group_id): Path<Uuid>,
    Json(request): Json<PostMessageRequest>,
) -> Result<(StatusCode, Json<MessageRecord>), BackendError> {
    let record = pipeline
        .submit(request.sender_id, group_id, request.text)
        .await?;

    match GroupEvent::message(&record) {
        Ok(event) => {
            broadcast.publish(event);
        }
        Err(e) => tracing::error!(
            "[Chat] Failed to encode event for message {}: {}",
            record.id,
            e
        ),
    }
    Ok((StatusCode::CREATED, Json(record)))
}

/// One page of a group's history, newest first
pub async fn handle_get_history(
    State(pipeline): State<ChatPipeline>,
    Path(group_id): Path<Uuid>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<MessageRecord>>, BackendError> {
    let page = pipeline.load_history(group_id, query.before).await?;
    Ok(Json(page))
}

/// Soft-delete a message
pub async fn handle_delete_message(
    State(pipeline): State<ChatPipeline>,
    State(broadcast): State<GroupBroadcast>,
    Path(message_id): Path<Uuid>,
) -> Result<StatusCode, BackendError> {
    match pipeline.delete_message(message_id).await? {
        Some(group_id) => {
            broadcast.publish(GroupEvent::message_deleted(group_id, message_id));
            Ok(StatusCode::NO_CONTENT)
        }
        None => Err(BackendError::not_found(format!("message {}", message_id))),
    }
}

pub async fn handle_health() -> &'static str {
    "ok"
}
