/**
 * Group Event Subscription Handler
 *
 * `GET /groups/{group_id}/events` streams the group's events as Server-Sent
 * Events. The SSE event name is the event type (`message`,
 * `message_deleted`); the data is the JSON-encoded `GroupEvent`.
 *
 * A lagging subscriber skips what it missed and keeps streaming; the stream
 * ends when the group's channel closes.
 */
use crate::backend::realtime::broadcast::GroupBroadcast;
use axum::extract::{Path, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use futures_util::stream::{self, Stream};
use std::convert::Infallible;
use tokio::sync::broadcast::error::RecvError;
use uuid::Uuid;

/// Handle a group event subscription
pub async fn handle_group_events(
    State(broadcast): State<GroupBroadcast>,
    Path(group_id): Path<Uuid>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    tracing::info!("[Realtime] New subscriber for group {}", group_id);
    let rx = broadcast.subscribe(group_id);

    let stream = stream::unfold(rx, move |mut rx| async move {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    let data = match serde_json::to_string(&event) {
                        Ok(data) => data,
                        Err(e) => {
                            tracing::error!("[Realtime] Failed to serialize event: {}", e);
                            continue;
                        }
                    };
                    let sse_event = Event::default().event(event.event_type.as_str()).data(data);
                    return Some((Ok(sse_event), rx));
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(
                        "[Realtime] Subscriber of group {} lagged, skipped {} events",
                        group_id,
                        skipped
                    );
                    continue;
                }
                Err(RecvError::Closed) => {
                    tracing::debug!("[Realtime] Channel of group {} closed", group_id);
                    return None;
                }
            }
        }
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}
