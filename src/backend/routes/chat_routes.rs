/**
 * Chat Routes
 *
 * - `POST /groups/{group_id}/messages` - Submit a message
 * - `GET /groups/{group_id}/messages?before=` - History page
 * - `GET /groups/{group_id}/events` - SSE stream of group events
 * - `DELETE /messages/{message_id}` - Soft delete
 */
use crate::backend::chat::handlers::{
    handle_delete_message, handle_get_history, handle_post_message,
};
use crate::backend::realtime::handle_group_events;
use crate::backend::server::state::AppState;
use axum::routing::{delete, get};
use axum::Router;

/// Add chat routes to `router`
pub fn configure_chat_routes(router: Router<AppState>) -> Router<AppState> {
    router
        .route(
            "/groups/{group_id}/messages",
            get(handle_get_history).post(handle_post_message),
        )
        .route("/groups/{group_id}/events", get(handle_group_events))
        .route("/messages/{message_id}", delete(handle_delete_message))
}
