/**
 * Application State Management
 *
 * `AppState` is the Axum router state. The `FromRef` implementations let
 * handlers extract just the part they need:
 *
 * ```rust,ignore
 * async fn handler(State(pipeline): State<ChatPipeline>) { /* ... */ }
 * ```
 */
use crate::backend::chat::ChatPipeline;
use crate::backend::realtime::GroupBroadcast;
use axum::extract::FromRef;

/// Shared state of every request handler
#[derive(Clone)]
pub struct AppState {
    /// Message ingestion pipeline
    pub pipeline: ChatPipeline,

    /// Per-group event channels for SSE subscribers
    pub broadcast: GroupBroadcast,
}

impl FromRef<AppState> for ChatPipeline {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.pipeline.clone()
    }
}

impl FromRef<AppState> for GroupBroadcast {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.broadcast.clone()
    }
}
