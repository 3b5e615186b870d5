/**
 * Router Configuration
 *
 * Combines every route into one Axum router:
 *
 * 1. Chat routes (submission, history, events, delete)
 * 2. `GET /health`
 * 3. JSON 404 fallback
 *
 * Requests are traced with `tower-http`'s `TraceLayer`.
 */
use crate::backend::chat::handlers::handle_health;
use crate::backend::error::BackendError;
use crate::backend::routes::chat_routes::configure_chat_routes;
use crate::backend::server::state::AppState;
use axum::routing::get;
use axum::Router;
use tower_http::trace::TraceLayer;

/// Create the router with every route configured
pub fn create_router(app_state: AppState) -> Router<()> {
    let router = configure_chat_routes(Router::new());

    router
        .route("/health", get(handle_health))
        .fallback(|| async { BackendError::not_found("route") })
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}
