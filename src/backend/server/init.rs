/**
 * Server Initialization
 *
 * Builds the application from a `ServerConfig`:
 *
 * 1. Connect the store (PostgreSQL or in-memory)
 * 2. Build the analysis oracle (Gemini or disabled)
 * 3. Assemble the pipeline over an in-process cache
 * 4. Start the batch drainer, the broadcast channel cleanup and the cache
 *    purge
 * 5. Create the router
 *
 * The returned `App` owns the background tasks; `App::shutdown` stops them.
 */
use crate::backend::cache::{spawn_cache_maintenance, MemoryCache};
use crate::backend::chat::{BatcherHandle, ChatPipeline};
use crate::backend::realtime::{spawn_channel_cleanup, GroupBroadcast};
use crate::backend::routes::router::create_router;
use crate::backend::server::config::{load_oracle, load_store, ServerConfig};
use crate::backend::server::state::AppState;
use axum::Router;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Interval between sweeps of abandoned group channels
const CHANNEL_CLEANUP_INTERVAL: Duration = Duration::from_secs(300);

/// Interval between purges of expired cache entries
const CACHE_PURGE_INTERVAL: Duration = Duration::from_secs(60);

/// Running application and its background tasks
pub struct App {
    pub router: Router<()>,
    pub state: AppState,
    drainer: BatcherHandle,
    cleanup: JoinHandle<()>,
    cache_purge: JoinHandle<()>,
}

impl App {
    /// Stop background work; queued submissions are answered `ShuttingDown`
    pub async fn shutdown(self) {
        self.cleanup.abort();
        self.cache_purge.abort();
        self.drainer.stop().await;
        tracing::info!("[Server] Background tasks stopped");
    }
}

/// Build the application from loaded configuration
pub async fn create_app(config: &ServerConfig) -> App {
    tracing::info!("[Server] Initializing chatmint backend");

    let store = load_store(config.database_url.as_deref()).await;
    let oracle = load_oracle(&config.oracle, config.pipeline.oracle_timeout);
    let cache = Arc::new(MemoryCache::new());

    let pipeline = ChatPipeline::new(&config.pipeline, oracle, cache, store);
    let state = AppState {
        pipeline,
        broadcast: GroupBroadcast::new(),
    };
    build_app(state)
}

/// Start background tasks over prepared state and create the router
pub fn build_app(state: AppState) -> App {
    let drainer = state.pipeline.start();
    let cleanup = spawn_channel_cleanup(state.broadcast.clone(), CHANNEL_CLEANUP_INTERVAL);
    let cache_purge =
        spawn_cache_maintenance(Arc::clone(state.pipeline.cache()), CACHE_PURGE_INTERVAL);
    let router = create_router(state.clone());

    tracing::info!("[Server] Router configured with batch drainer and maintenance tasks");
    App {
        router,
        state,
        drainer,
        cleanup,
        cache_purge,
    }
}
