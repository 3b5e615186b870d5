//! Backend Module
//!
//! Server-side code: the message ingestion and reward pipeline and the Axum
//! server in front of it. Only compiled with the `ssr` feature.
//!
//! # Architecture
//!
//! - **`ratelimit`** - Per-sender submission cap
//! - **`analysis`** - Cached, fail-safe content analysis oracle gateway
//! - **`reward`** - Token reward formula and quote cache
//! - **`store`** - Transactional store for messages and aggregates
//! - **`cache`** - Key-value cache and namespace invalidation
//! - **`chat`** - Batcher, commit transaction, pipeline facade, history
//! - **`realtime`** - Per-group SSE event broadcasting
//! - **`server`** - Configuration, application state, initialization
//! - **`routes`** - Route configuration
//! - **`error`** - Backend error types
//!
//! # Module Structure
//!
//! ```text
//! backend/
//! ├── mod.rs       - Module exports and documentation
//! ├── main.rs      - Server binary
//! ├── ratelimit.rs - Rate limiter
//! ├── reward.rs    - Reward engine
//! ├── analysis/    - Oracle clients and gateway
//! ├── cache/       - Cache capability
//! ├── store/       - Memory and PostgreSQL stores
//! ├── chat/        - Pipeline
//! ├── realtime/    - Event broadcasting
//! ├── server/      - Server setup
//! ├── routes/      - Routes
//! └── error/       - Error types
//! ```
//!
//! # Concurrency
//!
//! - The submission buffer is a `std::sync::Mutex<VecDeque>`; claims splice
//!   under the lock
//! - Rate-limit counters live in a `DashMap`, one slot per sender
//! - Aggregate updates run inside a store transaction that locks the sender
//!   and then the group
//! - Group events use one `tokio::sync::broadcast` channel per group

/// Per-sender rate limiting
pub mod ratelimit;

/// Content analysis
pub mod analysis;

/// Token rewards
pub mod reward;

/// Transactional store
pub mod store;

/// Key-value cache
pub mod cache;

/// Message pipeline
pub mod chat;

/// Real-time group events
pub mod realtime;

/// Server setup and configuration
pub mod server;

/// Route configuration
pub mod routes;

/// Backend error types
pub mod error;
