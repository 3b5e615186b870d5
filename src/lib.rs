//! chatmint - Group Chat Message Pipeline
//!
//! Backend of a group chat where every accepted message is scored by a
//! content-quality oracle and mints tokens for its sender.
//!
//! # Overview
//!
//! A submission flows through:
//!
//! 1. A per-sender rate limiter
//! 2. A FIFO queue drained in batches on a fixed tick
//! 3. A cached analysis gateway that degrades to a fallback result
//! 4. The reward formula (quality, stake, reputation)
//! 5. One transaction committing the message and the sender and group
//!    aggregates
//! 6. Invalidation of the group's cached history
//!
//! # Module Structure
//!
//! - **`shared`** - Platform-agnostic types: message record, analysis result,
//!   group events, pipeline configuration, shared errors
//! - **`backend`** - Server-side code (only compiled with the `ssr` feature):
//!   the pipeline, stores, caches, HTTP routes and server setup
//!
//! # Feature Flags
//!
//! - **`ssr`** (default) - Enables the backend modules and the server binary
//!
//! # Example
//!
//! ```rust,no_run
//! use chatmint::backend::server::{create_app, ServerConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ServerConfig::load()?;
//! let app = create_app(&config).await;
//! // Serve app.router, then app.shutdown().await
//! # Ok(())
//! # }
//! ```

/// Shared types and data structures
pub mod shared;

/// Backend server-side code
#[cfg(feature = "ssr")]
pub mod backend;
