//! Route Configuration Module
//!
//! # Module Structure
//!
//! ```text
//! routes/
//! ├── mod.rs         - Module exports
//! ├── router.rs      - Main router creation
//! └── chat_routes.rs - Chat routes
//! ```

/// Main router creation
pub mod router;

/// Chat routes
pub mod chat_routes;

pub use router::create_router;
