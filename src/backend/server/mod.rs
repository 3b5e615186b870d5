//! Server Module
//!
//! Server initialization, configuration and application state.
//!
//! # Module Structure
//!
//! ```text
//! server/
//! ├── mod.rs    - Module exports
//! ├── state.rs  - AppState and FromRef implementations
//! ├── config.rs - TOML + environment configuration, optional services
//! └── init.rs   - App assembly and background tasks
//! ```

/// Application state
pub mod state;

/// Configuration loading
pub mod config;

/// Server initialization
pub mod init;

pub use config::ServerConfig;
pub use init::{build_app, create_app, App};
pub use state::AppState;
