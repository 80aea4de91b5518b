//! Claims Guard HTTP presentation layer
//!
//! This crate provides the HTTP API and the tower layers that guard it.

pub mod error;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod state;
pub mod tasks;

pub use error::ApiError;
pub use middleware::{
    SecurityLayer, SecurityMiddleware, SecuritySettings, SignatureVerificationLayer,
};
pub use routes::create_router;
pub use state::AppState;
pub use tasks::spawn_rate_limit_cleanup_task;
