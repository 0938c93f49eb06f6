//! # market-server
//!
//! Axum HTTP API for the course marketplace.
//!
//! ```text
//! /health
//! /api/v1/course     catalog, authoring, lectures
//! /api/v1/purchase   checkout, verify, webhook, gated content
//! /api/v1/test       knowledge tests
//! /api/v1/progress   lecture progress
//! ```

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod seed;
pub mod state;

pub use auth::{SessionKeys, SESSION_COOKIE};
pub use config::ServerConfig;
pub use routes::build_router;
pub use state::AppState;
