//! Officeflow - an office automation backend
//!
//! Users, departments, to-dos and multi-step approvals over HTTP, a
//! WebSocket chat channel, and an assistant that routes natural-language
//! requests to the same operations.

pub mod assistant;
pub mod config;
pub mod db;
pub mod entity;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod service;
pub mod state;
pub mod store;
pub mod ws;

// Re-export commonly used types
pub use config::Config;
pub use state::AppState;
