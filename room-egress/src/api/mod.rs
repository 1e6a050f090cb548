//! HTTP boundary.
//!
//! Exposes `GET /health`, `POST /start` and `POST /stop` and forwards
//! requests to the egress orchestrator.

pub mod error;
pub mod models;
pub mod routes;
pub mod server;

pub use server::{ApiServer, ApiServerConfig, AppState};
