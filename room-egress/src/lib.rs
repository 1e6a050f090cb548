//! room-egress library crate.
//!
//! A control-plane service that starts and stops composite room recordings
//! on a LiveKit-compatible media server.

pub mod api;
pub mod config;
pub mod egress;
pub mod error;
pub mod logging;
pub mod utils;

pub use error::{Error, Result};
