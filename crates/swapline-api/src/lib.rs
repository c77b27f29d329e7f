//! swapline-api: HTTP API layer for Swapline
//!
//! Exposes the quote, execution and administrative operations over HTTP.

pub mod dto;
pub mod routes;
pub mod server;
pub mod state;

pub use server::*;
pub use state::AppState;
