//! Vidora Web - JSON API and streaming server

#![warn(missing_docs)]
#![warn(clippy::missing_errors_doc)]
#![deny(clippy::missing_panics_doc)]
#![warn(clippy::too_many_lines)]
//!
//! Upload, catalog and byte-range streaming endpoints over axum.

pub mod handlers;
pub mod server;

// Re-export main types
pub use handlers::ApiError;
pub use server::{AppState, build_router, run_server};
