//! HTTP API handlers

pub mod download;
pub mod error;
pub mod health;
pub mod process;

pub use download::download;
pub use error::ApiError;
pub use health::health_routes;
pub use process::process;
