//! Conform Core - Backend logic for Audio Conform
//!
//! This crate contains the duration-conforming pipeline with zero HTTP
//! dependencies. It can be driven by the HTTP server or a CLI tool.

pub mod config;
pub mod engine;
pub mod logging;
pub mod models;
pub mod orchestrator;
pub mod planning;
pub mod source;
pub mod store;

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_returns_value() {
        assert!(!version().is_empty());
    }
}
