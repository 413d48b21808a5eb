//! Audio Conform HTTP server library.
//!
//! Thin axum layer over `conform_core::orchestrator::ConformService`:
//! `POST /process` runs one conform job, `GET <prefix>/:name` serves a
//! published artifact and `GET /health` reports liveness.

use axum::Router;
use conform_core::orchestrator::ConformService;
use tower_http::trace::TraceLayer;

pub mod api;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Conform service (owns engine, fetcher and result store)
    pub service: ConformService,
    /// Route prefix used for download URLs, e.g. `/dl`
    pub download_prefix: String,
}

impl AppState {
    pub fn new(service: ConformService) -> Self {
        let download_prefix = normalize_prefix(&service.settings().server.download_prefix);
        Self {
            service,
            download_prefix,
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::routing::{get, post};

    let download_route = format!("{}/:name", state.download_prefix);

    Router::new()
        .route("/process", post(api::process))
        .route(&download_route, get(api::download))
        .merge(api::health_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn normalize_prefix(prefix: &str) -> String {
    let trimmed = prefix.trim().trim_matches('/');
    if trimmed.is_empty() {
        "/dl".to_string()
    } else {
        format!("/{}", trimmed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefix_is_normalized() {
        assert_eq!(normalize_prefix("/dl"), "/dl");
        assert_eq!(normalize_prefix("files/"), "/files");
        assert_eq!(normalize_prefix(" / "), "/dl");
    }
}
