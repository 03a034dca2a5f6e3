//! HTTP surface over the catalog snapshot.
//!
//! | Route | Response |
//! |---|---|
//! | `GET /health` | `{"status":"ok","models":n}` |
//! | `GET /api/models` | JSON list of models |
//! | `GET /api/models/{name}/torrent` | the model's torrent, or 404 |
//! | `GET /api/store/torrent` | the full-store torrent, or 404 |

mod error;
mod routes;

pub use error::HttpError;
pub use routes::HealthResponse;

use crate::catalog::ModelCatalog;
use axum::{routing::get, Router};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct AppState {
    pub catalog: Arc<ModelCatalog>,
}

impl AppState {
    pub fn new(catalog: Arc<ModelCatalog>) -> Self {
        Self { catalog }
    }
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(routes::health))
        .route("/api/models", get(routes::list_models))
        .route("/api/models/{name}/torrent", get(routes::model_torrent))
        .route("/api/store/torrent", get(routes::store_torrent))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests;
