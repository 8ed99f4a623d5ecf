use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod dashboard;
pub mod handlers;
pub mod state;

pub use state::AppState;

pub fn create_app(state: AppState) -> Router {
    let cors = CorsLayer::permissive();

    Router::new()
        .route("/", get(handlers::dashboard))
        .route("/api/articles", get(handlers::list_articles))
        .route("/api/article", get(handlers::get_article))
        .route("/api/stats", get(handlers::stats))
        .route("/api/sources", get(handlers::sources))
        .route("/api/runs", get(handlers::runs))
        .route("/api/scrape", post(handlers::scrape))
        .route("/api/refresh", post(handlers::scrape))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(Arc::new(state))
}

pub mod prelude {
    pub use crate::AppState;
    pub use nd_core::{Article, Error, Result};
}
