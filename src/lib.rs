// Library exports for Jotter
// This allows integration tests and external code to use Jotter modules

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod extractors;
pub mod flash;
pub mod media;
pub mod render;
pub mod routes;
pub mod state;

use axum::extract::DefaultBodyLimit;
use axum::response::Redirect;
use axum::routing::get;
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Build the full application router.
pub fn app(state: AppState) -> Router {
    let body_limit = state.config.server.max_content_length;

    Router::new()
        .route("/", get(|| async { Redirect::to("/blog/") }))
        .route("/assets/{*path}", get(routes::assets::serve))
        .merge(routes::auth::router())
        .merge(routes::blog::router())
        .merge(routes::cloud::router())
        .fallback(routes::pages::fallback)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
