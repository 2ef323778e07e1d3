use axum::routing::get;
use axum::Router;

use crate::auth::handlers;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/blog/login", get(handlers::login_page).post(handlers::login))
        .route("/blog/logout", get(handlers::logout))
}
