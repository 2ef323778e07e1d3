use askama::Template;
use axum::extract::State;
use axum::http::header;
use axum::response::{AppendHeaders, IntoResponse, Redirect, Response};
use axum::Form;
use serde::Deserialize;

use crate::extractors::{IncomingFlash, MaybeAdmin};
use crate::flash::Flash;
use crate::routes::pages::{consume_flash, Html};
use crate::state::AppState;

// -- Templates --

#[derive(Template)]
#[template(path = "pages/login.html")]
pub struct LoginTemplate {
    pub flash: Option<Flash>,
    pub is_admin: bool,
}

// -- Request types --

#[derive(Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub password: String,
}

// -- Cookie helpers --

fn session_cookie(name: &str, token: &str, max_age_secs: i64) -> String {
    format!(
        "{}={}; HttpOnly; SameSite=Strict; Path=/; Max-Age={}",
        name, token, max_age_secs
    )
}

fn clear_session_cookie(name: &str) -> String {
    format!("{}=; HttpOnly; SameSite=Strict; Path=/; Max-Age=0", name)
}

// -- Handlers --

/// GET /blog/login
pub async fn login_page(MaybeAdmin(is_admin): MaybeAdmin, flash: IncomingFlash) -> Response {
    let page = LoginTemplate {
        flash: flash.0.clone(),
        is_admin,
    };
    consume_flash(page, &flash)
}

/// POST /blog/login: compare against the configured admin password
pub async fn login(State(state): State<AppState>, Form(form): Form<LoginForm>) -> Response {
    let configured = &state.config.auth.admin_password;

    if state.sessions.password_matches(configured, &form.password) {
        tracing::info!("Admin logged in");
        let token = state.sessions.issue();
        let cookie = session_cookie(
            &state.config.auth.cookie_name,
            &token,
            state.sessions.lifetime_secs(),
        );
        return (
            AppendHeaders([(header::SET_COOKIE, cookie)]),
            Redirect::to("/blog/"),
        )
            .into_response();
    }

    tracing::warn!("Rejected admin login attempt");
    Html(LoginTemplate {
        flash: Some(Flash::error("Invalid credentials")),
        is_admin: false,
    })
    .into_response()
}

/// GET /blog/logout
pub async fn logout(State(state): State<AppState>) -> Response {
    (
        AppendHeaders([(
            header::SET_COOKIE,
            clear_session_cookie(&state.config.auth.cookie_name),
        )]),
        Redirect::to("/blog/"),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_cookie_is_http_only_and_scoped_to_root() {
        let cookie = session_cookie("jotter_session", "tok", 3600);
        assert_eq!(
            cookie,
            "jotter_session=tok; HttpOnly; SameSite=Strict; Path=/; Max-Age=3600"
        );
    }

    #[test]
    fn clear_cookie_expires_immediately() {
        assert!(clear_session_cookie("jotter_session").ends_with("Max-Age=0"));
    }
}
