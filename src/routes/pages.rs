use std::path::Path;

use askama::Template;
use axum::body::Body;
use axum::extract::Request;
use axum::http::{header, StatusCode};
use axum::response::{AppendHeaders, IntoResponse, Response};
use tower::ServiceExt;
use tower_http::services::ServeFile;

use crate::extractors::{IncomingFlash, MaybeAdmin};
use crate::flash::{clear_flash_cookie, Flash};

/// Wrapper to render askama templates as axum responses
pub struct Html<T: Template>(pub T);

impl<T: Template> IntoResponse for Html<T> {
    fn into_response(self) -> Response {
        match self.0.render() {
            Ok(body) => (
                StatusCode::OK,
                [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
                body,
            )
                .into_response(),
            Err(e) => {
                tracing::error!("Template render error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Template error").into_response()
            }
        }
    }
}

/// Render a page that displayed the incoming flash, so the cookie is
/// cleared and the notice is shown only once.
pub fn consume_flash<T: Template>(page: T, incoming: &IncomingFlash) -> Response {
    if incoming.0.is_some() {
        (
            AppendHeaders([(header::SET_COOKIE, clear_flash_cookie())]),
            Html(page),
        )
            .into_response()
    } else {
        Html(page).into_response()
    }
}

/// Stream a file from disk in chunks. `ServeFile` sets the content type,
/// length and handles range requests.
pub async fn serve_file(path: &Path, request: Request) -> Response {
    match ServeFile::new(path).oneshot(request).await {
        Ok(response) => response.map(Body::new),
        Err(never) => match never {},
    }
}

#[derive(Template)]
#[template(path = "pages/404.html")]
pub struct NotFoundTemplate {
    pub flash: Option<Flash>,
    pub is_admin: bool,
}

#[derive(Template)]
#[template(path = "pages/403.html")]
pub struct ForbiddenTemplate {
    pub flash: Option<Flash>,
    pub is_admin: bool,
}

pub fn not_found() -> Response {
    let page = NotFoundTemplate {
        flash: None,
        is_admin: false,
    };
    (StatusCode::NOT_FOUND, Html(page)).into_response()
}

pub fn forbidden() -> Response {
    let page = ForbiddenTemplate {
        flash: None,
        is_admin: false,
    };
    (StatusCode::FORBIDDEN, Html(page)).into_response()
}

/// Router fallback for unknown paths.
pub async fn fallback(MaybeAdmin(is_admin): MaybeAdmin) -> Response {
    let page = NotFoundTemplate {
        flash: None,
        is_admin,
    };
    (StatusCode::NOT_FOUND, Html(page)).into_response()
}
