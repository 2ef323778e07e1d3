use axum::http::StatusCode;
use axum::response::{IntoResponse, Redirect, Response};

use crate::routes::pages;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Not found")]
    NotFound,

    #[error("Forbidden")]
    Forbidden,

    #[error("Login required")]
    LoginRequired,

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Upload error: {0}")]
    Multipart(#[from] axum::extract::multipart::MultipartError),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match &self {
            AppError::NotFound => pages::not_found(),
            AppError::Forbidden => pages::forbidden(),
            AppError::LoginRequired => Redirect::to("/blog/login").into_response(),
            AppError::Database(e) => {
                tracing::error!("Database error: {}", e);
                internal_error()
            }
            AppError::Pool(e) => {
                tracing::error!("Pool error: {}", e);
                internal_error()
            }
            AppError::Io(e) => {
                tracing::error!("I/O error: {}", e);
                internal_error()
            }
            AppError::Multipart(e) => {
                tracing::warn!("Rejected upload: {}", e);
                (e.status(), e.body_text()).into_response()
            }
        }
    }
}

fn internal_error() -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "Internal server error".to_string(),
    )
        .into_response()
}

pub type AppResult<T> = Result<T, AppError>;
