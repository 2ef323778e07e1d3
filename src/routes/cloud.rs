use askama::Template;
use axum::extract::{Multipart, Path, Request, State};
use axum::http::{header, HeaderValue};
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use axum::{Form, Router};
use serde::Deserialize;

use crate::error::{AppError, AppResult};
use crate::extractors::{AdminSession, IncomingFlash};
use crate::flash::{redirect_with, Flash};
use crate::media::{format_size, StoredFile};
use crate::routes::pages::{consume_flash, serve_file};
use crate::state::AppState;

// --- View structs ---

pub struct CloudFileView {
    pub name: String,
    pub size: String,
    pub modified: String,
}

impl From<StoredFile> for CloudFileView {
    fn from(file: StoredFile) -> Self {
        CloudFileView {
            size: format_size(file.size),
            modified: file.modified.format("%Y-%m-%d %H:%M").to_string(),
            name: file.name,
        }
    }
}

#[derive(Template)]
#[template(path = "pages/cloud.html")]
pub struct CloudTemplate {
    pub files: Vec<CloudFileView>,
    pub flash: Option<Flash>,
    pub is_admin: bool,
}

#[derive(Deserialize)]
pub struct DeleteForm {
    pub filename: Option<String>,
}

// --- Router ---

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/cloud", get(|| async { Redirect::permanent("/cloud/") }))
        .route("/cloud/", get(index).post(upload))
        .route("/cloud/download/{*filename}", get(download))
        .route("/cloud/delete", post(delete_file))
}

// --- Handlers ---

async fn index(
    State(state): State<AppState>,
    _admin: AdminSession,
    flash: IncomingFlash,
) -> Response {
    let files = match state.cloud.list().await {
        Ok(files) => files.into_iter().map(CloudFileView::from).collect(),
        Err(e) => {
            tracing::error!("Failed to list cloud folder: {}", e);
            Vec::new()
        }
    };

    let page = CloudTemplate {
        files,
        flash: flash.0.clone(),
        is_admin: true,
    };
    consume_flash(page, &flash)
}

async fn upload(
    State(state): State<AppState>,
    _admin: AdminSession,
    mut multipart: Multipart,
) -> AppResult<Response> {
    let mut saved = 0usize;

    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some("files") {
            continue;
        }
        let Some(original) = field.file_name().filter(|n| !n.is_empty()).map(str::to_string)
        else {
            continue;
        };
        let data = field.bytes().await?;
        let name = state.cloud.save(&original, &data).await?;
        tracing::info!(file = %name, size = data.len(), "Stored cloud file");
        saved += 1;
    }

    if saved > 0 {
        Ok(redirect_with(
            "/cloud/",
            Flash::info(format!("Uploaded {} file(s).", saved)),
        ))
    } else {
        Ok(Redirect::to("/cloud/").into_response())
    }
}

async fn download(
    State(state): State<AppState>,
    _admin: AdminSession,
    Path(filename): Path<String>,
    request: Request,
) -> AppResult<Response> {
    if state.cloud.resolve(&filename).is_none() {
        return Err(AppError::Forbidden);
    }
    let path = state
        .cloud
        .locate(&filename)
        .await?
        .ok_or(AppError::NotFound)?;

    let mut response = serve_file(&path, request).await;
    let disposition = format!("attachment; filename=\"{}\"", filename.replace('"', "_"));
    let value = HeaderValue::from_str(&disposition)
        .unwrap_or_else(|_| HeaderValue::from_static("attachment"));
    response
        .headers_mut()
        .insert(header::CONTENT_DISPOSITION, value);
    Ok(response)
}

async fn delete_file(
    State(state): State<AppState>,
    _admin: AdminSession,
    Form(form): Form<DeleteForm>,
) -> Response {
    let Some(filename) = form.filename.filter(|f| !f.is_empty()) else {
        return redirect_with("/cloud/", Flash::error("No filename provided"));
    };

    let flash = match state.cloud.delete(&filename).await {
        Ok(true) => {
            tracing::info!(file = %filename, "Deleted cloud file");
            Flash::info("File deleted")
        }
        Ok(false) => Flash::error("File not found"),
        Err(e) => {
            tracing::error!(file = %filename, "Failed to delete cloud file: {}", e);
            Flash::error("Failed to delete file")
        }
    };
    redirect_with("/cloud/", flash)
}
