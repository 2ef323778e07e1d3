use askama::Template;
use axum::extract::{Multipart, Path, Request, State};
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use axum::Router;

use crate::db::models::{NewPost, Post};
use crate::db::posts;
use crate::error::{AppError, AppResult};
use crate::extractors::{AdminSession, IncomingFlash, MaybeAdmin};
use crate::flash::{redirect_with, Flash};
use crate::media::{extension, is_allowed_post_media, sanitize_filename};
use crate::render;
use crate::routes::pages::{consume_flash, serve_file, Html};
use crate::state::AppState;

// --- View structs ---

pub struct PostView {
    pub id: i64,
    pub title: Option<String>,
    pub timestamp: String,
    pub body_html: String,
    pub media: Vec<MediaView>,
    pub coordinates: Option<String>,
}

impl From<Post> for PostView {
    fn from(post: Post) -> Self {
        let coordinates = match (post.latitude, post.longitude) {
            (Some(lat), Some(lon)) => Some(format!("{:.5}, {:.5}", lat, lon)),
            _ => None,
        };
        PostView {
            id: post.id,
            title: post.title,
            timestamp: post.timestamp,
            body_html: render::render(&post.content),
            media: post.media.into_iter().map(MediaView::new).collect(),
            coordinates,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Video,
    Audio,
    Other,
}

impl MediaKind {
    pub fn of(name: &str) -> Self {
        match extension(name).as_deref() {
            Some("png" | "jpg" | "jpeg" | "gif") => MediaKind::Image,
            Some("mp4" | "webm" | "mov") => MediaKind::Video,
            Some("wav" | "mp3" | "m4a" | "aac" | "ogg" | "oga") => MediaKind::Audio,
            _ => MediaKind::Other,
        }
    }
}

pub struct MediaView {
    pub name: String,
    pub url: String,
    pub kind: MediaKind,
}

impl MediaView {
    fn new(name: String) -> Self {
        Self {
            url: format!("/blog/uploads/{}", name),
            kind: MediaKind::of(&name),
            name,
        }
    }

    pub fn is_image(&self) -> bool {
        self.kind == MediaKind::Image
    }

    pub fn is_video(&self) -> bool {
        self.kind == MediaKind::Video
    }

    pub fn is_audio(&self) -> bool {
        self.kind == MediaKind::Audio
    }
}

// --- Templates ---

#[derive(Template)]
#[template(path = "pages/feed.html")]
pub struct FeedTemplate {
    pub posts: Vec<PostView>,
    pub flash: Option<Flash>,
    pub is_admin: bool,
}

#[derive(Template)]
#[template(path = "pages/new_post.html")]
pub struct NewPostTemplate {
    pub title: String,
    pub content: String,
    pub latitude: String,
    pub longitude: String,
    pub flash: Option<Flash>,
    pub is_admin: bool,
}

// --- Forms ---

/// Text fields of the multipart new-post form.
#[derive(Debug, Default)]
struct NewPostForm {
    title: String,
    content: String,
    latitude: String,
    longitude: String,
}

// --- Router ---

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/blog", get(|| async { Redirect::permanent("/blog/") }))
        .route("/blog/", get(list_posts))
        .route("/blog/uploads/{*filename}", get(uploaded_file))
        .route("/blog/new", get(new_post_form).post(create_post))
        .route("/blog/purge", post(purge))
        .route("/blog/{id}/delete", post(delete_post))
}

// --- Handlers ---

async fn list_posts(
    State(state): State<AppState>,
    MaybeAdmin(is_admin): MaybeAdmin,
    flash: IncomingFlash,
) -> Response {
    let posts = posts::list_active(&state.db)
        .into_iter()
        .map(PostView::from)
        .collect();

    let page = FeedTemplate {
        posts,
        flash: flash.0.clone(),
        is_admin,
    };
    consume_flash(page, &flash)
}

async fn uploaded_file(
    State(state): State<AppState>,
    Path(filename): Path<String>,
    request: Request,
) -> AppResult<Response> {
    if state.media.resolve(&filename).is_none() {
        return Err(AppError::Forbidden);
    }
    let path = state
        .media
        .locate(&filename)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(serve_file(&path, request).await)
}

async fn new_post_form(_admin: AdminSession, flash: IncomingFlash) -> Response {
    let page = NewPostTemplate {
        title: String::new(),
        content: String::new(),
        latitude: String::new(),
        longitude: String::new(),
        flash: flash.0.clone(),
        is_admin: true,
    };
    consume_flash(page, &flash)
}

async fn create_post(
    State(state): State<AppState>,
    _admin: AdminSession,
    mut multipart: Multipart,
) -> AppResult<Response> {
    let mut form = NewPostForm::default();
    let mut media = Vec::new();

    while let Some(field) = multipart.next_field().await? {
        let field_name = field.name().unwrap_or_default().to_string();
        match field_name.as_str() {
            "media" => {
                let Some(original) = field.file_name().filter(|n| !n.is_empty()) else {
                    continue;
                };
                let safe_name = sanitize_filename(original);
                if !is_allowed_post_media(&safe_name) {
                    tracing::info!(file = %safe_name, "Skipping upload with unsupported extension");
                    continue;
                }
                let data = field.bytes().await?;
                media.push(state.media.save(&safe_name, &data).await?);
            }
            "title" => form.title = field.text().await?,
            "content" => form.content = field.text().await?,
            "latitude" => form.latitude = field.text().await?,
            "longitude" => form.longitude = field.text().await?,
            _ => {}
        }
    }

    let new_post = NewPost {
        title: Some(form.title.clone()),
        content: Some(form.content.trim().to_string()),
        media,
        latitude: parse_coordinate(&form.latitude),
        longitude: parse_coordinate(&form.longitude),
    };

    match posts::create(&state.db, &new_post) {
        Ok(_) => Ok(redirect_with("/blog/", Flash::info("Post created"))),
        Err(e) => {
            tracing::error!("Failed to create post: {}", e);
            for name in &new_post.media {
                if let Err(e) = state.media.delete(name).await {
                    tracing::warn!(file = %name, "Could not remove orphaned upload: {}", e);
                }
            }
            let page = NewPostTemplate {
                title: form.title,
                content: form.content,
                latitude: form.latitude,
                longitude: form.longitude,
                flash: Some(Flash::error("Failed to create post")),
                is_admin: true,
            };
            Ok(Html(page).into_response())
        }
    }
}

async fn delete_post(
    State(state): State<AppState>,
    _admin: AdminSession,
    Path(id): Path<String>,
) -> AppResult<Response> {
    let id: i64 = id.parse().map_err(|_| AppError::NotFound)?;

    let flash = match posts::soft_delete(&state.db, id) {
        Ok(_) => Flash::info("Post deleted"),
        Err(e) => {
            tracing::error!(post_id = id, "Failed to delete post: {}", e);
            Flash::error("Failed to delete post")
        }
    };
    Ok(redirect_with("/blog/", flash))
}

async fn purge(State(state): State<AppState>, _admin: AdminSession) -> Response {
    let report = match posts::purge_deleted(&state.db) {
        Ok(report) => report,
        Err(e) => {
            tracing::error!("Failed to purge deleted posts: {}", e);
            return redirect_with("/blog/", Flash::error("Failed to purge deleted posts"));
        }
    };

    for name in &report.media {
        if let Err(e) = state.media.delete(name).await {
            tracing::warn!(file = %name, "Could not remove purged media: {}", e);
        }
    }

    tracing::info!(posts = report.posts, files = report.media.len(), "Purged deleted posts");
    redirect_with(
        "/blog/",
        Flash::info(format!("Purged {} deleted post(s)", report.posts)),
    )
}

/// Absent, unparseable and non-finite input all mean "no coordinate".
fn parse_coordinate(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

// --- Tests ---
