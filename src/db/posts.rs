//! Post persistence: one row per post, attachments in `post_media`.
//!
//! Every function checks a connection out of the pool for the duration of
//! the call only.

use chrono::{Local, NaiveDateTime};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::HashMap;

use crate::db::models::{NewPost, Post};
use crate::error::AppResult;
use crate::state::DbPool;

pub const TIMESTAMP_FORMAT: &str = "%d.%m.%Y %H:%M";

/// Chronological sort key for a `%d.%m.%Y %H:%M` string: yyyymmddHH:MM.
const ORDER_NEWEST_FIRST: &str = "ORDER BY substr(timestamp, 7, 4) || substr(timestamp, 4, 2) \
     || substr(timestamp, 1, 2) || substr(timestamp, 12, 5) DESC, id DESC";

const POST_COLUMNS: &str =
    "id, title, content, timestamp, latitude, longitude, COALESCE(deleted, 0)";

/// Active posts, newest first. A storage failure yields an empty feed.
pub fn list_active(db: &DbPool) -> Vec<Post> {
    try_list_active(db).unwrap_or_else(|e| {
        tracing::error!("Failed to list posts: {}", e);
        Vec::new()
    })
}

pub fn try_list_active(db: &DbPool) -> AppResult<Vec<Post>> {
    let conn = db.get()?;

    let mut posts: Vec<Post> = {
        let sql = format!(
            "SELECT {} FROM posts WHERE COALESCE(deleted, 0) = 0 {}",
            POST_COLUMNS, ORDER_NEWEST_FIRST
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map([], post_from_row)?;
        rows.collect::<Result<_, _>>()?
    };

    let mut media = active_media(&conn)?;
    for post in &mut posts {
        post.media = media.remove(&post.id).unwrap_or_default();
    }

    Ok(posts)
}

/// A single post that has not been deleted.
pub fn get(db: &DbPool, id: i64) -> AppResult<Option<Post>> {
    let conn = db.get()?;
    let sql = format!(
        "SELECT {} FROM posts WHERE id = ?1 AND COALESCE(deleted, 0) = 0",
        POST_COLUMNS
    );
    let post = conn
        .query_row(&sql, params![id], post_from_row)
        .optional()?;

    match post {
        Some(mut post) => {
            post.media = media_for(&conn, id)?;
            Ok(Some(post))
        }
        None => Ok(None),
    }
}

/// Insert a post stamped with the current local time. Returns its id.
pub fn create(db: &DbPool, post: &NewPost) -> AppResult<i64> {
    create_at(db, post, Local::now().naive_local())
}

pub fn create_at(db: &DbPool, post: &NewPost, stamped: NaiveDateTime) -> AppResult<i64> {
    let title = post
        .title
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty());
    let content = post.content.as_deref().unwrap_or("");
    let timestamp = stamped.format(TIMESTAMP_FORMAT).to_string();

    let mut conn = db.get()?;
    let tx = conn.transaction()?;
    tx.execute(
        "INSERT INTO posts (title, content, timestamp, latitude, longitude, deleted)
         VALUES (?1, ?2, ?3, ?4, ?5, 0)",
        params![title, content, timestamp, post.latitude, post.longitude],
    )?;
    let id = tx.last_insert_rowid();

    for (position, name) in post.media.iter().enumerate() {
        tx.execute(
            "INSERT INTO post_media (post_id, position, name) VALUES (?1, ?2, ?3)",
            params![id, position as i64, name],
        )?;
    }
    tx.commit()?;

    tracing::info!(post_id = id, media = post.media.len(), "Created post");
    Ok(id)
}

/// Hide a post from the feed. Rows and files stay; unknown ids are a no-op.
/// Returns whether a visible post was hidden.
pub fn soft_delete(db: &DbPool, id: i64) -> AppResult<bool> {
    let conn = db.get()?;
    let changed = conn.execute(
        "UPDATE posts SET deleted = 1 WHERE id = ?1 AND COALESCE(deleted, 0) = 0",
        params![id],
    )?;
    if changed > 0 {
        tracing::info!(post_id = id, "Soft-deleted post");
    }
    Ok(changed > 0)
}

/// Permanently remove every soft-deleted post. Returns the media names
/// that belonged to them so the caller can remove the files.
pub fn purge_deleted(db: &DbPool) -> AppResult<PurgeReport> {
    let mut conn = db.get()?;
    let tx = conn.transaction()?;

    let media: Vec<String> = {
        let mut stmt = tx.prepare(
            "SELECT pm.name FROM post_media pm
             JOIN posts p ON p.id = pm.post_id
             WHERE COALESCE(p.deleted, 0) = 1
             ORDER BY pm.post_id, pm.position",
        )?;
        let names = stmt.query_map([], |row| row.get(0))?;
        names.collect::<Result<_, _>>()?
    };

    tx.execute(
        "DELETE FROM post_media WHERE post_id IN
         (SELECT id FROM posts WHERE COALESCE(deleted, 0) = 1)",
        [],
    )?;
    let posts = tx.execute("DELETE FROM posts WHERE COALESCE(deleted, 0) = 1", [])?;
    tx.commit()?;

    Ok(PurgeReport { posts, media })
}

#[derive(Debug, Default, PartialEq)]
pub struct PurgeReport {
    pub posts: usize,
    pub media: Vec<String>,
}

fn post_from_row(row: &Row<'_>) -> rusqlite::Result<Post> {
    Ok(Post {
        id: row.get(0)?,
        title: row.get(1)?,
        content: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
        timestamp: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
        media: Vec::new(),
        latitude: row.get(4)?,
        longitude: row.get(5)?,
        deleted: row.get(6)?,
    })
}

fn active_media(conn: &Connection) -> rusqlite::Result<HashMap<i64, Vec<String>>> {
    let mut stmt = conn.prepare(
        "SELECT pm.post_id, pm.name FROM post_media pm
         JOIN posts p ON p.id = pm.post_id
         WHERE COALESCE(p.deleted, 0) = 0
         ORDER BY pm.post_id, pm.position",
    )?;
    let rows = stmt.query_map([], |row| Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?)))?;

    let mut media: HashMap<i64, Vec<String>> = HashMap::new();
    for row in rows {
        let (post_id, name) = row?;
        media.entry(post_id).or_default().push(name);
    }
    Ok(media)
}

fn media_for(conn: &Connection, post_id: i64) -> rusqlite::Result<Vec<String>> {
    let mut stmt =
        conn.prepare("SELECT name FROM post_media WHERE post_id = ?1 ORDER BY position")?;
    let names = stmt.query_map(params![post_id], |row| row.get(0))?;
    names.collect()
}
