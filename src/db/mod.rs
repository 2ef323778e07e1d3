pub mod models;
pub mod posts;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, Connection};
use std::collections::HashSet;
use std::path::Path;

use crate::state::DbPool;

pub const MIGRATIONS: &[(&str, &str)] = &[
    ("001_posts", include_str!("../../migrations/001_posts.sql")),
    (
        "002_post_media",
        include_str!("../../migrations/002_post_media.sql"),
    ),
];

/// Columns added to `posts` after the first release. Databases created by
/// older builds are upgraded in place by probing for them.
const LATE_POST_COLUMNS: &[(&str, &str)] = &[
    ("latitude", "REAL"),
    ("longitude", "REAL"),
    ("deleted", "INTEGER DEFAULT 0"),
];

/// Legacy separator for the `posts.media` column.
pub const LEGACY_MEDIA_DELIMITER: &str = "||";

pub fn create_pool(db_path: &Path) -> anyhow::Result<DbPool> {
    // Ensure parent directory exists
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let manager = SqliteConnectionManager::file(db_path).with_init(|conn| {
        conn.execute_batch(
            "
            PRAGMA foreign_keys = ON;
            PRAGMA busy_timeout = 5000;
            ",
        )
    });
    let pool = Pool::builder().max_size(8).build(manager)?;

    let conn = pool.get()?;
    conn.execute_batch(
        "
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        ",
    )?;

    Ok(pool)
}

pub fn run_migrations(pool: &DbPool) -> anyhow::Result<()> {
    let conn = pool.get()?;
    ensure_schema(&conn)?;
    tracing::info!("Database migrations complete");
    Ok(())
}

/// Bring the schema up to date. Safe to call repeatedly; never drops data.
pub fn ensure_schema(conn: &Connection) -> anyhow::Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            name TEXT PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );",
    )?;

    for (name, sql) in MIGRATIONS {
        let already_applied: bool = conn.query_row(
            "SELECT COUNT(*) > 0 FROM schema_version WHERE name = ?1",
            params![name],
            |row| row.get(0),
        )?;

        if !already_applied {
            tracing::info!("Applying migration: {}", name);
            conn.execute_batch(sql)?;
            after_migration(conn, name)?;
            conn.execute(
                "INSERT INTO schema_version (name) VALUES (?1)",
                params![name],
            )?;
        }

        // CREATE TABLE IF NOT EXISTS leaves a legacy posts table untouched
        if *name == "001_posts" {
            add_missing_post_columns(conn)?;
        }
    }

    Ok(())
}

fn after_migration(conn: &Connection, name: &str) -> anyhow::Result<()> {
    if name == "002_post_media" {
        let moved = backfill_legacy_media(conn)?;
        if moved > 0 {
            tracing::info!("Moved {} legacy media references into post_media", moved);
        }
    }
    Ok(())
}

fn add_missing_post_columns(conn: &Connection) -> rusqlite::Result<()> {
    let existing: HashSet<String> = {
        let mut stmt = conn.prepare("PRAGMA table_info(posts)")?;
        let names: HashSet<String> = stmt
            .query_map([], |row| row.get::<_, String>(1))?
            .filter_map(|r| r.ok())
            .collect();
        names
    };

    for (column, decl) in LATE_POST_COLUMNS {
        if existing.contains(*column) {
            continue;
        }
        let sql = format!("ALTER TABLE posts ADD COLUMN {} {}", column, decl);
        match conn.execute_batch(&sql) {
            Ok(()) => tracing::info!("Added posts.{} column", column),
            // Someone else may have added it in the meantime
            Err(e) => tracing::warn!("Could not add posts.{} column: {}", column, e),
        }
    }

    Ok(())
}

/// Copy `||`-joined names from the legacy `posts.media` column into rows
/// of `post_media`. Returns the number of references moved.
fn backfill_legacy_media(conn: &Connection) -> rusqlite::Result<usize> {
    let legacy: Vec<(i64, String)> = {
        let mut stmt = conn.prepare(
            "SELECT id, media FROM posts WHERE media IS NOT NULL AND media != ''",
        )?;
        let rows: Vec<(i64, String)> = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .filter_map(|r| r.ok())
            .collect();
        rows
    };

    let mut moved = 0;
    for (post_id, joined) in legacy {
        let names = joined
            .split(LEGACY_MEDIA_DELIMITER)
            .filter(|name| !name.is_empty());
        for (position, name) in names.enumerate() {
            moved += conn.execute(
                "INSERT OR IGNORE INTO post_media (post_id, position, name) VALUES (?1, ?2, ?3)",
                params![post_id, position as i64, name],
            )?;
        }
    }

    Ok(moved)
}

#[cfg(test)]
pub(crate) fn test_pool() -> DbPool {
    let manager = SqliteConnectionManager::memory()
        .with_init(|conn| conn.execute_batch("PRAGMA foreign_keys = ON;"));
    let pool = Pool::builder().max_size(1).build(manager).unwrap();
    run_migrations(&pool).unwrap();
    pool
}

#[cfg(test)]
mod tests {
    use super::*;

    fn column_names(conn: &Connection) -> Vec<String> {
        let mut stmt = conn.prepare("PRAGMA table_info(posts)").unwrap();
        stmt.query_map([], |row| row.get(1))
            .unwrap()
            .filter_map(|r| r.ok())
            .collect()
    }

    #[test]
    fn create_pool_creates_db_file() {
        let tmp = tempfile::tempdir().unwrap();
        let db_path = tmp.path().join("sub/dir/blog.db");
        let pool = create_pool(&db_path).unwrap();
        assert!(db_path.exists());
        let conn = pool.get().unwrap();
        let mode: String = conn
            .query_row("PRAGMA journal_mode", [], |row| row.get(0))
            .unwrap();
        assert_eq!(mode, "wal");
    }

    #[test]
    fn migrations_run_successfully() {
        let pool = test_pool();
        let conn = pool.get().unwrap();

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM schema_version", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, MIGRATIONS.len() as i64);

        let columns = column_names(&conn);
        for column in ["id", "title", "content", "timestamp", "latitude", "longitude", "deleted"] {
            assert!(columns.contains(&column.to_string()), "missing {}", column);
        }
    }

    #[test]
    fn ensure_schema_is_idempotent() {
        let pool = test_pool();
        let conn = pool.get().unwrap();
        ensure_schema(&conn).unwrap();
        ensure_schema(&conn).unwrap();

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM schema_version", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, MIGRATIONS.len() as i64);
    }

    #[test]
    fn legacy_database_is_upgraded_without_data_loss() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE posts (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                title TEXT,
                content TEXT,
                timestamp DATETIME,
                media TEXT
            );
            INSERT INTO posts (title, content, timestamp, media)
                VALUES ('old', 'body', '01.02.2024 10:00', 'a.png||b.mp4');
            INSERT INTO posts (title, content, timestamp, media)
                VALUES (NULL, 'text only', '02.02.2024 10:00', NULL);",
        )
        .unwrap();

        ensure_schema(&conn).unwrap();

        let columns = column_names(&conn);
        assert!(columns.contains(&"latitude".to_string()));
        assert!(columns.contains(&"longitude".to_string()));
        assert!(columns.contains(&"deleted".to_string()));

        let deleted: i64 = conn
            .query_row("SELECT deleted FROM posts WHERE title = 'old'", [], |r| r.get(0))
            .unwrap();
        assert_eq!(deleted, 0);

        let names: Vec<String> = {
            let mut stmt = conn
                .prepare("SELECT name FROM post_media ORDER BY position")
                .unwrap();
            stmt.query_map([], |r| r.get(0))
                .unwrap()
                .filter_map(|r| r.ok())
                .collect()
        };
        assert_eq!(names, vec!["a.png", "b.mp4"]);

        let total: i64 = conn
            .query_row("SELECT COUNT(*) FROM posts", [], |r| r.get(0))
            .unwrap();
        assert_eq!(total, 2);
    }

    #[test]
    fn backfill_runs_only_once() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE posts (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                title TEXT, content TEXT, timestamp DATETIME, media TEXT
            );
            INSERT INTO posts (content, timestamp, media) VALUES ('x', '01.01.2024 00:00', 'a.png');",
        )
        .unwrap();

        ensure_schema(&conn).unwrap();
        conn.execute("DELETE FROM post_media", []).unwrap();
        ensure_schema(&conn).unwrap();

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM post_media", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }
}
