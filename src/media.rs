use chrono::{DateTime, Local, Utc};
use rand::Rng;
use std::path::{Component, Path, PathBuf};

/// Extensions accepted as post attachments.
pub const POST_MEDIA_EXTENSIONS: &[&str] = &[
    "png", "jpg", "jpeg", "gif", "mp4", "webm", "ogg", "mov", "wav", "mp3", "m4a", "aac", "oga",
];

/// A flat directory of uploaded files stored under generated names.
#[derive(Debug, Clone)]
pub struct MediaStore {
    root: PathBuf,
}

/// A file as listed from the store.
#[derive(Debug, Clone)]
pub struct StoredFile {
    pub name: String,
    pub size: u64,
    pub modified: DateTime<Local>,
}

impl MediaStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Write `bytes` under a fresh unique name derived from `original_name`
    /// and return that name. Creates the directory if needed.
    pub async fn save(&self, original_name: &str, bytes: &[u8]) -> std::io::Result<String> {
        tokio::fs::create_dir_all(&self.root).await?;
        let name = generate_name(original_name);
        tokio::fs::write(self.root.join(&name), bytes).await?;
        tracing::debug!(name = %name, size = bytes.len(), "Stored upload");
        Ok(name)
    }

    /// Map a stored name to its path, refusing anything that is not a
    /// single plain file name inside the store.
    pub fn resolve(&self, name: &str) -> Option<PathBuf> {
        let mut components = Path::new(name).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(part)), None) if part == name && !name.contains('\\') => {
                Some(self.root.join(part))
            }
            _ => None,
        }
    }

    /// Path of an existing stored file, ready to be streamed.
    /// `Ok(None)` when the name is invalid or no such file exists.
    pub async fn locate(&self, name: &str) -> std::io::Result<Option<PathBuf>> {
        let Some(path) = self.resolve(name) else {
            return Ok(None);
        };
        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => Ok(Some(path)),
            Ok(_) => Ok(None),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Remove a stored file. A missing file is not an error; returns
    /// whether something was removed.
    pub async fn delete(&self, name: &str) -> std::io::Result<bool> {
        let Some(path) = self.locate(name).await? else {
            return Ok(false);
        };
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Regular files directly inside the store, most recently modified first.
    pub async fn list(&self) -> std::io::Result<Vec<StoredFile>> {
        let mut entries = tokio::fs::read_dir(&self.root).await?;
        let mut files = Vec::new();

        while let Some(entry) = entries.next_entry().await? {
            let meta = entry.metadata().await?;
            if !meta.is_file() {
                continue;
            }
            let Ok(name) = entry.file_name().into_string() else {
                continue;
            };
            let modified = meta
                .modified()
                .map(DateTime::<Local>::from)
                .unwrap_or_else(|_| Local::now());
            files.push(StoredFile {
                name,
                size: meta.len(),
                modified,
            });
        }

        files.sort_by(|a, b| b.modified.cmp(&a.modified).then_with(|| a.name.cmp(&b.name)));
        Ok(files)
    }
}

/// `<UTC yyyymmddHHMMSS>_<32 hex>_<sanitized original>`
pub fn generate_name(original_name: &str) -> String {
    format!(
        "{}_{}_{}",
        Utc::now().format("%Y%m%d%H%M%S"),
        random_hex(),
        sanitize_filename(original_name)
    )
}

fn random_hex() -> String {
    let bytes: [u8; 16] = rand::thread_rng().gen();
    hex::encode(bytes)
}

/// Reduce a client-supplied file name to a safe ASCII name with no
/// directory part.
pub fn sanitize_filename(original: &str) -> String {
    let base = original
        .rsplit(&['/', '\\'][..])
        .next()
        .unwrap_or_default();

    let joined = base.split_whitespace().collect::<Vec<_>>().join("_");
    let cleaned: String = joined
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(*c, '.' | '_' | '-'))
        .collect();
    let trimmed = cleaned.trim_matches(|c| c == '.' || c == '_');

    if trimmed.is_empty() {
        "file".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Lowercased extension of `name`, if any.
pub fn extension(name: &str) -> Option<String> {
    let (stem, ext) = name.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

pub fn is_allowed_post_media(name: &str) -> bool {
    extension(name).is_some_and(|ext| POST_MEDIA_EXTENSIONS.contains(&ext.as_str()))
}

/// Human-readable byte count.
pub fn format_size(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    if bytes < 1024 {
        return format!("{} B", bytes);
    }
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{:.1} {}", value, UNITS[unit])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> (tempfile::TempDir, MediaStore) {
        let tmp = tempfile::tempdir().unwrap();
        let store = MediaStore::new(tmp.path().join("uploads"));
        (tmp, store)
    }

    #[test]
    fn sanitize_strips_directories_and_unsafe_characters() {
        assert_eq!(sanitize_filename("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_filename("C:\\Users\\me\\cat pic.png"), "cat_pic.png");
        assert_eq!(sanitize_filename("my <photo>!.jpg"), "my_photo.jpg");
        assert_eq!(sanitize_filename("..hidden"), "hidden");
        assert_eq!(sanitize_filename("photo.png"), "photo.png");
    }

    #[test]
    fn sanitize_never_returns_empty() {
        assert_eq!(sanitize_filename(""), "file");
        assert_eq!(sanitize_filename("../.."), "file");
        assert_eq!(sanitize_filename("日本語"), "file");
    }

    #[test]
    fn generated_name_has_timestamp_token_and_original() {
        let name = generate_name("photo.png");
        let parts: Vec<&str> = name.splitn(3, '_').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0].len(), 14);
        assert!(parts[0].chars().all(|c| c.is_ascii_digit()));
        assert_eq!(parts[1].len(), 32);
        assert!(parts[1].chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(parts[2], "photo.png");
        assert!(!name.contains("||"));
    }

    #[test]
    fn resolve_rejects_traversal() {
        let store = MediaStore::new("/srv/uploads");
        assert!(store.resolve("../../etc/passwd").is_none());
        assert!(store.resolve("..").is_none());
        assert!(store.resolve("").is_none());
        assert!(store.resolve("/etc/passwd").is_none());
        assert!(store.resolve("sub/file.png").is_none());
        assert!(store.resolve("..\\secret").is_none());
        assert!(store.resolve("./file.png").is_none());
        assert_eq!(
            store.resolve("file.png"),
            Some(PathBuf::from("/srv/uploads/file.png"))
        );
    }

    #[test]
    fn allowed_post_media_checks_extension() {
        assert!(is_allowed_post_media("a.PNG"));
        assert!(is_allowed_post_media("clip.m4a"));
        assert!(!is_allowed_post_media("notes.txt"));
        assert!(!is_allowed_post_media("png"));
        assert!(!is_allowed_post_media(".png"));
    }

    #[test]
    fn format_size_picks_unit() {
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(2048), "2.0 KB");
        assert_eq!(format_size(5 * 1024 * 1024 + 512 * 1024), "5.5 MB");
    }

    #[tokio::test]
    async fn same_original_name_never_collides() {
        let (_tmp, store) = store();
        let first = store.save("photo.png", b"one").await.unwrap();
        let second = store.save("photo.png", b"two").await.unwrap();
        assert_ne!(first, second);

        let a = store.locate(&first).await.unwrap().unwrap();
        let b = store.locate(&second).await.unwrap().unwrap();
        assert_eq!(std::fs::read(a).unwrap(), b"one");
        assert_eq!(std::fs::read(b).unwrap(), b"two");
    }

    #[tokio::test]
    async fn locate_outside_the_store_fails_closed() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("secret.txt"), b"top secret").unwrap();
        let store = MediaStore::new(tmp.path().join("uploads"));
        store.save("x.png", b"x").await.unwrap();
        std::fs::create_dir(store.root().join("nested")).unwrap();

        assert!(store.locate("../secret.txt").await.unwrap().is_none());
        assert!(store.locate("missing.png").await.unwrap().is_none());
        assert!(store.locate("nested").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let (_tmp, store) = store();
        let name = store.save("doc.pdf", b"pdf").await.unwrap();
        assert!(store.delete(&name).await.unwrap());
        assert!(!store.delete(&name).await.unwrap());
        assert!(!store.delete("../../etc/passwd").await.unwrap());
    }

    #[tokio::test]
    async fn list_skips_directories_and_sorts_newest_first() {
        let (_tmp, store) = store();
        let older = store.save("old.txt", b"12345").await.unwrap();
        let newer = store.save("new.txt", b"1").await.unwrap();
        std::fs::create_dir(store.root().join("nested")).unwrap();

        let past = std::time::SystemTime::now() - std::time::Duration::from_secs(3600);
        std::fs::File::options()
            .write(true)
            .open(store.root().join(&older))
            .unwrap()
            .set_modified(past)
            .unwrap();

        let files = store.list().await.unwrap();
        let names: Vec<&str> = files.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec![newer.as_str(), older.as_str()]);
        assert_eq!(files[1].size, 5);
    }
}
