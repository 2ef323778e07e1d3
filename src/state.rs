use std::sync::Arc;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;

use crate::auth::SessionSigner;
use crate::config::Config;
use crate::media::MediaStore;

pub type DbPool = Pool<SqliteConnectionManager>;

#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    pub config: Config,
    /// Post attachments, served publicly under /blog/uploads
    pub media: MediaStore,
    /// Private file drop behind the admin gate
    pub cloud: MediaStore,
    pub sessions: Arc<SessionSigner>,
}

impl AppState {
    /// Wire up stores and the session signer from a loaded config.
    /// The database must already be migrated.
    pub fn new(db: DbPool, config: Config) -> Self {
        let media = MediaStore::new(config.uploads_path());
        let cloud = MediaStore::new(config.cloud_path());
        let sessions = Arc::new(SessionSigner::new(
            &config.auth.secret_key,
            config.auth.session_hours,
        ));
        Self {
            db,
            config,
            media,
            cloud,
            sessions,
        }
    }
}
