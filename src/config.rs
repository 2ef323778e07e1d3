use clap::Parser;
use serde::Deserialize;
use std::path::{Path, PathBuf};

pub const DEFAULT_SECRET_KEY: &str = "dev-secret-key";
pub const DEFAULT_ADMIN_PASSWORD: &str = "change";

#[derive(Parser, Debug, Default)]
#[command(name = "jotter", about = "A minimal personal publishing platform")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Host to bind to
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Directory holding the database, uploads and cloud folder
    #[arg(long)]
    pub instance_dir: Option<PathBuf>,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub auth: AuthConfig,
    pub storage: StorageConfig,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Largest accepted request body, in bytes
    pub max_content_length: usize,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct AuthConfig {
    pub secret_key: String,
    pub admin_password: String,
    pub cookie_name: String,
    pub session_hours: u64,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct StorageConfig {
    pub database: Option<PathBuf>,
    pub uploads: Option<PathBuf>,
    pub cloud: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            max_content_length: 50 * 1024 * 1024,
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            secret_key: DEFAULT_SECRET_KEY.to_string(),
            admin_password: DEFAULT_ADMIN_PASSWORD.to_string(),
            cookie_name: "jotter_session".to_string(),
            session_hours: 12,
        }
    }
}

impl Config {
    /// Load configuration from the process environment.
    pub fn load(cli: &Cli) -> anyhow::Result<Self> {
        Self::load_with(cli, |key| std::env::var(key).ok())
    }

    /// Layering, lowest to highest: defaults, TOML file, environment, CLI.
    pub fn load_with<F>(cli: &Cli, env: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let instance_dir = Self::instance_dir(cli);
        let config_path = cli
            .config
            .clone()
            .or_else(|| env("APP_CONFIG_FILE").map(PathBuf::from))
            .unwrap_or_else(|| instance_dir.join("config.toml"));

        let mut config = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            toml::from_str(&content)?
        } else {
            Config::default()
        };

        config.apply_env(env)?;

        // CLI overrides
        if let Some(ref host) = cli.host {
            config.server.host = host.clone();
        }
        if let Some(port) = cli.port {
            config.server.port = port;
        }

        // Defaults and relative paths live under the instance dir
        let storage = &mut config.storage;
        for (slot, default) in [
            (&mut storage.database, "blog.db"),
            (&mut storage.uploads, "uploads"),
            (&mut storage.cloud, "cloud"),
        ] {
            let path = slot.take().unwrap_or_else(|| PathBuf::from(default));
            *slot = Some(if path.is_relative() {
                instance_dir.join(path)
            } else {
                path
            });
        }

        if config.uploads_path() == config.cloud_path() {
            anyhow::bail!(
                "upload and cloud folders must differ (both are {})",
                config.uploads_path().display()
            );
        }

        Ok(config)
    }

    fn apply_env<F>(&mut self, env: F) -> anyhow::Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(secret) = env("SECRET_KEY") {
            self.auth.secret_key = secret;
        }
        if let Some(password) = env("ADMIN_PASSWORD") {
            self.auth.admin_password = password;
        }
        if let Some(raw) = env("MAX_CONTENT_LENGTH") {
            self.server.max_content_length = raw
                .trim()
                .parse()
                .map_err(|e| anyhow::anyhow!("invalid MAX_CONTENT_LENGTH {:?}: {}", raw, e))?;
        }
        if let Some(path) = env("DATABASE_PATH") {
            self.storage.database = Some(PathBuf::from(path));
        }
        if let Some(path) = env("UPLOAD_FOLDER") {
            self.storage.uploads = Some(PathBuf::from(path));
        }
        if let Some(path) = env("CLOUD_FOLDER") {
            self.storage.cloud = Some(PathBuf::from(path));
        }
        Ok(())
    }

    pub fn instance_dir(cli: &Cli) -> PathBuf {
        cli.instance_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from("instance"))
    }

    /// Build a config rooted entirely inside `dir`, for tests and tooling.
    pub fn for_instance(dir: &Path) -> Self {
        let mut config = Config::default();
        config.storage.database = Some(dir.join("blog.db"));
        config.storage.uploads = Some(dir.join("uploads"));
        config.storage.cloud = Some(dir.join("cloud"));
        config
    }

    pub fn db_path(&self) -> &Path {
        self.storage.database.as_deref().unwrap_or(Path::new("instance/blog.db"))
    }

    pub fn uploads_path(&self) -> &Path {
        self.storage.uploads.as_deref().unwrap_or(Path::new("instance/uploads"))
    }

    pub fn cloud_path(&self) -> &Path {
        self.storage.cloud.as_deref().unwrap_or(Path::new("instance/cloud"))
    }

    pub fn uses_default_credentials(&self) -> bool {
        self.auth.secret_key == DEFAULT_SECRET_KEY
            || self.auth.admin_password == DEFAULT_ADMIN_PASSWORD
    }
}
