use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct CorsConfig {
    pub allow_origins: Vec<String>,
    pub max_age: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// External base URL used to build presigned download links.
    pub public_url: String,
    pub cors: CorsConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Filesystem,
    S3,
}

#[derive(Debug, Deserialize, Clone)]
pub struct S3Config {
    pub region: String,
    /// Custom endpoint for S3-compatible stores (MinIO); omit for AWS.
    pub endpoint: Option<String>,
    pub access_key: String,
    pub secret_key: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// Root directory for the filesystem backend.
    pub root: String,
    /// Secret signing presigned download tokens (filesystem backend).
    pub presign_secret: Option<String>,
    pub scripts_bucket: String,
    pub downloads_bucket: String,
    /// Maximum accepted manuscript upload size in bytes.
    pub max_script_size: u64,
    pub s3: Option<S3Config>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DeliveryConfig {
    /// TTL for presigned download URLs and their temporary artifacts.
    pub download_ttl_secs: u64,
    /// Page bound for derived perusal copies.
    pub perusal_max_pages: u32,
    /// Lifetime of an approved perusal request, in days.
    pub perusal_expiry_days: i64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub storage: StorageConfig,
    pub delivery: DeliveryConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        let s = Config::builder()
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 3000)?
            .set_default("server.public_url", "http://127.0.0.1:3000")?
            .set_default("server.cors.allow_origins", Vec::<String>::new())?
            .set_default("server.cors.max_age", 3600)?
            .set_default("storage.backend", "filesystem")?
            .set_default("storage.root", "./data/blobs")?
            .set_default("storage.scripts_bucket", "scripts")?
            .set_default("storage.downloads_bucket", "downloads")?
            .set_default("storage.max_script_size", 64 * 1024 * 1024)?
            .set_default("delivery.download_ttl_secs", 3600)?
            .set_default("delivery.perusal_max_pages", 10)?
            .set_default("delivery.perusal_expiry_days", 7)?
            // Load from config/config.toml
            .add_source(File::with_name("config/config").required(false))
            // Override from environment (e.g., STAGEDOOR__AUTH__JWT_SECRET)
            .add_source(Environment::with_prefix("STAGEDOOR").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}
