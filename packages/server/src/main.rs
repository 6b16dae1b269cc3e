use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use common::storage::BlobStore;
use common::storage::filesystem::FilesystemBlobStore;
use common::storage::s3::S3BlobStore;
use tracing::{Level, info};

use server::config::{AppConfig, StorageBackend};
use server::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_max_level(Level::INFO).init();

    let config = AppConfig::load().context("failed to load configuration")?;

    let db = server::database::init_db(&config.database.url)
        .await
        .context("failed to initialize database")?;

    let blob_store = build_blob_store(&config).await?;

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("invalid server.host/server.port")?;

    let state = AppState {
        db,
        blob_store,
        config: Arc::new(config),
    };
    let app = server::build_router(state);

    info!("Server running at http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn build_blob_store(config: &AppConfig) -> anyhow::Result<Arc<dyn BlobStore>> {
    match config.storage.backend {
        StorageBackend::Filesystem => {
            let secret = config
                .storage
                .presign_secret
                .as_deref()
                .context("storage.presign_secret is required for the filesystem backend")?;
            let base_url = format!(
                "{}/api/v1/files",
                config.server.public_url.trim_end_matches('/')
            );
            let store = FilesystemBlobStore::new(
                PathBuf::from(&config.storage.root),
                base_url,
                secret.as_bytes().to_vec(),
            )
            .await
            .context("failed to initialize filesystem blob store")?;
            Ok(Arc::new(store))
        }
        StorageBackend::S3 => {
            let s3 = config
                .storage
                .s3
                .as_ref()
                .context("storage.s3 section is required for the s3 backend")?;
            let store = S3BlobStore::new(
                &s3.region,
                s3.endpoint.as_deref(),
                &s3.access_key,
                &s3.secret_key,
            )
            .context("failed to initialize S3 blob store")?;
            Ok(Arc::new(store))
        }
    }
}
