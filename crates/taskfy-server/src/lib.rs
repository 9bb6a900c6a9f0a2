pub mod config;
mod routes;
#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers;

use std::sync::Arc;

use anyhow::Result;
use taskfy_db::DbConfig;
use taskfy_service::{DocumentService, DocumentSettings, FileService, FileSettings};
use taskfy_store::StoreConfig;
use tokio::net::TcpListener;

use config::ServerConfig;

pub use routes::{build_router, AppState, InnerAppState};

/// Open the object store and file settings from the environment.
pub fn open_files(config: &ServerConfig) -> Result<FileService> {
    let mut store_config = StoreConfig::from_env();
    store_config.public_url = Some(config.public_url());
    let store = taskfy_store::create_store(&store_config)?;

    let mut settings = FileSettings::from_env();
    settings.url_expiry = config.url_expiry();
    if settings.project_prefix.is_none() {
        tracing::warn!("TASKFY_PROJECT_PREFIX is not set; file routes will answer 500");
    }
    Ok(FileService::new(store, settings))
}

/// Open every backend named by the environment and build the shared state.
pub async fn connect(config: &ServerConfig) -> Result<AppState> {
    let db = taskfy_db::open_database(&DbConfig::from_env()).await?;
    let documents = DocumentService::new(db, DocumentSettings::from_env());
    if documents.settings().database.is_none() {
        tracing::warn!("TASKFY_DATABASE is not set; document routes will answer 500");
    }

    Ok(Arc::new(InnerAppState {
        documents,
        files: open_files(config)?,
        max_upload_bytes: config.max_upload_bytes,
    }))
}

pub async fn serve(listener: TcpListener, state: AppState) -> Result<()> {
    let app = build_router(state);
    axum::serve(listener, app).await?;
    Ok(())
}
