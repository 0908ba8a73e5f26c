//! # attachment-api — Binary Entry Point
//!
//! Reads configuration from the environment, connects the storage backend,
//! federation collaborators and metadata store, and serves the API.

use std::sync::Arc;

use attachment_api::db::memory::MemoryAttachmentStore;
use attachment_api::db::postgres::PgAttachmentStore;
use attachment_api::db::AttachmentStore;
use attachment_api::state::{AppConfig, AppState};
use attachment_federation::{Federation, FederationConfig};
use attachment_storage::StorageConfig;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let config = AppConfig::from_env()?;

    let storage = attachment_storage::connect(StorageConfig::from_env()?)
        .await
        .map_err(|e| {
            tracing::error!("Storage initialization failed: {e}");
            e
        })?;

    let federation = Federation::from_config(&FederationConfig::from_env()?)?;

    let metadata: Arc<dyn AttachmentStore> = match attachment_api::db::init_pool().await {
        Ok(Some(pool)) => Arc::new(PgAttachmentStore::new(pool)),
        Ok(None) => Arc::new(MemoryAttachmentStore::new()),
        Err(e) => {
            tracing::error!("Database initialization failed: {e}");
            return Err(e.into());
        }
    };

    let port = config.port;
    let state = AppState::new(config, metadata, storage, federation);
    let app = attachment_api::app(state);

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Attachment API listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// `RUST_LOG` wins; otherwise `LOG_LEVEL`, otherwise `info`.
/// `LOG_FORMAT=json` switches to JSON lines.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()))
    });
    let json = std::env::var("LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json"));

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}
