// DocFly - upload coordination and object storage gateway for the document workspace

pub mod catalog;
pub mod config;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod storage;
pub mod types;
pub mod upload;
pub mod utils;

// Re-exports for convenience
pub use config::Config;
pub use models::AppState;

use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

use crate::catalog::DocumentCatalog;
use crate::config::StorageProvider;
use crate::storage::{MemoryObjectStore, ObjectStore, StorageGateway, SupabaseStorageClient};
use crate::upload::UploadCoordinator;

pub fn create_router(state: AppState) -> axum::Router {
    routes::create_router(state)
}

/// Wires the object store, gateway, coordinator and catalog from `config`.
pub fn build_state(config: Config) -> anyhow::Result<AppState> {
    let store: Arc<dyn ObjectStore> = match config.storage.provider {
        StorageProvider::Supabase => {
            if config.storage.supabase_url.is_empty() {
                anyhow::bail!("SUPABASE_URL must be set when STORAGE_PROVIDER=supabase");
            }
            let key = config
                .storage
                .supabase_service_key
                .as_deref()
                .ok_or_else(|| anyhow::anyhow!("SUPABASE_SERVICE_KEY must be set when STORAGE_PROVIDER=supabase"))?;
            Arc::new(SupabaseStorageClient::new(&config.storage.supabase_url, key))
        }
        StorageProvider::Memory => {
            info!("Using in-memory object store; uploads are lost on restart");
            Arc::new(MemoryObjectStore::new())
        }
    };

    let gateway = Arc::new(StorageGateway::new(store, &config.upload));
    let uploads = UploadCoordinator::new(gateway.clone(), config.upload.clone());

    Ok(AppState {
        config,
        gateway,
        uploads,
        catalog: Arc::new(RwLock::new(DocumentCatalog::with_sample_documents())),
    })
}
