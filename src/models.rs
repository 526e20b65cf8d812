use bytes::Bytes;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::catalog::{DocumentCatalog, DocumentRecord, ViewMode};
use crate::config::Config;
use crate::storage::StorageGateway;
use crate::upload::UploadCoordinator;

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub gateway: Arc<StorageGateway>,
    pub uploads: UploadCoordinator,
    pub catalog: Arc<RwLock<DocumentCatalog>>,
}

/// A file received from the client, not yet stored.
#[derive(Debug, Clone)]
pub struct FileUpload {
    pub filename: String,
    pub content_type: Option<String>,
    pub data: Bytes,
}

impl FileUpload {
    pub fn new(filename: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            filename: filename.into(),
            content_type: None,
            data: data.into(),
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn size_bytes(&self) -> u64 {
        self.data.len() as u64
    }
}

// API Request/Response types

#[derive(Debug, serde::Serialize, serde::Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
    pub storage: String,
}

/// What the file picker needs to know before a batch is sent.
#[derive(Debug, serde::Serialize, serde::Deserialize)]
pub struct UploadConfigResponse {
    pub max_files: usize,
    pub size_limit_bytes: u64,
    pub accept: String,
}

/// Partial update of the catalog preferences; absent fields are left alone.
#[derive(Debug, Default, serde::Serialize, serde::Deserialize)]
pub struct DocumentPreferences {
    pub view_mode: Option<ViewMode>,
    pub search_query: Option<String>,
}

#[derive(Debug, serde::Serialize, serde::Deserialize)]
pub struct DocumentsResponse {
    pub view_mode: ViewMode,
    pub search_query: String,
    pub documents: Vec<DocumentRecord>,
}

impl From<&DocumentCatalog> for DocumentsResponse {
    fn from(catalog: &DocumentCatalog) -> Self {
        Self {
            view_mode: catalog.view_mode(),
            search_query: catalog.search_query().to_string(),
            documents: catalog.documents().to_vec(),
        }
    }
}
