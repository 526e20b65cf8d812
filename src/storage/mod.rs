//! Storage Gateway
//!
//! Translates application intents into calls against a remote object store:
//! - `ensure_ready` - make sure the documents bucket exists
//! - `store` - upload one file under the owner's prefix
//! - `remove` - delete one object
//!
//! Every call is a single attempt. Failures are returned to the caller and
//! never retried here.

pub mod memory;
pub mod supabase_client;

pub use memory::MemoryObjectStore;
pub use supabase_client::SupabaseStorageClient;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::UploadSettings;
use crate::models::FileUpload;
use crate::types::OwnerId;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    #[error("Storage request failed: {cause}")]
    Remote { cause: String },

    #[error("Not authenticated")]
    NotAuthenticated,
}

impl StorageError {
    pub fn remote(cause: impl std::fmt::Display) -> Self {
        StorageError::Remote { cause: cause.to_string() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketInfo {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub public: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BucketOptions {
    pub public: bool,
    pub file_size_limit: u64,
}

/// Where a stored file lives and how clients can reach it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredObjectReference {
    pub path: String,
    pub public_url: String,
}

/// Operations the remote object store exposes.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn list_buckets(&self) -> Result<Vec<BucketInfo>, StorageError>;

    async fn create_bucket(&self, name: &str, options: BucketOptions) -> Result<(), StorageError>;

    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        data: Bytes,
        content_type: &str,
    ) -> Result<(), StorageError>;

    fn public_url(&self, bucket: &str, path: &str) -> String;

    async fn remove(&self, bucket: &str, paths: &[String]) -> Result<(), StorageError>;
}

pub struct StorageGateway {
    store: Arc<dyn ObjectStore>,
    bucket: String,
    size_limit_bytes: u64,
    last_timestamp: AtomicI64,
}

impl StorageGateway {
    pub fn new(store: Arc<dyn ObjectStore>, settings: &UploadSettings) -> Self {
        Self {
            store,
            bucket: settings.bucket_name.clone(),
            size_limit_bytes: settings.size_limit_bytes,
            last_timestamp: AtomicI64::new(0),
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Whether the configured bucket exists. Read only.
    pub async fn bucket_exists(&self) -> Result<bool, StorageError> {
        let buckets = self
            .store
            .list_buckets()
            .await
            .map_err(|e| StorageError::Unavailable(e.to_string()))?;
        Ok(buckets.iter().any(|b| b.name == self.bucket))
    }

    /// Creates the private bucket when it does not exist yet.
    pub async fn ensure_ready(&self) -> Result<(), StorageError> {
        if self.bucket_exists().await? {
            debug!(bucket = %self.bucket, "Storage bucket already exists");
            return Ok(());
        }

        let options = BucketOptions {
            public: false,
            file_size_limit: self.size_limit_bytes,
        };
        self.store
            .create_bucket(&self.bucket, options)
            .await
            .map_err(|e| {
                warn!(bucket = %self.bucket, error = %e, "Failed to create storage bucket");
                StorageError::Unavailable(e.to_string())
            })?;

        info!(bucket = %self.bucket, size_limit = self.size_limit_bytes, "Created storage bucket");
        Ok(())
    }

    /// Uploads `file` to `{owner}/{unix_millis}.{ext}` and resolves its public URL.
    pub async fn store(
        &self,
        file: &FileUpload,
        owner: &OwnerId,
    ) -> Result<StoredObjectReference, StorageError> {
        let path = object_path(owner, self.next_timestamp(), &file.filename);
        let content_type = file
            .content_type
            .clone()
            .unwrap_or_else(|| mime_guess::from_path(&file.filename).first_or_octet_stream().to_string());

        debug!(path = %path, size = file.data.len(), "Uploading object");
        self.store
            .upload(&self.bucket, &path, file.data.clone(), &content_type)
            .await
            .map_err(|e| {
                warn!(path = %path, error = %e, "Upload failed");
                into_remote(e)
            })?;

        let public_url = self.store.public_url(&self.bucket, &path);
        info!(path = %path, "Stored object");
        Ok(StoredObjectReference { path, public_url })
    }

    pub async fn remove(&self, path: &str) -> Result<(), StorageError> {
        self.store
            .remove(&self.bucket, &[path.to_string()])
            .await
            .map_err(|e| {
                warn!(path = %path, error = %e, "Delete failed");
                into_remote(e)
            })?;
        info!(path = %path, "Removed object");
        Ok(())
    }

    /// Millisecond timestamps, strictly increasing per gateway so that files
    /// stored within the same millisecond still get distinct paths.
    fn next_timestamp(&self) -> i64 {
        let now = Utc::now().timestamp_millis();
        match self
            .last_timestamp
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |prev| Some(now.max(prev + 1)))
        {
            Ok(prev) | Err(prev) => now.max(prev + 1),
        }
    }
}

fn into_remote(err: StorageError) -> StorageError {
    match err {
        StorageError::Unavailable(cause) => StorageError::Remote { cause },
        other => other,
    }
}

/// Builds the object key. The extension is whatever follows the last `.`,
/// kept only when it is plain alphanumeric; anything else gets no suffix so
/// the key never carries `/`, `#` or `?` from the client's file name.
pub fn object_path(owner: &OwnerId, timestamp_millis: i64, file_name: &str) -> String {
    match file_name.rsplit_once('.') {
        Some((_, ext)) if !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()) => {
            format!("{}/{}.{}", owner, timestamp_millis, ext)
        }
        _ => format!("{}/{}", owner, timestamp_millis),
    }
}
