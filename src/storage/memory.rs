//! In-process object store for local development and tests.

use super::{BucketInfo, BucketOptions, ObjectStore, StorageError};
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

type UploadFailure = Box<dyn Fn(&str, &[u8]) -> bool + Send + Sync>;

#[derive(Default)]
struct State {
    buckets: HashMap<String, BucketOptions>,
    objects: HashMap<(String, String), Bytes>,
}

pub struct MemoryObjectStore {
    state: Mutex<State>,
    base_url: String,
    latency: Option<Duration>,
    unreachable: bool,
    fail_upload: Option<UploadFailure>,
    create_bucket_calls: AtomicUsize,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
            base_url: "http://localhost/storage/v1".to_string(),
            latency: None,
            unreachable: false,
            fail_upload: None,
            create_bucket_calls: AtomicUsize::new(0),
        }
    }

    /// Delay applied to every upload.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Every call fails as if the service could not be reached.
    pub fn unreachable(mut self) -> Self {
        self.unreachable = true;
        self
    }

    /// Rejects uploads for which `predicate(path, data)` holds.
    pub fn fail_uploads_when<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&str, &[u8]) -> bool + Send + Sync + 'static,
    {
        self.fail_upload = Some(Box::new(predicate));
        self
    }

    pub fn create_bucket_calls(&self) -> usize {
        self.create_bucket_calls.load(Ordering::SeqCst)
    }

    pub fn contains(&self, bucket: &str, path: &str) -> bool {
        self.lock()
            .objects
            .contains_key(&(bucket.to_string(), path.to_string()))
    }

    pub fn object_count(&self) -> usize {
        self.lock().objects.len()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn check_reachable(&self) -> Result<(), StorageError> {
        if self.unreachable {
            return Err(StorageError::remote("connection refused"));
        }
        Ok(())
    }
}

impl Default for MemoryObjectStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn list_buckets(&self) -> Result<Vec<BucketInfo>, StorageError> {
        self.check_reachable()?;
        let mut buckets: Vec<BucketInfo> = self
            .lock()
            .buckets
            .iter()
            .map(|(name, options)| BucketInfo {
                id: name.clone(),
                name: name.clone(),
                public: options.public,
            })
            .collect();
        buckets.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(buckets)
    }

    async fn create_bucket(&self, name: &str, options: BucketOptions) -> Result<(), StorageError> {
        self.check_reachable()?;
        self.create_bucket_calls.fetch_add(1, Ordering::SeqCst);
        let mut state = self.lock();
        if state.buckets.contains_key(name) {
            return Err(StorageError::remote(format!("Bucket {} already exists", name)));
        }
        state.buckets.insert(name.to_string(), options);
        Ok(())
    }

    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        data: Bytes,
        _content_type: &str,
    ) -> Result<(), StorageError> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        self.check_reachable()?;

        if let Some(fail) = &self.fail_upload {
            if fail(path, &data) {
                return Err(StorageError::remote("upload rejected"));
            }
        }

        let mut state = self.lock();
        let limit = state
            .buckets
            .get(bucket)
            .map(|options| options.file_size_limit)
            .ok_or_else(|| StorageError::remote("Bucket not found"))?;
        if data.len() as u64 > limit {
            return Err(StorageError::remote("Payload too large"));
        }

        let key = (bucket.to_string(), path.to_string());
        if state.objects.contains_key(&key) {
            return Err(StorageError::remote("The resource already exists"));
        }
        state.objects.insert(key, data);
        Ok(())
    }

    fn public_url(&self, bucket: &str, path: &str) -> String {
        format!("{}/object/public/{}/{}", self.base_url, bucket, path)
    }

    async fn remove(&self, bucket: &str, paths: &[String]) -> Result<(), StorageError> {
        self.check_reachable()?;
        let mut state = self.lock();
        for path in paths {
            state.objects.remove(&(bucket.to_string(), path.clone()));
        }
        Ok(())
    }
}
