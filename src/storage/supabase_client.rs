// Hosted storage REST client (Supabase Storage API v1)

use super::{BucketInfo, BucketOptions, ObjectStore, StorageError};
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, RequestBuilder, Response, Url};
use serde::{Deserialize, Serialize};
use tracing::debug;

pub struct SupabaseStorageClient {
    client: Client,
    base_url: String,
    service_key: String,
}

#[derive(Serialize)]
struct CreateBucketRequest<'a> {
    id: &'a str,
    name: &'a str,
    public: bool,
    file_size_limit: u64,
}

#[derive(Serialize)]
struct RemoveObjectsRequest<'a> {
    prefixes: &'a [String],
}

#[derive(Deserialize)]
struct StorageApiError {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

impl SupabaseStorageClient {
    /// `base_url` is the project URL, e.g. `https://xyz.supabase.co`.
    pub fn new(base_url: &str, service_key: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            service_key: service_key.to_string(),
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/storage/v1/{}", self.base_url, path)
    }

    /// `{base}/storage/v1/{prefix..}/{bucket}/{path}` with every segment
    /// percent-encoded, so key characters never turn into a query or fragment.
    fn object_url(&self, prefix: &[&str], bucket: &str, path: &str) -> Result<Url, StorageError> {
        let mut url = Url::parse(&self.base_url).map_err(StorageError::remote)?;
        url.path_segments_mut()
            .map_err(|_| StorageError::remote(format!("{} cannot be a base URL", self.base_url)))?
            .pop_if_empty()
            .extend(["storage", "v1"])
            .extend(prefix)
            .push(bucket)
            .extend(path.split('/'));
        Ok(url)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("apikey", &self.service_key)
            .bearer_auth(&self.service_key)
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, StorageError> {
        let response = self
            .authorized(request)
            .send()
            .await
            .map_err(StorageError::remote)?;

        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let detail = serde_json::from_str::<StorageApiError>(&body)
            .ok()
            .and_then(|e| e.message.or(e.error))
            .unwrap_or(body);
        Err(StorageError::remote(format!("{} {}", status.as_u16(), detail)))
    }
}

#[async_trait]
impl ObjectStore for SupabaseStorageClient {
    async fn list_buckets(&self) -> Result<Vec<BucketInfo>, StorageError> {
        let response = self.send(self.client.get(self.endpoint("bucket"))).await?;
        response
            .json::<Vec<BucketInfo>>()
            .await
            .map_err(StorageError::remote)
    }

    async fn create_bucket(&self, name: &str, options: BucketOptions) -> Result<(), StorageError> {
        let body = CreateBucketRequest {
            id: name,
            name,
            public: options.public,
            file_size_limit: options.file_size_limit,
        };
        self.send(self.client.post(self.endpoint("bucket")).json(&body))
            .await?;
        debug!(bucket = %name, "Bucket created");
        Ok(())
    }

    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        data: Bytes,
        content_type: &str,
    ) -> Result<(), StorageError> {
        let url = self.object_url(&["object"], bucket, path)?;
        let request = self
            .client
            .post(url)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .header("x-upsert", "false")
            .body(data);
        self.send(request).await?;
        Ok(())
    }

    fn public_url(&self, bucket: &str, path: &str) -> String {
        match self.object_url(&["object", "public"], bucket, path) {
            Ok(url) => url.into(),
            Err(_) => self.endpoint(&format!("object/public/{}/{}", bucket, path)),
        }
    }

    async fn remove(&self, bucket: &str, paths: &[String]) -> Result<(), StorageError> {
        let request = self
            .client
            .delete(self.endpoint(&format!("object/{}", bucket)))
            .json(&RemoveObjectsRequest { prefixes: paths });
        self.send(request).await?;
        Ok(())
    }
}
