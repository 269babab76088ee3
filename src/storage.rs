use async_trait::async_trait;
use aws_sdk_s3 as s3;
use s3::presigning::PresigningConfig;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// How long a presigned upload URL stays valid.
pub const UPLOAD_URL_TTL: Duration = Duration::from_secs(600);

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("invalid presigning configuration: {0}")]
    Config(String),

    #[error("failed to presign upload: {0}")]
    Presign(String),
}

/// StorageService
///
/// Contract for the attachment store holding post images. The API never
/// receives image bytes itself: clients upload straight to the bucket through
/// a presigned URL and submit the resulting object key as `Post.image`.
#[async_trait]
pub trait StorageService: Send + Sync {
    /// Ensures the configured bucket exists. Only used for the local MinIO setup.
    async fn ensure_bucket_exists(&self);

    /// Generates a temporary signed URL allowing a client to PUT one object.
    ///
    /// # Arguments
    /// * `key`: The final object key in the bucket (`posts/<uuid>.<ext>`).
    /// * `content_type`: The MIME type the upload is constrained to.
    async fn get_presigned_upload_url(
        &self,
        key: &str,
        content_type: &str,
    ) -> Result<String, StorageError>;
}

/// S3StorageClient
///
/// S3-compatible implementation: MinIO locally, Supabase Storage in production.
/// `force_path_style(true)` is required by both.
#[derive(Clone)]
pub struct S3StorageClient {
    client: s3::Client,
    bucket_name: String,
}

impl S3StorageClient {
    pub async fn new(
        endpoint: &str,
        region: &str,
        access_key: &str,
        secret_key: &str,
        bucket: &str,
    ) -> Self {
        let credentials =
            s3::config::Credentials::new(access_key, secret_key, None, None, "static");

        let config = s3::Config::builder()
            .credentials_provider(credentials)
            .endpoint_url(endpoint)
            .region(s3::config::Region::new(region.to_string()))
            .behavior_version_latest()
            .force_path_style(true)
            .build();

        let client = s3::Client::from_conf(config);

        Self {
            client,
            bucket_name: bucket.to_string(),
        }
    }
}

#[async_trait]
impl StorageService for S3StorageClient {
    async fn ensure_bucket_exists(&self) {
        // CreateBucket fails harmlessly when the bucket is already there.
        if let Err(e) = self
            .client
            .create_bucket()
            .bucket(&self.bucket_name)
            .send()
            .await
        {
            tracing::debug!(bucket = %self.bucket_name, "create_bucket: {:?}", e);
        }
    }

    async fn get_presigned_upload_url(
        &self,
        key: &str,
        content_type: &str,
    ) -> Result<String, StorageError> {
        let presigning = PresigningConfig::expires_in(UPLOAD_URL_TTL)
            .map_err(|e| StorageError::Config(e.to_string()))?;

        let presigned_req = self
            .client
            .put_object()
            .bucket(&self.bucket_name)
            .key(key)
            // The signature covers the content type, so the client must send the same one.
            .content_type(content_type)
            .presigned(presigning)
            .await
            .map_err(|e| StorageError::Presign(e.to_string()))?;

        Ok(presigned_req.uri().to_string())
    }
}

/// Strips empty, `.` and `..` segments from an object key.
pub fn sanitize_key(key: &str) -> String {
    key.split('/')
        .filter(|segment| !segment.is_empty() && *segment != ".." && *segment != ".")
        .collect::<Vec<_>>()
        .join("/")
}

/// MockStorageService
///
/// In-process `StorageService` for tests and local runs without an object store.
#[derive(Clone, Default)]
pub struct MockStorageService {
    /// When true, all operations return a simulated failure.
    pub should_fail: bool,
}

impl MockStorageService {
    pub fn new() -> Self {
        Self { should_fail: false }
    }

    pub fn new_failing() -> Self {
        Self { should_fail: true }
    }
}

#[async_trait]
impl StorageService for MockStorageService {
    async fn ensure_bucket_exists(&self) {}

    async fn get_presigned_upload_url(
        &self,
        key: &str,
        _content_type: &str,
    ) -> Result<String, StorageError> {
        if self.should_fail {
            return Err(StorageError::Presign(
                "Mock Storage Error: Simulation requested".to_string(),
            ));
        }

        Ok(format!(
            "http://localhost:9000/mock-bucket/{}?signature=fake",
            sanitize_key(key)
        ))
    }
}

/// StorageState
///
/// The concrete type used to share the storage service across the application state.
pub type StorageState = Arc<dyn StorageService>;
