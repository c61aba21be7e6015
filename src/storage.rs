use async_trait::async_trait;
use aws_sdk_s3 as s3;
use s3::presigning::PresigningConfig;
use std::sync::Arc;
use std::time::Duration;

/// Presigned URLs stay valid for ten minutes; uploads are expected to start
/// immediately after the client receives the URL.
const PRESIGN_EXPIRY: Duration = Duration::from_secs(600);

/// ArtworkStorage
///
/// Seam between the upload handler and the object store holding character
/// artwork. Handlers only ever see this trait; the S3 client backs it in a
/// running deployment and [`MockArtworkStore`] backs it in tests.
#[async_trait]
pub trait ArtworkStorage: Send + Sync {
    /// Provisions the artwork bucket if it is not there yet. Only invoked for
    /// `Env::Local` against MinIO; production buckets are managed out of band.
    async fn ensure_bucket_exists(&self);

    /// Signs a temporary PUT URL for `key`, pinned to `content_type`.
    ///
    /// The caller stores the returned key in the character's `img` or
    /// `mnemoImg` field once the client confirms the upload.
    async fn get_presigned_upload_url(
        &self,
        key: &str,
        content_type: &str,
    ) -> Result<String, String>;
}

/// StorageState
///
/// Shared handle to the storage seam, cloned into every request via AppState.
pub type StorageState = Arc<dyn ArtworkStorage>;

/// Strips empty, `.` and `..` segments out of an object key so a hostile
/// filename cannot climb out of the artwork prefix.
fn sanitize_key(key: &str) -> String {
    key.split('/')
        .filter(|segment| !segment.is_empty() && *segment != ".." && *segment != ".")
        .collect::<Vec<_>>()
        .join("/")
}

/// S3ArtworkStore
///
/// AWS-SDK-backed implementation. The same client talks to the Dockerized
/// MinIO locally and to any S3-compatible store in production; path-style
/// addressing is what makes the MinIO gateway resolve bucket URLs.
#[derive(Clone)]
pub struct S3ArtworkStore {
    client: s3::Client,
    bucket_name: String,
}

impl S3ArtworkStore {
    /// Builds the client from the credentials and endpoint AppConfig resolved.
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
            // MinIO only answers path-style requests (endpoint/bucket/key).
            .force_path_style(true)
            .build();

        Self {
            client: s3::Client::from_conf(config),
            bucket_name: bucket.to_string(),
        }
    }
}

#[async_trait]
impl ArtworkStorage for S3ArtworkStore {
    /// CreateBucket is idempotent, so the call is issued unconditionally and
    /// an "already exists" answer is ignored.
    async fn ensure_bucket_exists(&self) {
        let _ = self
            .client
            .create_bucket()
            .bucket(&self.bucket_name)
            .send()
            .await;
    }

    async fn get_presigned_upload_url(
        &self,
        key: &str,
        content_type: &str,
    ) -> Result<String, String> {
        let presigned_req = self
            .client
            .put_object()
            .bucket(&self.bucket_name)
            .key(sanitize_key(key))
            // The signature covers the Content-Type header, so the upload is
            // locked to the image type the handler approved.
            .content_type(content_type)
            .presigned(PresigningConfig::expires_in(PRESIGN_EXPIRY).map_err(|e| e.to_string())?)
            .await
            .map_err(|e| e.to_string())?;

        Ok(presigned_req.uri().to_string())
    }
}

/// MockArtworkStore
///
/// Test double for the storage seam. Produces stable fake URLs so handler
/// tests can assert on them, and flips into a failing mode to exercise the
/// internal-error path.
#[derive(Clone)]
pub struct MockArtworkStore {
    /// When true, every presign request reports a simulated outage.
    pub should_fail: bool,
}

impl MockArtworkStore {
    pub fn new() -> Self {
        Self { should_fail: false }
    }

    pub fn new_failing() -> Self {
        Self { should_fail: true }
    }
}

impl Default for MockArtworkStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ArtworkStorage for MockArtworkStore {
    async fn ensure_bucket_exists(&self) {}

    async fn get_presigned_upload_url(
        &self,
        key: &str,
        _content_type: &str,
    ) -> Result<String, String> {
        if self.should_fail {
            return Err("Mock Storage Error: Simulation requested".to_string());
        }

        // Stable shape for assertions; the key goes through the same
        // sanitizer as the real client.
        Ok(format!(
            "http://localhost:9000/mock-bucket/{}?signature=fake",
            sanitize_key(key)
        ))
    }
}
