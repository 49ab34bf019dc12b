//! Media object storage. Keys are namespaced by tenant so buckets can be shared.
//!
//! [`ObjectStore`] is the seam handlers talk to; [`MediaStore`] is the S3 implementation.

use crate::error::AppError;
use crate::settings::MediaSettings;
use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use regex::Regex;
use std::future::Future;
use uuid::Uuid;

#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put(&self, key: &str, content_type: Option<&str>, bytes: Vec<u8>) -> Result<(), AppError>;

    async fn delete(&self, key: &str) -> Result<(), AppError>;

    /// URL clients use to fetch the object.
    fn public_url(&self, key: &str) -> String;
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoredObject {
    pub key: String,
    pub url: String,
}

/// Upload the object, then hand it to `record`. If `record` fails the object is deleted again
/// and the original error is returned.
pub async fn upload_then_record<T, F, Fut>(
    store: &dyn ObjectStore,
    key: &str,
    content_type: Option<&str>,
    bytes: Vec<u8>,
    record: F,
) -> Result<T, AppError>
where
    F: FnOnce(StoredObject) -> Fut,
    Fut: Future<Output = Result<T, AppError>>,
{
    store.put(key, content_type, bytes).await?;
    let stored = StoredObject {
        key: key.to_string(),
        url: store.public_url(key),
    };
    match record(stored).await {
        Ok(value) => Ok(value),
        Err(err) => {
            if let Err(cleanup) = store.delete(key).await {
                tracing::warn!(key, error = %cleanup, "could not remove unrecorded media object");
            }
            Err(err)
        }
    }
}

#[derive(Clone)]
pub struct MediaStore {
    client: Client,
    bucket: String,
    public_base_url: String,
}

impl MediaStore {
    /// Credentials and region come from the standard AWS environment/profile chain.
    pub async fn from_env(settings: &MediaSettings) -> Self {
        let config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
        MediaStore {
            client: Client::new(&config),
            bucket: settings.bucket.clone(),
            public_base_url: settings.public_base_url.clone(),
        }
    }
}

#[async_trait]
impl ObjectStore for MediaStore {
    async fn put(&self, key: &str, content_type: Option<&str>, bytes: Vec<u8>) -> Result<(), AppError> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .set_content_type(content_type.map(String::from))
            .body(ByteStream::from(bytes))
            .send()
            .await
            .map_err(|e| AppError::Storage(format!("upload {}: {}", key, e)))?;
        tracing::info!(bucket = %self.bucket, key = %key, "media uploaded");
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), AppError> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| AppError::Storage(format!("delete {}: {}", key, e)))?;
        tracing::info!(bucket = %self.bucket, key = %key, "media deleted");
        Ok(())
    }

    fn public_url(&self, key: &str) -> String {
        public_url(&self.public_base_url, key)
    }
}

/// `<tenant>/<post id>/<object id>-<sanitized file name>`.
pub fn object_key(tenant: &str, post_id: Uuid, object_id: Uuid, file_name: &str) -> Result<String, AppError> {
    Ok(format!("{}/{}/{}-{}", tenant, post_id, object_id, sanitize_file_name(file_name)?))
}

pub fn public_url(base: &str, key: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), key)
}

/// Keep the final path component and replace anything outside `[A-Za-z0-9._-]` with `_`.
pub fn sanitize_file_name(name: &str) -> Result<String, AppError> {
    let unsafe_chars =
        Regex::new(r"[^A-Za-z0-9._-]").map_err(|e| AppError::Internal(format!("file name pattern: {}", e)))?;
    let base = name.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned = unsafe_chars.replace_all(base, "_");
    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        Ok("file".to_string())
    } else {
        Ok(cleaned.to_string())
    }
}
