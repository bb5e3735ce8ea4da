//! Object storage access.
//!
//! Handlers talk to the [`ObjectStore`] trait; [`S3Store`] is the production
//! implementation backed by `aws-sdk-s3`.

use std::fmt;

use async_trait::async_trait;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use tracing::info;

use crate::error::AppError;

/// Object location, displayed as `s3://bucket/key`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct S3Uri {
    pub bucket: String,
    pub key: String,
}

impl S3Uri {
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
        }
    }

    /// Public virtual-hosted-style HTTPS URL of the object.
    pub fn public_url(&self) -> String {
        public_object_url(&self.bucket, &self.key)
    }
}

impl fmt::Display for S3Uri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s3://{}/{}", self.bucket, self.key)
    }
}

/// Builds `https://<bucket>.s3.amazonaws.com/<key>`.
///
/// Keys produced by this service are already URL-safe apart from `/`
/// separators; spaces are still escaped for keys coming from elsewhere.
pub fn public_object_url(bucket: &str, key: &str) -> String {
    format!(
        "https://{bucket}.s3.amazonaws.com/{}",
        key.trim_start_matches('/').replace(' ', "%20")
    )
}

/// Blob store addressed by bucket and key.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Stores `bytes` under `uri`, replacing any existing object.
    async fn put_object(
        &self,
        uri: &S3Uri,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<(), AppError>;
}

/// [`ObjectStore`] backed by Amazon S3.
pub struct S3Store {
    client: aws_sdk_s3::Client,
}

impl S3Store {
    pub fn new(client: aws_sdk_s3::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn put_object(
        &self,
        uri: &S3Uri,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<(), AppError> {
        let size = bytes.len();
        self.client
            .put_object()
            .bucket(&uri.bucket)
            .key(&uri.key)
            .content_type(content_type)
            .body(ByteStream::from(bytes))
            .send()
            .await
            .map_err(|err| {
                AppError::upstream(
                    "s3",
                    format!("failed to upload {uri}: {}", DisplayErrorContext(&err)),
                )
            })?;

        info!(uri = %uri, bytes = size, "uploaded object");
        Ok(())
    }
}
