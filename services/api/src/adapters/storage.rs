//! services/api/src/adapters/storage.rs
//!
//! Object storage for module images, backed by any S3-compatible service.

use async_trait::async_trait;
use aws_sdk_s3::config::{BehaviorVersion, Credentials, Region};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use bytes::Bytes;
use onboarding_core::ports::{ObjectHandle, ObjectStorage, PortError, PortResult};
use std::error::Error;
use tracing::{error, info};

use crate::config::S3Settings;

#[derive(Clone, Debug)]
pub struct S3Storage {
    client: Client,
    bucket: String,
    public_url: String,
}

impl S3Storage {
    pub fn new(settings: &S3Settings) -> Self {
        let credentials = Credentials::new(
            settings.access_key.clone(),
            settings.secret_key.clone(),
            None,
            None,
            "s3",
        );
        let mut builder = aws_sdk_s3::config::Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(settings.region.clone()))
            .credentials_provider(credentials);
        if let Some(endpoint) = &settings.endpoint {
            // Self-hosted stores (MinIO and friends) only speak path-style.
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }

        Self {
            client: Client::from_conf(builder.build()),
            bucket: settings.bucket.clone(),
            public_url: settings.public_url.clone(),
        }
    }
}

#[async_trait]
impl ObjectStorage for S3Storage {
    async fn upload(
        &self,
        path: &str,
        bytes: Bytes,
        content_type: &str,
    ) -> PortResult<ObjectHandle> {
        let size = bytes.len();
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(path)
            .content_type(content_type)
            .body(ByteStream::from(bytes))
            .send()
            .await
            .map_err(|e| {
                error!(error = &e as &dyn Error, key = path, "failed to put object");
                PortError::Unexpected(format!("Failed to upload {path}: {e}"))
            })?;
        info!(key = path, size, "uploaded object");
        Ok(ObjectHandle {
            path: path.to_string(),
        })
    }

    async fn url(&self, handle: &ObjectHandle) -> PortResult<String> {
        Ok(format!("{}/{}", self.public_url, handle.path))
    }
}
