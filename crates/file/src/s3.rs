//! S3 object reader

use anyhow::{Context, Result};
use aws_config::BehaviorVersion;

pub struct S3FileReader;

impl S3FileReader {
    /// Read an object using the default AWS provider chain
    pub async fn read(bucket: &str, key: &str) -> Result<Vec<u8>> {
        let sdk_config = aws_config::load_defaults(BehaviorVersion::latest()).await;
        Self::read_with(&aws_sdk_s3::Client::new(&sdk_config), bucket, key).await
    }

    pub async fn read_with(client: &aws_sdk_s3::Client, bucket: &str, key: &str) -> Result<Vec<u8>> {
        tracing::info!("Fetching from s3://{bucket}/{key}");
        let response = client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .with_context(|| format!("Failed to fetch object from S3: s3://{bucket}/{key}"))?;

        let bytes = response
            .body
            .collect()
            .await
            .with_context(|| format!("Failed to read object body: s3://{bucket}/{key}"))?
            .into_bytes();

        tracing::debug!("Fetched {} bytes from: s3://{}/{}", bytes.len(), bucket, key);
        Ok(bytes.to_vec())
    }
}
