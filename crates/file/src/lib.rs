//! Fetch a file from the local filesystem, S3, or HTTP/HTTPS
//!
//! Used to read the configuration file, which may live next to the binary or
//! be shared from a bucket or a web server.
//!
//! # Source Types
//!
//! - **Local**: a plain path, or a `file://` URL
//! - **S3**: `s3://bucket/key`
//! - **HTTP/HTTPS**: `http://` or `https://` URLs
//!
//! Any other `scheme://` is rejected.
//!
//! # Example
//!
//! ```ignore
//! use rin_file::FileSource;
//!
//! let source = FileSource::parse("s3://my-bucket/rin/config.yaml")?;
//! let bytes = source.fetch().await?;
//! ```

mod http;
mod local;
mod s3;

use anyhow::{Context, Result};
use std::fmt;
use std::path::PathBuf;

pub use http::HttpFileReader;
pub use local::LocalFileReader;
pub use s3::S3FileReader;

/// Where a file lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileSource {
    Local(PathBuf),
    S3 { bucket: String, key: String },
    Http(String),
}

impl FileSource {
    /// Parse a path or URL, auto-detecting the source type
    pub fn parse(uri: &str) -> Result<Self> {
        if uri.starts_with("s3://") {
            let (bucket, key) = parse_s3_uri(uri)?;
            return Ok(FileSource::S3 { bucket, key });
        }
        if uri.starts_with("http://") || uri.starts_with("https://") {
            return Ok(FileSource::Http(uri.to_string()));
        }
        if let Some(path) = uri.strip_prefix("file://") {
            return Ok(FileSource::Local(PathBuf::from(path)));
        }
        if let Some((scheme, _)) = uri.split_once("://") {
            if is_scheme(scheme) {
                anyhow::bail!("scheme {scheme} is not supported: {uri}");
            }
        }
        Ok(FileSource::Local(PathBuf::from(uri)))
    }

    /// Read the whole file
    pub async fn fetch(&self) -> Result<Vec<u8>> {
        match self {
            FileSource::Local(path) => LocalFileReader::read(path).await,
            FileSource::S3 { bucket, key } => S3FileReader::read(bucket, key).await,
            FileSource::Http(url) => HttpFileReader::read(url).await,
        }
    }
}

impl fmt::Display for FileSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileSource::Local(path) => write!(f, "{}", path.display()),
            FileSource::S3 { bucket, key } => write!(f, "s3://{bucket}/{key}"),
            FileSource::Http(url) => write!(f, "{url}"),
        }
    }
}

/// Parse and fetch in one step
pub async fn fetch(uri: &str) -> Result<Vec<u8>> {
    let source = FileSource::parse(uri)?;
    source
        .fetch()
        .await
        .with_context(|| format!("Failed to load {source}"))
}

fn is_scheme(s: &str) -> bool {
    let mut chars = s.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

/// Parse S3 URI in the format: s3://bucket/key/to/file
pub fn parse_s3_uri(uri: &str) -> Result<(String, String)> {
    let uri = uri
        .strip_prefix("s3://")
        .context("S3 URI must start with 's3://'")?;

    match uri.split_once('/') {
        Some((bucket, key)) if !bucket.is_empty() && !key.is_empty() => {
            Ok((bucket.to_string(), key.to_string()))
        }
        _ => anyhow::bail!("S3 URI must be in format 's3://bucket/key/to/file'"),
    }
}
