//! HTTP/HTTPS reader

use anyhow::{Context, Result};

pub struct HttpFileReader;

impl HttpFileReader {
    pub async fn read(url: &str) -> Result<Vec<u8>> {
        tracing::info!("Fetching from {url}");
        let response = reqwest::Client::new()
            .get(url)
            .send()
            .await
            .with_context(|| format!("Failed to fetch URL: {url}"))?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("HTTP request failed with status {status} for URL: {url}");
        }

        let bytes = response
            .bytes()
            .await
            .with_context(|| format!("Failed to read response body from: {url}"))?;

        tracing::debug!("Fetched {} bytes from: {}", bytes.len(), url);
        Ok(bytes.to_vec())
    }
}
