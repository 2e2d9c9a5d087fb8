//! Local filesystem reader

use anyhow::{Context, Result};
use std::path::Path;

pub struct LocalFileReader;

impl LocalFileReader {
    pub async fn read(path: &Path) -> Result<Vec<u8>> {
        let contents = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read file: {}", path.display()))?;
        tracing::debug!("Read {} bytes from: {}", contents.len(), path.display());
        Ok(contents)
    }
}
