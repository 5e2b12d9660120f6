// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Image byte loading from a picked source
//!
//! The file boundary only speaks text: bytes cross it base64-encoded and are
//! decoded back into a raw buffer on this side.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::path::PathBuf;
use tracing::debug;
use url::Url;

use crate::config::DEFAULT_MAX_IMAGE_SIZE;
use crate::errors::PipelineError;

/// File capability consumed by the loader
#[async_trait]
pub trait FileSource: Send + Sync {
    /// Read the whole resource behind `uri` and return it base64-encoded
    async fn read_bytes_as_base64(&self, uri: &str) -> Result<String, PipelineError>;
}

/// Encoded image bytes plus the identifier they were read from
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedImage {
    source_id: String,
    bytes: Vec<u8>,
}

impl EncodedImage {
    pub fn new(source_id: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            source_id: source_id.into(),
            bytes,
        }
    }

    pub fn source_id(&self) -> &str {
        &self.source_id
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Hand the buffer over to the decoder
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

/// Load the image behind `source_id` through the file capability
///
/// # Errors
/// Returns `PipelineError::Io` if the source is unreadable, or if the text
/// that came back is not valid base64.
pub async fn load_image(
    files: &dyn FileSource,
    source_id: &str,
) -> Result<EncodedImage, PipelineError> {
    let encoded = files.read_bytes_as_base64(source_id).await?;
    let bytes = STANDARD
        .decode(encoded.trim())
        .map_err(|e| PipelineError::io(source_id, format!("invalid base64 payload: {}", e)))?;

    debug!("Loaded {} bytes from {}", bytes.len(), source_id);

    Ok(EncodedImage::new(source_id, bytes))
}

/// Local filesystem implementation of `FileSource`
///
/// Accepts plain paths and `file://` URLs.
#[derive(Debug, Clone)]
pub struct LocalFileSource {
    max_image_size: usize,
}

impl LocalFileSource {
    pub fn new() -> Self {
        Self {
            max_image_size: DEFAULT_MAX_IMAGE_SIZE,
        }
    }

    pub fn with_max_image_size(mut self, max_image_size: usize) -> Self {
        self.max_image_size = max_image_size;
        self
    }
}

impl Default for LocalFileSource {
    fn default() -> Self {
        Self::new()
    }
}

/// Turn a picker URI into a filesystem path
pub fn resolve_path(uri: &str) -> Result<PathBuf, PipelineError> {
    if uri.starts_with("file://") {
        let url = Url::parse(uri).map_err(|e| PipelineError::io(uri, e))?;
        url.to_file_path()
            .map_err(|_| PipelineError::io(uri, "not a local file URL"))
    } else if uri.is_empty() {
        Err(PipelineError::io(uri, "empty source identifier"))
    } else {
        Ok(PathBuf::from(uri))
    }
}

#[async_trait]
impl FileSource for LocalFileSource {
    async fn read_bytes_as_base64(&self, uri: &str) -> Result<String, PipelineError> {
        let path = resolve_path(uri)?;

        let metadata = tokio::fs::metadata(&path)
            .await
            .map_err(|e| PipelineError::io(uri, e))?;
        if !metadata.is_file() {
            return Err(PipelineError::io(uri, "not a regular file"));
        }
        if metadata.len() as usize > self.max_image_size {
            return Err(PipelineError::io(
                uri,
                format!(
                    "image is too large: {} bytes (max: {} bytes)",
                    metadata.len(),
                    self.max_image_size
                ),
            ));
        }

        let bytes = tokio::fs::read(&path)
            .await
            .map_err(|e| PipelineError::io(uri, e))?;

        Ok(STANDARD.encode(bytes))
    }
}
