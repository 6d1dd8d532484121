//! Storage abstraction trait
//!
//! This module defines the Storage trait that all storage backends must implement.

use crate::StorageBackend;
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::{Stream, StreamExt};
use std::path::Path;
use std::pin::Pin;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWriteExt};

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Download failed: {0}")]
    DownloadFailed(String),

    #[error("Delete failed: {0}")]
    DeleteFailed(String),

    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("Storage backend error: {0}")]
    BackendError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Object body as a stream of chunks.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, StorageError>> + Send>>;

/// Object body being uploaded, read until EOF.
pub type ByteReader = Pin<Box<dyn AsyncRead + Send>>;

/// Object metadata as reported by the backing store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectInfo {
    pub key: String,
    pub size: u64,
    /// Entity tag without surrounding quotes.
    pub e_tag: Option<String>,
    pub last_modified: DateTime<Utc>,
    pub content_type: Option<String>,
}

/// Storage abstraction trait
///
/// Keys are full storage keys (already namespaced, see the crate root).
#[async_trait]
pub trait Storage: Send + Sync {
    /// Store everything `reader` yields under `key`, replacing any existing
    /// object, without holding the whole body in memory. The returned `size`
    /// is the number of bytes read.
    async fn put_stream(
        &self,
        key: &str,
        reader: ByteReader,
        content_type: &str,
    ) -> StorageResult<ObjectInfo>;

    /// Store `data` under `key`, replacing any existing object.
    async fn put(&self, key: &str, data: Bytes, content_type: &str) -> StorageResult<ObjectInfo> {
        self.put_stream(key, Box::pin(std::io::Cursor::new(data)), content_type)
            .await
    }

    /// Open an object for streaming.
    async fn get(&self, key: &str) -> StorageResult<(ObjectInfo, ByteStream)>;

    /// Object metadata without the body.
    async fn head(&self, key: &str) -> StorageResult<ObjectInfo>;

    /// Delete an object. Deleting a missing object is not an error.
    async fn delete(&self, key: &str) -> StorageResult<()>;

    /// All objects whose key starts with `prefix`, in lexicographic key order.
    async fn list(&self, prefix: &str) -> StorageResult<Vec<ObjectInfo>>;

    /// Get the storage backend type
    fn backend_type(&self) -> StorageBackend;

    /// Stream an object into a local file, returning the number of bytes written.
    async fn download_to_file(&self, key: &str, dest: &Path) -> StorageResult<u64> {
        let (_, mut stream) = self.get(key).await?;
        let mut file = tokio::fs::File::create(dest).await.map_err(|e| {
            StorageError::DownloadFailed(format!(
                "Failed to create file {}: {}",
                dest.display(),
                e
            ))
        })?;

        let mut written = 0u64;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;
        Ok(written)
    }

    /// Upload a local file to `key`.
    async fn upload_file(
        &self,
        key: &str,
        src: &Path,
        content_type: &str,
    ) -> StorageResult<ObjectInfo> {
        let file = tokio::fs::File::open(src).await.map_err(|e| {
            StorageError::UploadFailed(format!("Failed to open file {}: {}", src.display(), e))
        })?;
        self.put_stream(key, Box::pin(file), content_type).await
    }
}

/// Content type guessed from a file name, for uploading job outputs.
pub fn content_type_for(filename: &str) -> &'static str {
    let ext = Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "mp4" => "video/mp4",
        "webm" => "video/webm",
        "mov" => "video/quicktime",
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        "pdf" => "application/pdf",
        "txt" => "text/plain",
        "json" => "application/json",
        _ => "application/octet-stream",
    }
}
