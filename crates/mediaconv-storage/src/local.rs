use crate::traits::{ByteReader, ByteStream, ObjectInfo, Storage, StorageError, StorageResult};
use crate::StorageBackend;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::StreamExt;
use md5::{Digest, Md5};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::fs;
use tokio_util::io::InspectReader;

/// Directory under the base path holding per-object metadata sidecars.
const META_DIR: &str = ".mediaconv-meta";
/// Uploads in progress, under `META_DIR` so listings never see them.
const PARTIAL_DIR: &str = ".partial";

static PARTIAL_SEQ: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, Serialize, Deserialize)]
struct SidecarMeta {
    content_type: String,
    e_tag: String,
}

/// Local filesystem storage implementation
///
/// Object bytes live at `{base}/{key}`. The content type and entity tag are
/// kept in a JSON sidecar at `{base}/.mediaconv-meta/{key}.json`.
#[derive(Clone)]
pub struct LocalStorage {
    base_path: PathBuf,
}

impl LocalStorage {
    pub async fn new(base_path: impl Into<PathBuf>) -> StorageResult<Self> {
        let base_path = base_path.into();

        fs::create_dir_all(&base_path).await.map_err(|e| {
            StorageError::ConfigError(format!(
                "Failed to create storage directory {}: {}",
                base_path.display(),
                e
            ))
        })?;

        Ok(LocalStorage { base_path })
    }

    /// Convert storage key to filesystem path, rejecting keys that could
    /// escape the base directory or reach the metadata directory.
    fn key_to_path(&self, storage_key: &str) -> StorageResult<PathBuf> {
        if storage_key.is_empty()
            || storage_key.contains("..")
            || storage_key.starts_with('/')
            || storage_key.contains('\\')
        {
            return Err(StorageError::InvalidKey(
                "Storage key contains invalid characters".to_string(),
            ));
        }
        if storage_key == META_DIR || storage_key.starts_with(&format!("{}/", META_DIR)) {
            return Err(StorageError::InvalidKey(
                "Storage key uses a reserved prefix".to_string(),
            ));
        }
        Ok(self.base_path.join(storage_key))
    }

    fn meta_path(&self, storage_key: &str) -> PathBuf {
        self.base_path
            .join(META_DIR)
            .join(format!("{}.json", storage_key))
    }

    /// Ensure parent directory exists
    async fn ensure_parent_dir(&self, path: &Path) -> StorageResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        Ok(())
    }

    fn partial_path(&self) -> PathBuf {
        let seq = PARTIAL_SEQ.fetch_add(1, Ordering::Relaxed);
        self.base_path
            .join(META_DIR)
            .join(PARTIAL_DIR)
            .join(format!("{}-{}", std::process::id(), seq))
    }

    /// Copy `reader` into `partial`, hashing as it goes.
    async fn write_partial(
        &self,
        partial: &Path,
        reader: ByteReader,
        hasher: &mut Md5,
    ) -> StorageResult<u64> {
        let mut file = fs::File::create(partial).await.map_err(|e| {
            StorageError::UploadFailed(format!(
                "Failed to create file {}: {}",
                partial.display(),
                e
            ))
        })?;

        let mut reader = InspectReader::new(reader, |chunk: &[u8]| hasher.update(chunk));
        let written = tokio::io::copy(&mut reader, &mut file).await.map_err(|e| {
            StorageError::UploadFailed(format!(
                "Failed to write stream to file {}: {}",
                partial.display(),
                e
            ))
        })?;

        file.sync_all().await.map_err(|e| {
            StorageError::UploadFailed(format!(
                "Failed to sync file {}: {}",
                partial.display(),
                e
            ))
        })?;
        Ok(written)
    }

    async fn read_meta(&self, storage_key: &str) -> Option<SidecarMeta> {
        let raw = fs::read(self.meta_path(storage_key)).await.ok()?;
        serde_json::from_slice(&raw).ok()
    }

    async fn object_info(&self, storage_key: &str, path: &Path) -> StorageResult<ObjectInfo> {
        let metadata = match fs::metadata(path).await {
            Ok(m) if m.is_file() => m,
            Ok(_) => return Err(StorageError::NotFound(storage_key.to_string())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StorageError::NotFound(storage_key.to_string()))
            }
            Err(e) => return Err(e.into()),
        };

        let last_modified = metadata
            .modified()
            .map(DateTime::<Utc>::from)
            .unwrap_or_else(|_| Utc::now());
        let sidecar = self.read_meta(storage_key).await;

        Ok(ObjectInfo {
            key: storage_key.to_string(),
            size: metadata.len(),
            e_tag: sidecar.as_ref().map(|m| m.e_tag.clone()),
            last_modified,
            content_type: sidecar.map(|m| m.content_type),
        })
    }

    /// Collect every object key below `dir`, relative to the base path.
    async fn walk(&self, dir: PathBuf, keys: &mut Vec<String>) -> StorageResult<()> {
        let mut pending = vec![dir];
        while let Some(current) = pending.pop() {
            let mut entries = match fs::read_dir(&current).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };
            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                let file_type = entry.file_type().await?;
                if file_type.is_dir() {
                    if path != self.base_path.join(META_DIR) {
                        pending.push(path);
                    }
                } else if let Ok(relative) = path.strip_prefix(&self.base_path) {
                    let key = relative
                        .components()
                        .map(|c| c.as_os_str().to_string_lossy())
                        .collect::<Vec<_>>()
                        .join("/");
                    keys.push(key);
                }
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Storage for LocalStorage {
    async fn put_stream(
        &self,
        key: &str,
        reader: ByteReader,
        content_type: &str,
    ) -> StorageResult<ObjectInfo> {
        let path = self.key_to_path(key)?;
        self.ensure_parent_dir(&path).await?;

        let start = std::time::Instant::now();

        // The body lands in a partial file first; a failed upload leaves any
        // previous object in place.
        let partial = self.partial_path();
        self.ensure_parent_dir(&partial).await?;
        let mut hasher = Md5::new();
        let written = match self.write_partial(&partial, reader, &mut hasher).await {
            Ok(written) => written,
            Err(e) => {
                let _ = fs::remove_file(&partial).await;
                return Err(e);
            }
        };

        fs::rename(&partial, &path).await.map_err(|e| {
            StorageError::UploadFailed(format!("Failed to move file {}: {}", path.display(), e))
        })?;

        let sidecar = SidecarMeta {
            content_type: content_type.to_string(),
            e_tag: hex::encode(hasher.finalize()),
        };
        let meta_path = self.meta_path(key);
        self.ensure_parent_dir(&meta_path).await?;
        let encoded = serde_json::to_vec(&sidecar)
            .map_err(|e| StorageError::UploadFailed(format!("Failed to encode metadata: {}", e)))?;
        fs::write(&meta_path, encoded).await?;

        tracing::info!(
            path = %path.display(),
            key = %key,
            size_bytes = written,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local storage upload successful"
        );

        let mut info = self.object_info(key, &path).await?;
        info.size = written;
        Ok(info)
    }

    async fn get(&self, key: &str) -> StorageResult<(ObjectInfo, ByteStream)> {
        let path = self.key_to_path(key)?;
        let info = self.object_info(key, &path).await?;

        let file = fs::File::open(&path).await.map_err(|e| {
            StorageError::DownloadFailed(format!("Failed to open file {}: {}", path.display(), e))
        })?;

        let stream = tokio_util::io::ReaderStream::new(file).map(|result| {
            result.map_err(|e| StorageError::DownloadFailed(format!("Failed to read chunk: {}", e)))
        });

        tracing::debug!(
            key = %key,
            size_bytes = info.size,
            "Local storage download started"
        );

        Ok((info, Box::pin(stream)))
    }

    async fn head(&self, key: &str) -> StorageResult<ObjectInfo> {
        let path = self.key_to_path(key)?;
        self.object_info(key, &path).await
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        let path = self.key_to_path(key)?;

        match fs::remove_file(&path).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(key = %key, "Local storage delete of missing object");
                return Ok(());
            }
            Err(e) => {
                return Err(StorageError::DeleteFailed(format!(
                    "Failed to delete file {}: {}",
                    path.display(),
                    e
                )))
            }
        }

        if let Err(e) = fs::remove_file(self.meta_path(key)).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(key = %key, error = %e, "Failed to remove metadata sidecar");
            }
        }

        tracing::info!(key = %key, "Local storage delete successful");
        Ok(())
    }

    async fn list(&self, prefix: &str) -> StorageResult<Vec<ObjectInfo>> {
        // Walk only the deepest directory fully covered by the prefix.
        let dir_part = match prefix.rfind('/') {
            Some(idx) => &prefix[..idx],
            None => "",
        };
        let start_dir = if dir_part.is_empty() {
            self.base_path.clone()
        } else {
            self.key_to_path(dir_part)?
        };

        let mut keys = Vec::new();
        self.walk(start_dir, &mut keys).await?;
        keys.retain(|k| k.starts_with(prefix));
        keys.sort();

        let mut objects = Vec::with_capacity(keys.len());
        for key in keys {
            let path = self.base_path.join(&key);
            match self.object_info(&key, &path).await {
                Ok(info) => objects.push(info),
                // Removed between the walk and the stat.
                Err(StorageError::NotFound(_)) => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(objects)
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Local
    }
}

#[cfg(all(test, feature = "storage-local"))]
mod tests {
    use super::*;
    use bytes::Bytes;
    use tempfile::tempdir;

    async fn read_all(mut stream: ByteStream) -> Vec<u8> {
        let mut out = Vec::new();
        while let Some(chunk) = stream.next().await {
            out.extend_from_slice(&chunk.unwrap());
        }
        out
    }

    #[tokio::test]
    async fn test_local_storage_put_get() {
        let dir = tempdir().unwrap();
        let storage = LocalStorage::new(dir.path()).await.unwrap();

        let info = storage
            .put("users/1/test.txt", Bytes::from_static(b"test data"), "text/plain")
            .await
            .unwrap();
        assert_eq!(info.size, 9);
        assert_eq!(info.content_type.as_deref(), Some("text/plain"));
        // md5("test data")
        assert_eq!(
            info.e_tag.as_deref(),
            Some("eb733a00c0c9d336e65691a37ab54293")
        );

        let (meta, stream) = storage.get("users/1/test.txt").await.unwrap();
        assert_eq!(meta.size, 9);
        assert_eq!(read_all(stream).await, b"test data");
    }

    #[tokio::test]
    async fn test_path_traversal_rejected() {
        let dir = tempdir().unwrap();
        let storage = LocalStorage::new(dir.path()).await.unwrap();

        let result = storage.head("../../../etc/passwd").await;
        assert!(matches!(result, Err(StorageError::InvalidKey(_))));

        let result = storage.delete("../etc/passwd").await;
        assert!(matches!(result, Err(StorageError::InvalidKey(_))));

        let result = storage.head("/etc/passwd").await;
        assert!(matches!(result, Err(StorageError::InvalidKey(_))));

        let result = storage
            .put(".mediaconv-meta/x.json", Bytes::new(), "text/plain")
            .await;
        assert!(matches!(result, Err(StorageError::InvalidKey(_))));
    }

    #[tokio::test]
    async fn test_missing_object() {
        let dir = tempdir().unwrap();
        let storage = LocalStorage::new(dir.path()).await.unwrap();

        assert!(matches!(
            storage.head("users/1/nope").await,
            Err(StorageError::NotFound(_))
        ));
        assert!(storage.delete("users/1/nope").await.is_ok());
    }

    #[tokio::test]
    async fn test_list_by_prefix_skips_metadata() {
        let dir = tempdir().unwrap();
        let storage = LocalStorage::new(dir.path()).await.unwrap();

        for key in [
            "users/1/videos/b.mp4",
            "users/1/videos/a.mp4",
            "users/1/docs/x.pdf",
            "users/2/videos/c.mp4",
        ] {
            storage
                .put(key, Bytes::from_static(b"x"), "application/octet-stream")
                .await
                .unwrap();
        }

        let keys: Vec<String> = storage
            .list("users/1/")
            .await
            .unwrap()
            .into_iter()
            .map(|o| o.key)
            .collect();
        assert_eq!(
            keys,
            vec![
                "users/1/docs/x.pdf",
                "users/1/videos/a.mp4",
                "users/1/videos/b.mp4"
            ]
        );

        let keys: Vec<String> = storage
            .list("users/1/vid")
            .await
            .unwrap()
            .into_iter()
            .map(|o| o.key)
            .collect();
        assert_eq!(keys, vec!["users/1/videos/a.mp4", "users/1/videos/b.mp4"]);

        assert!(storage.list("users/3/").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_removes_object() {
        let dir = tempdir().unwrap();
        let storage = LocalStorage::new(dir.path()).await.unwrap();

        storage
            .put("users/1/a.txt", Bytes::from_static(b"a"), "text/plain")
            .await
            .unwrap();
        storage.delete("users/1/a.txt").await.unwrap();
        assert!(storage.list("users/1/").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_file_round_trip() {
        let dir = tempdir().unwrap();
        let storage = LocalStorage::new(dir.path().join("store")).await.unwrap();

        let src = dir.path().join("input.bin");
        fs::write(&src, b"payload").await.unwrap();
        storage
            .upload_file("users/1/in.bin", &src, "application/octet-stream")
            .await
            .unwrap();

        let dest = dir.path().join("copy.bin");
        let written = storage.download_to_file("users/1/in.bin", &dest).await.unwrap();
        assert_eq!(written, 7);
        assert_eq!(fs::read(&dest).await.unwrap(), b"payload");
    }

    fn chunked(chunks: Vec<std::io::Result<Bytes>>) -> ByteReader {
        Box::pin(tokio_util::io::StreamReader::new(futures::stream::iter(
            chunks,
        )))
    }

    #[tokio::test]
    async fn test_put_stream_counts_and_hashes_chunks() {
        let dir = tempdir().unwrap();
        let storage = LocalStorage::new(dir.path()).await.unwrap();

        let reader = chunked(vec![
            Ok(Bytes::from_static(b"test ")),
            Ok(Bytes::from_static(b"data")),
        ]);
        let info = storage
            .put_stream("users/1/streamed.txt", reader, "text/plain")
            .await
            .unwrap();
        assert_eq!(info.size, 9);
        assert_eq!(
            info.e_tag.as_deref(),
            Some("eb733a00c0c9d336e65691a37ab54293")
        );

        let (_, stream) = storage.get("users/1/streamed.txt").await.unwrap();
        assert_eq!(read_all(stream).await, b"test data");
        // No partial files show up as objects.
        assert_eq!(storage.list("").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_stream_keeps_previous_object() {
        let dir = tempdir().unwrap();
        let storage = LocalStorage::new(dir.path()).await.unwrap();

        storage
            .put("users/1/a.txt", Bytes::from_static(b"old"), "text/plain")
            .await
            .unwrap();

        let reader = chunked(vec![
            Ok(Bytes::from_static(b"ne")),
            Err(std::io::Error::other("connection reset")),
        ]);
        let result = storage.put_stream("users/1/a.txt", reader, "text/plain").await;
        assert!(matches!(result, Err(StorageError::UploadFailed(_))));

        let (info, stream) = storage.get("users/1/a.txt").await.unwrap();
        assert_eq!(info.size, 3);
        assert_eq!(read_all(stream).await, b"old");
        assert_eq!(storage.list("").await.unwrap().len(), 1);
    }
}
