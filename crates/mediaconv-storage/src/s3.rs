use crate::traits::{ByteReader, ByteStream, ObjectInfo, Storage, StorageError, StorageResult};
use crate::StorageBackend;
use async_trait::async_trait;
use futures::{StreamExt, TryStreamExt};
use object_store::aws::{AmazonS3, AmazonS3Builder};
use object_store::buffered::BufWriter;
use object_store::path::Path;
use object_store::Error as ObjectStoreError;
use object_store::{
    Attribute, Attributes, GetOptions, GetResult, ObjectMeta, ObjectStore, ObjectStoreExt,
    Result as ObjectResult,
};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;

/// S3 storage implementation
#[derive(Clone)]
pub struct S3Storage {
    store: AmazonS3,
    bucket: String,
}

/// Explicit credentials for the backing store; falls back to the AWS
/// environment when absent.
#[derive(Clone, Debug, Default)]
pub struct S3Credentials {
    pub access_key_id: String,
    pub secret_access_key: String,
}

fn strip_quotes(tag: &str) -> String {
    tag.trim_matches('"').to_string()
}

fn info_from_meta(meta: &ObjectMeta, content_type: Option<String>) -> ObjectInfo {
    ObjectInfo {
        key: meta.location.to_string(),
        size: meta.size,
        e_tag: meta.e_tag.as_deref().map(strip_quotes),
        last_modified: meta.last_modified,
        content_type,
    }
}

fn content_type_of(result: &GetResult) -> Option<String> {
    result.attributes.get(&Attribute::ContentType).map(|v| {
        let value: &str = v.as_ref();
        value.to_string()
    })
}

impl S3Storage {
    /// Create a new S3Storage instance
    ///
    /// # Arguments
    /// * `bucket` - S3 bucket name
    /// * `region` - AWS region (or region identifier for S3-compatible providers)
    /// * `endpoint_url` - Optional custom endpoint URL for S3-compatible providers
    ///   (e.g., "http://localhost:9000" for MinIO)
    pub async fn new(
        bucket: String,
        region: String,
        endpoint_url: Option<String>,
        credentials: Option<S3Credentials>,
    ) -> StorageResult<Self> {
        let mut builder = AmazonS3Builder::from_env()
            .with_region(region)
            .with_bucket_name(bucket.clone());

        if let Some(ref endpoint) = endpoint_url {
            let allow_http = endpoint.starts_with("http://");
            builder = builder
                .with_endpoint(endpoint.clone())
                .with_allow_http(allow_http);
        }

        if let Some(credentials) = credentials {
            builder = builder
                .with_access_key_id(credentials.access_key_id)
                .with_secret_access_key(credentials.secret_access_key);
        }

        let store = builder
            .build()
            .map_err(|e| StorageError::ConfigError(e.to_string()))?;

        Ok(S3Storage { store, bucket })
    }

    fn map_read_error(&self, err: ObjectStoreError, key: &str) -> StorageError {
        match err {
            ObjectStoreError::NotFound { .. } => StorageError::NotFound(key.to_string()),
            e => StorageError::DownloadFailed(e.to_string()),
        }
    }
}

#[async_trait]
impl Storage for S3Storage {
    /// Bodies under the writer's buffer capacity go up in one request,
    /// larger ones as a multipart upload.
    async fn put_stream(
        &self,
        key: &str,
        mut reader: ByteReader,
        content_type: &str,
    ) -> StorageResult<ObjectInfo> {
        let mut attributes = Attributes::new();
        attributes.insert(Attribute::ContentType, content_type.to_string().into());

        let store: Arc<dyn ObjectStore> = Arc::new(self.store.clone());
        let mut writer = BufWriter::new(store, Path::from(key)).with_attributes(attributes);

        let start = std::time::Instant::now();

        let copied = match tokio::io::copy(&mut reader, &mut writer).await {
            Ok(written) => writer.shutdown().await.map(|()| written),
            Err(e) => Err(e),
        };

        let size = match copied {
            Ok(written) => written,
            Err(e) => {
                if let Err(abort) = writer.abort().await {
                    tracing::warn!(error = %abort, key = %key, "Failed to abort S3 upload");
                }
                tracing::error!(
                    error = %e,
                    bucket = %self.bucket,
                    key = %key,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "S3 upload failed"
                );
                return Err(StorageError::UploadFailed(e.to_string()));
            }
        };

        tracing::info!(
            bucket = %self.bucket,
            key = %key,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 upload successful"
        );

        // The writer does not surface the entity tag.
        let mut info = self.head(key).await?;
        info.size = size;
        Ok(info)
    }

    async fn get(&self, key: &str) -> StorageResult<(ObjectInfo, ByteStream)> {
        let location = Path::from(key);

        let result: ObjectResult<GetResult> = self.store.get(&location).await;
        let result = result.map_err(|e| self.map_read_error(e, key))?;

        let info = info_from_meta(&result.meta, content_type_of(&result));
        let stream = result
            .into_stream()
            .map(|chunk| chunk.map_err(|e| StorageError::DownloadFailed(e.to_string())));

        tracing::debug!(
            bucket = %self.bucket,
            key = %key,
            size_bytes = info.size,
            "S3 download started"
        );

        Ok((info, Box::pin(stream)))
    }

    async fn head(&self, key: &str) -> StorageResult<ObjectInfo> {
        let location = Path::from(key);
        let options = GetOptions {
            head: true,
            ..Default::default()
        };

        // A HEAD-style get carries the stored attributes, a plain head does not.
        let result: ObjectResult<GetResult> = self.store.get_opts(&location, options).await;
        let result = result.map_err(|e| self.map_read_error(e, key))?;
        Ok(info_from_meta(&result.meta, content_type_of(&result)))
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        let location = Path::from(key);
        let start = std::time::Instant::now();

        let result: ObjectResult<_> = self.store.delete(&location).await;
        match result {
            Ok(()) | Err(ObjectStoreError::NotFound { .. }) => {
                tracing::info!(
                    bucket = %self.bucket,
                    key = %key,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "S3 delete successful"
                );
                Ok(())
            }
            Err(e) => {
                tracing::error!(error = %e, bucket = %self.bucket, key = %key, "S3 delete failed");
                Err(StorageError::DeleteFailed(e.to_string()))
            }
        }
    }

    async fn list(&self, prefix: &str) -> StorageResult<Vec<ObjectInfo>> {
        // object_store lists by path segment; narrow to the enclosing
        // directory and apply the raw string prefix afterwards.
        let dir = prefix.rfind('/').map(|idx| &prefix[..idx]).unwrap_or("");
        let dir_path = Path::from(dir);
        let list_prefix = if dir.is_empty() { None } else { Some(&dir_path) };

        let metas: Vec<ObjectMeta> = self
            .store
            .list(list_prefix)
            .try_collect()
            .await
            .map_err(|e| StorageError::BackendError(e.to_string()))?;

        let mut objects: Vec<ObjectInfo> = metas
            .iter()
            .filter(|meta| meta.location.as_ref().starts_with(prefix))
            .map(|meta| info_from_meta(meta, None))
            .collect();
        objects.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(objects)
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::S3
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_quotes() {
        assert_eq!(strip_quotes("\"abc\""), "abc");
        assert_eq!(strip_quotes("abc"), "abc");
    }
}
