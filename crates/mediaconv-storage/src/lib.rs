//! Mediaconv Storage Library
//!
//! Object storage abstraction behind the S3 gateway and the worker, with
//! implementations for S3-compatible stores and the local filesystem.
//!
//! # Storage key format
//!
//! Every client object lives under its owner's namespace:
//!
//! - **Uploads**: `users/{user_id}/{client_key}`
//! - **Job outputs**: `users/{user_id}/results/job-{job_id}/{filename}`
//!
//! Keys must not contain `..` or a leading `/`. Key construction is
//! centralized in the `keys` module so the gateway and the worker agree.

pub mod factory;
pub mod keys;
#[cfg(feature = "storage-local")]
pub mod local;
#[cfg(feature = "storage-s3")]
pub mod s3;
pub mod traits;

// Re-export commonly used types
pub use factory::create_storage;
#[cfg(feature = "storage-local")]
pub use local::LocalStorage;
pub use mediaconv_core::StorageBackend;
#[cfg(feature = "storage-s3")]
pub use s3::S3Storage;
pub use traits::{
    content_type_for, ByteReader, ByteStream, ObjectInfo, Storage, StorageError, StorageResult,
};

impl From<StorageError> for mediaconv_core::AppError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(key) => {
                mediaconv_core::AppError::NotFound(format!("object not found: {}", key))
            }
            StorageError::InvalidKey(msg) => mediaconv_core::AppError::Validation(msg),
            other => mediaconv_core::AppError::Storage(other.to_string()),
        }
    }
}
