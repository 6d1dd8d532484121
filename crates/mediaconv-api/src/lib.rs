//! Mediaconv gateway
//!
//! An S3-compatible HTTP surface over the shared object store. Uploads land
//! under the caller's key namespace, and an `X-Amz-Meta-Pipeline` header
//! starts a conversion job for the uploaded file.

pub mod auth;
pub mod error;
pub mod handlers;
pub mod setup;
pub mod state;
pub mod xml;

pub use error::HttpAppError;
pub use state::{AppState, ObjectState};
