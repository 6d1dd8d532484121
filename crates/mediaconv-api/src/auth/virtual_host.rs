//! Virtual-hosted-style addressing
//!
//! `GET http://{bucket}.{domain}/{key}` is rewritten to `/{bucket}/{key}`
//! before the router sees it. The client signed the original URI, so it is
//! kept in a [`SignedUri`] extension for the auth middleware.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{header::HOST, Uri},
    middleware::Next,
    response::Response,
};

/// The URI exactly as the client sent it.
#[derive(Debug, Clone)]
pub struct SignedUri(pub Uri);

/// Base domain for virtual-hosted buckets; `None` disables the rewrite.
pub type VirtualHostDomain = Option<Arc<str>>;

/// Bucket label of `host` when it is `{bucket}.{domain}`. The port is
/// ignored and the bucket must be a single non-empty label.
pub fn virtual_host_bucket<'a>(host: &'a str, domain: &str) -> Option<&'a str> {
    let host = host.split(':').next().unwrap_or(host);
    let bucket = host.strip_suffix(domain)?.strip_suffix('.')?;
    if bucket.is_empty() || bucket.contains('.') {
        return None;
    }
    Some(bucket)
}

/// `/{key}?query` becomes `/{bucket}/{key}?query`; the root maps to the bucket.
pub fn rewrite_uri(uri: &Uri, bucket: &str) -> Option<Uri> {
    let path = match uri.path() {
        "" | "/" => format!("/{}", bucket),
        path => format!("/{}{}", bucket, path),
    };
    let path_and_query = match uri.query() {
        Some(query) => format!("{}?{}", path, query),
        None => path,
    };
    path_and_query.parse().ok()
}

pub async fn virtual_host_middleware(
    State(domain): State<VirtualHostDomain>,
    mut request: Request,
    next: Next,
) -> Response {
    let Some(domain) = domain else {
        return next.run(request).await;
    };

    let bucket = request
        .headers()
        .get(HOST)
        .and_then(|h| h.to_str().ok())
        .and_then(|host| virtual_host_bucket(host, &domain))
        .map(str::to_string);

    if let Some(bucket) = bucket {
        if let Some(rewritten) = rewrite_uri(request.uri(), &bucket) {
            tracing::debug!(bucket = %bucket, path = %rewritten.path(), "Virtual-host request rewritten");
            let original = std::mem::replace(request.uri_mut(), rewritten);
            request.extensions_mut().insert(SignedUri(original));
        }
    }

    next.run(request).await
}
