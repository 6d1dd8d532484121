use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{HeaderMap, Method, Uri},
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use mediaconv_core::sigv4::{self, SignableRequest, SignatureDescriptor};
use mediaconv_core::{AppError, AppResult};
use mediaconv_db::CredentialRepository;

use super::virtual_host::SignedUri;
use crate::error::HttpAppError;

/// Identity attached to an authenticated gateway request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayContext {
    pub user_id: i64,
    pub credential_id: i64,
    pub bucket: String,
}

/// Resolves the access key to an active credential and checks the signature
/// with its secret.
#[derive(Clone)]
pub struct GatewayAuthenticator {
    credentials: Arc<dyn CredentialRepository>,
}

impl GatewayAuthenticator {
    pub fn new(credentials: Arc<dyn CredentialRepository>) -> Self {
        Self { credentials }
    }

    /// `uri` must be the URI the client signed, before any virtual-host
    /// rewrite. `target_bucket` is the bucket the request addresses, if any.
    pub async fn authenticate(
        &self,
        method: &Method,
        uri: &Uri,
        headers: &HeaderMap,
        target_bucket: Option<&str>,
        now: DateTime<Utc>,
    ) -> AppResult<GatewayContext> {
        let descriptor = SignatureDescriptor::from_request(uri.query(), headers)?;

        let credential = self
            .credentials
            .find_active_by_access_key(&descriptor.access_key)
            .await?
            .ok_or_else(|| AppError::Authentication("unknown access key".to_string()))?;

        let request = SignableRequest::new(method, uri, headers);
        sigv4::verify(&request, &descriptor, &credential.secret_key, now)?;

        if let Some(bucket) = target_bucket {
            if bucket != credential.bucket_name {
                tracing::warn!(
                    credential_id = credential.id,
                    requested_bucket = %bucket,
                    "Bucket does not belong to credential"
                );
                return Err(AppError::Forbidden(
                    "Access denied to this bucket".to_string(),
                ));
            }
        }

        Ok(GatewayContext {
            user_id: credential.user_id,
            credential_id: credential.id,
            bucket: credential.bucket_name,
        })
    }
}

/// First path segment, the bucket of a path-style request.
pub fn target_bucket(path: &str) -> Option<&str> {
    path.trim_start_matches('/')
        .split('/')
        .next()
        .filter(|segment| !segment.is_empty())
}

/// Authenticates the request and inserts a [`GatewayContext`] extension.
pub async fn gateway_auth_middleware(
    State(authenticator): State<Arc<GatewayAuthenticator>>,
    mut request: Request,
    next: Next,
) -> Response {
    let signed_uri = request
        .extensions()
        .get::<SignedUri>()
        .map(|signed| signed.0.clone())
        .unwrap_or_else(|| request.uri().clone());
    let bucket = target_bucket(request.uri().path()).map(str::to_string);

    let result = authenticator
        .authenticate(
            request.method(),
            &signed_uri,
            request.headers(),
            bucket.as_deref(),
            Utc::now(),
        )
        .await;

    match result {
        Ok(context) => {
            tracing::debug!(
                user_id = context.user_id,
                credential_id = context.credential_id,
                "Request authenticated"
            );
            request.extensions_mut().insert(context);
            next.run(request).await
        }
        Err(e) => HttpAppError(e).into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{header::HOST, HeaderValue};
    use chrono::TimeZone;
    use mediaconv_core::models::NewCredential;
    use mediaconv_core::sigv4::{compute_signature, CONTENT_SHA256_HEADER, DATE_HEADER};
    use mediaconv_db::InMemoryCatalog;

    const ACCESS_KEY: &str = "AKIATESTKEY000000001";
    const SECRET: &str = "test-secret";

    async fn authenticator() -> GatewayAuthenticator {
        let catalog = InMemoryCatalog::new();
        CredentialRepository::create(
            &catalog,
            NewCredential {
                user_id: 9,
                access_key: ACCESS_KEY.to_string(),
                secret_key: SECRET.to_string(),
                bucket_name: "media-abc".to_string(),
            },
        )
        .await
        .unwrap();
        GatewayAuthenticator::new(Arc::new(catalog))
    }

    fn signed_headers(method: &Method, uri: &Uri, now: DateTime<Utc>, secret: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(HOST, HeaderValue::from_static("localhost:8080"));
        headers.insert(
            CONTENT_SHA256_HEADER,
            HeaderValue::from_static("UNSIGNED-PAYLOAD"),
        );
        let timestamp = now.format("%Y%m%dT%H%M%SZ").to_string();
        headers.insert(DATE_HEADER, HeaderValue::from_str(&timestamp).unwrap());

        let date = now.format("%Y%m%d").to_string();
        let unsigned = format!(
            "AWS4-HMAC-SHA256 Credential={}/{}/us-east-1/s3/aws4_request, SignedHeaders=host;x-amz-content-sha256;x-amz-date, Signature=00",
            ACCESS_KEY, date
        );
        let descriptor = SignatureDescriptor::from_authorization_header(&unsigned).unwrap();
        let signature = compute_signature(
            &SignableRequest::new(method, uri, &headers),
            &descriptor,
            secret,
        );
        let header = unsigned.replace("Signature=00", &format!("Signature={}", signature));
        headers.insert("authorization", HeaderValue::from_str(&header).unwrap());
        headers
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn test_valid_signature_resolves_context() {
        let auth = authenticator().await;
        let uri: Uri = "/media-abc/photo.png".parse().unwrap();
        let headers = signed_headers(&Method::GET, &uri, now(), SECRET);

        let context = auth
            .authenticate(&Method::GET, &uri, &headers, Some("media-abc"), now())
            .await
            .unwrap();
        assert_eq!(context.user_id, 9);
        assert_eq!(context.bucket, "media-abc");
    }

    #[tokio::test]
    async fn test_wrong_secret_is_rejected() {
        let auth = authenticator().await;
        let uri: Uri = "/media-abc/photo.png".parse().unwrap();
        let headers = signed_headers(&Method::GET, &uri, now(), "not-the-secret");

        let err = auth
            .authenticate(&Method::GET, &uri, &headers, Some("media-abc"), now())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Authentication(_)));
    }

    #[tokio::test]
    async fn test_other_bucket_is_forbidden() {
        let auth = authenticator().await;
        let uri: Uri = "/someone-else/photo.png".parse().unwrap();
        let headers = signed_headers(&Method::GET, &uri, now(), SECRET);

        let err = auth
            .authenticate(&Method::GET, &uri, &headers, Some("someone-else"), now())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }

    #[tokio::test]
    async fn test_unknown_access_key_is_rejected() {
        let auth = GatewayAuthenticator::new(Arc::new(InMemoryCatalog::new()));
        let uri: Uri = "/media-abc/photo.png".parse().unwrap();
        let headers = signed_headers(&Method::GET, &uri, now(), SECRET);

        let err = auth
            .authenticate(&Method::GET, &uri, &headers, None, now())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Authentication(_)));
    }

    #[test]
    fn test_target_bucket() {
        assert_eq!(target_bucket("/media-abc/a/b.png"), Some("media-abc"));
        assert_eq!(target_bucket("/media-abc"), Some("media-abc"));
        assert_eq!(target_bucket("/"), None);
    }
}
