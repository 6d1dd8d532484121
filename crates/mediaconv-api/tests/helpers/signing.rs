//! SigV4 request signing for tests, the way an S3 SDK would sign.

use axum::http::{header::HOST, HeaderMap, HeaderName, HeaderValue, Method, Uri};
use chrono::{DateTime, Utc};
use mediaconv_core::sigv4::{
    compute_signature, presign_url, PresignParams, SignableRequest, SignatureDescriptor,
    CONTENT_SHA256_HEADER, DATE_HEADER, UNSIGNED_PAYLOAD,
};

use super::TEST_HOST;

/// Headers to attach to a request for `path_and_query`, signed with
/// `secret_key`.
pub fn signed_headers(
    method: Method,
    path_and_query: &str,
    access_key: &str,
    secret_key: &str,
    now: DateTime<Utc>,
) -> Vec<(HeaderName, HeaderValue)> {
    let uri: Uri = path_and_query.parse().expect("valid uri");
    let timestamp = now.format("%Y%m%dT%H%M%SZ").to_string();

    let mut headers = HeaderMap::new();
    headers.insert(HOST, HeaderValue::from_static(TEST_HOST));
    headers.insert(
        CONTENT_SHA256_HEADER,
        HeaderValue::from_static(UNSIGNED_PAYLOAD),
    );
    headers.insert(DATE_HEADER, HeaderValue::from_str(&timestamp).unwrap());

    let unsigned = format!(
        "AWS4-HMAC-SHA256 Credential={}/{}/us-east-1/s3/aws4_request, SignedHeaders=host;x-amz-content-sha256;x-amz-date, Signature=",
        access_key,
        now.format("%Y%m%d")
    );
    let descriptor = SignatureDescriptor::from_authorization_header(&format!("{}00", unsigned))
        .expect("valid authorization header");
    let signature = compute_signature(
        &SignableRequest::new(&method, &uri, &headers),
        &descriptor,
        secret_key,
    );

    vec![
        (HOST, HeaderValue::from_static(TEST_HOST)),
        (
            HeaderName::from_static(CONTENT_SHA256_HEADER),
            HeaderValue::from_static(UNSIGNED_PAYLOAD),
        ),
        (
            HeaderName::from_static(DATE_HEADER),
            HeaderValue::from_str(&timestamp).unwrap(),
        ),
        (
            HeaderName::from_static("authorization"),
            HeaderValue::from_str(&format!("{}{}", unsigned, signature)).unwrap(),
        ),
    ]
}

/// Path and query of a presigned GET URL for `bucket/key`.
pub fn presigned_path(
    bucket: &str,
    key: &str,
    access_key: &str,
    secret_key: &str,
    expires_in_secs: i64,
    now: DateTime<Utc>,
) -> String {
    let endpoint = format!("http://{}", TEST_HOST);
    let url = presign_url(&PresignParams {
        method: "GET",
        endpoint: &endpoint,
        bucket,
        key,
        access_key,
        secret_key,
        region: None,
        expires_in_secs,
        now,
    })
    .expect("presign");
    url.strip_prefix(&endpoint)
        .expect("url starts with endpoint")
        .to_string()
}
