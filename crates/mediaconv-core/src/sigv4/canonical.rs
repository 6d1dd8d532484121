//! Canonical request construction.

use http::HeaderMap;
use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

use super::{CONTENT_SHA256_HEADER, SIGNATURE_PARAM, UNSIGNED_PAYLOAD};

/// Everything except the RFC 3986 unreserved characters.
const URI_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

pub fn uri_encode(value: &str) -> String {
    utf8_percent_encode(value, URI_ENCODE_SET).to_string()
}

/// Encodes an object key for use in a path, leaving `/` separators intact.
pub fn encode_path(key: &str) -> String {
    key.split('/').map(uri_encode).collect::<Vec<_>>().join("/")
}

pub fn canonical_uri(path: &str) -> String {
    if path.is_empty() {
        "/".to_string()
    } else {
        path.to_string()
    }
}

/// Decodes a raw query string into (key, value) pairs, in order.
/// `+` decodes to a space and a bare key gets an empty value.
pub fn parse_query(raw: &str) -> Vec<(String, String)> {
    raw.split('&')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let (k, v) = part.split_once('=').unwrap_or((part, ""));
            (decode_component(k), decode_component(v))
        })
        .collect()
}

fn decode_component(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    percent_decode_str(&spaced).decode_utf8_lossy().into_owned()
}

pub fn query_param<'a>(pairs: &'a [(String, String)], name: &str) -> Option<&'a str> {
    pairs
        .iter()
        .find(|(k, _)| k == name)
        .map(|(_, v)| v.as_str())
}

pub fn canonical_query(mut pairs: Vec<(String, String)>, presigned: bool) -> String {
    if presigned {
        pairs.retain(|(k, _)| k != SIGNATURE_PARAM);
    }
    pairs.sort();
    pairs
        .iter()
        .map(|(k, v)| format!("{}={}", uri_encode(k), uri_encode(v)))
        .collect::<Vec<_>>()
        .join("&")
}

/// Returns the canonical header block (one `name:value\n` line per header)
/// and the `;`-joined signed header list.
pub fn canonical_headers(
    headers: &HeaderMap,
    host: &str,
    signed_headers: &[String],
) -> (String, String) {
    let mut entries: Vec<(String, String)> = Vec::new();

    for name in signed_headers {
        let name = name.trim().to_lowercase();
        if name.is_empty() || entries.iter().any(|(n, _)| *n == name) {
            continue;
        }
        if name == "host" {
            entries.push((name, host.to_string()));
            continue;
        }
        let values: Vec<String> = headers
            .get_all(name.as_str())
            .iter()
            .map(|v| String::from_utf8_lossy(v.as_bytes()).trim().to_string())
            .collect();
        if !values.is_empty() {
            entries.push((name, values.join(",")));
        }
    }

    entries.sort();

    let block: String = entries
        .iter()
        .map(|(name, value)| format!("{}:{}\n", name, value))
        .collect();
    let names = entries
        .iter()
        .map(|(name, _)| name.as_str())
        .collect::<Vec<_>>()
        .join(";");
    (block, names)
}

pub fn payload_hash(headers: &HeaderMap) -> String {
    headers
        .get(CONTENT_SHA256_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .unwrap_or(UNSIGNED_PAYLOAD)
        .to_string()
}

pub fn canonical_request(
    method: &str,
    uri: &str,
    query: &str,
    headers: &str,
    signed_headers: &str,
    payload_hash: &str,
) -> String {
    format!(
        "{}\n{}\n{}\n{}\n{}\n{}",
        method, uri, query, headers, signed_headers, payload_hash
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;

    #[test]
    fn test_canonical_uri_defaults_to_slash() {
        assert_eq!(canonical_uri(""), "/");
        assert_eq!(canonical_uri("/bucket/key"), "/bucket/key");
    }

    #[test]
    fn test_canonical_query_sorts_and_repeats() {
        let pairs = parse_query("b=2&a=z&a=y&flag&c=hello+world");
        assert_eq!(
            canonical_query(pairs, false),
            "a=y&a=z&b=2&c=hello%20world&flag="
        );
    }

    #[test]
    fn test_canonical_query_drops_signature_when_presigned() {
        let raw = "X-Amz-Signature=abc&X-Amz-Date=20240101T000000Z";
        assert_eq!(
            canonical_query(parse_query(raw), true),
            "X-Amz-Date=20240101T000000Z"
        );
        assert_eq!(
            canonical_query(parse_query(raw), false),
            "X-Amz-Date=20240101T000000Z&X-Amz-Signature=abc"
        );
    }

    #[test]
    fn test_canonical_query_encodes_reserved() {
        let pairs = vec![("prefix".to_string(), "a/b c~d".to_string())];
        assert_eq!(canonical_query(pairs, false), "prefix=a%2Fb%20c~d");
    }

    #[test]
    fn test_canonical_headers() {
        let mut headers = HeaderMap::new();
        headers.insert("x-amz-date", HeaderValue::from_static("20240101T000000Z"));
        headers.append("x-custom", HeaderValue::from_static("one"));
        headers.append("x-custom", HeaderValue::from_static("two"));

        let signed = vec![
            "X-Custom".to_string(),
            "host".to_string(),
            "x-amz-date".to_string(),
            "x-absent".to_string(),
        ];
        let (block, names) = canonical_headers(&headers, "gw.local:8080", &signed);
        assert_eq!(
            block,
            "host:gw.local:8080\nx-amz-date:20240101T000000Z\nx-custom:one,two\n"
        );
        assert_eq!(names, "host;x-amz-date;x-custom");
    }

    #[test]
    fn test_payload_hash_default() {
        let mut headers = HeaderMap::new();
        assert_eq!(payload_hash(&headers), "UNSIGNED-PAYLOAD");
        headers.insert(CONTENT_SHA256_HEADER, HeaderValue::from_static("abc123"));
        assert_eq!(payload_hash(&headers), "abc123");
    }

    #[test]
    fn test_encode_path_keeps_separators() {
        assert_eq!(encode_path("videos/my clip.mp4"), "videos/my%20clip.mp4");
    }
}
