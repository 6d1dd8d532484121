//! S3 XML bodies.

use chrono::{DateTime, SecondsFormat, Utc};

const S3_NAMESPACE: &str = "http://s3.amazonaws.com/doc/2006-03-01/";

#[derive(Debug, Clone)]
pub struct ListEntry {
    pub key: String,
    pub last_modified: DateTime<Utc>,
    pub etag: String,
    pub size: u64,
}

pub fn list_bucket_result(bucket: &str, prefix: &str, entries: &[ListEntry]) -> String {
    let mut body = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>");
    body.push_str(&format!("<ListBucketResult xmlns=\"{}\">", S3_NAMESPACE));
    body.push_str(&format!("<Name>{}</Name>", escape(bucket)));
    body.push_str(&format!("<Prefix>{}</Prefix>", escape(prefix)));
    for entry in entries {
        body.push_str(&format!(
            "<Contents><Key>{}</Key><LastModified>{}</LastModified><ETag>&quot;{}&quot;</ETag><Size>{}</Size><StorageClass>STANDARD</StorageClass></Contents>",
            escape(&entry.key),
            entry.last_modified.to_rfc3339_opts(SecondsFormat::Millis, true),
            escape(&entry.etag),
            entry.size
        ));
    }
    body.push_str("</ListBucketResult>");
    body
}

fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c => out.push(c),
        }
    }
    out
}
