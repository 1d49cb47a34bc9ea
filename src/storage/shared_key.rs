use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use url::Url;

use super::StorageError;

type HmacSha256 = Hmac<Sha256>;

/// Storage service API version sent with every request
pub const MS_VERSION: &str = "2019-02-02";

/// RFC 1123 date as required by `x-ms-date`
pub fn ms_date(at: DateTime<Utc>) -> String {
    at.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

/// `/{account}{path}` plus `?comp=` when present
pub fn canonicalized_resource(account: &str, url: &Url) -> String {
    let mut resource = format!("/{}{}", account, url.path());
    if let Some((_, comp)) = url.query_pairs().find(|(k, _)| k == "comp") {
        resource.push_str("?comp=");
        resource.push_str(&comp);
    }
    resource
}

/// Queue service SharedKeyLite string-to-sign. `x-ms-date` is always sent, so
/// the Date line stays empty.
pub fn queue_string_to_sign(
    method: &str,
    content_type: &str,
    ms_headers: &[(&str, &str)],
    canonicalized_resource: &str,
) -> String {
    let mut headers: Vec<(String, &str)> = ms_headers
        .iter()
        .map(|(name, value)| (name.to_ascii_lowercase(), value.trim()))
        .filter(|(name, _)| name.starts_with("x-ms-"))
        .collect();
    headers.sort_by(|a, b| a.0.cmp(&b.0));

    let mut canonicalized_headers = String::new();
    for (name, value) in headers {
        canonicalized_headers.push_str(&name);
        canonicalized_headers.push(':');
        canonicalized_headers.push_str(value);
        canonicalized_headers.push('\n');
    }

    format!(
        "{}\n\n{}\n\n{}{}",
        method, content_type, canonicalized_headers, canonicalized_resource
    )
}

/// Table service SharedKeyLite string-to-sign
pub fn table_string_to_sign(ms_date: &str, canonicalized_resource: &str) -> String {
    format!("{}\n{}", ms_date, canonicalized_resource)
}

/// `Authorization` header value for a string-to-sign
pub fn authorization(
    account: &str,
    key: &[u8],
    string_to_sign: &str,
) -> Result<String, StorageError> {
    let mut mac =
        HmacSha256::new_from_slice(key).map_err(|e| StorageError::Signing(e.to_string()))?;
    mac.update(string_to_sign.as_bytes());
    let signature = STANDARD.encode(mac.finalize().into_bytes());
    Ok(format!("SharedKeyLite {}:{}", account, signature))
}
