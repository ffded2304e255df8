use http::HeaderMap;
use http::header::{ACCESS_CONTROL_ALLOW_ORIGIN, ACCESS_CONTROL_MAX_AGE, HeaderName, HeaderValue};

pub use modproxy_api::cache::CACHE_STATUS_HEADER;

/// Signals an implicit or deprecated resolution back to the requesting tool.
pub const WARNING_HEADER: &str = "x-deno-warning";

pub const IMMUTABLE: &str = "public, max-age=31536000, immutable";
pub const NO_CACHE: &str = "no-cache";
pub const NO_STORE: &str = "no-store";

/// Upstream headers that survive into the outbound response.
pub const FORWARDED: [&str; 6] = [
    "content-type",
    "date",
    "cache-control",
    "last-modified",
    "etag",
    CACHE_STATUS_HEADER,
];

pub fn apply_cors(headers: &mut HeaderMap) {
    headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
}

pub fn apply_cors_max_age(headers: &mut HeaderMap) {
    headers.insert(ACCESS_CONTROL_MAX_AGE, HeaderValue::from_static("86400"));
}

/// Insert a dynamic header, dropping values that are not valid header text.
pub fn insert_text(headers: &mut HeaderMap, name: &'static str, value: &str) {
    match HeaderValue::from_str(value) {
        Ok(value) => {
            headers.insert(HeaderName::from_static(name), value);
        }
        Err(_) => tracing::warn!("Dropping invalid {} header value: {:?}", name, value),
    }
}
