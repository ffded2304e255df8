//! Outcome -> outbound HTTP response.

use crate::headers::{self, FORWARDED, IMMUTABLE, NO_CACHE, NO_STORE, WARNING_HEADER};
use crate::outcome::{Cacheability, Outcome};
use bytes::Bytes;
use http::header::{
    ALLOW, CACHE_CONTROL, CONTENT_LENGTH, CONTENT_TYPE, HeaderValue, LOCATION, VARY,
};
use http::{HeaderMap, Response, StatusCode};

const TEXT_PLAIN: &str = "text/plain; charset=utf-8";
const JSON: &str = "application/json; charset=utf-8";

/// Build the outbound response. For `HEAD` the body is dropped but the
/// headers, including `content-length`, are kept.
pub fn assemble(outcome: Outcome, head: bool) -> Response<Bytes> {
    let (status, headers, body) = match outcome {
        Outcome::Content { id, response } => {
            let mut headers = HeaderMap::new();
            for name in FORWARDED {
                for value in response.headers.get_all(name) {
                    headers.append(name, value.clone());
                }
            }
            let cache = if id.is_pinned() {
                Cacheability::Immutable
            } else {
                Cacheability::NoStore
            };
            set_cache_control(&mut headers, cache);
            registry_headers(&mut headers);
            (response.status, headers, response.body)
        }
        Outcome::Redirect {
            status,
            location,
            warning,
            cache,
        } => {
            let mut headers = HeaderMap::new();
            headers::insert_text(&mut headers, "location", &location);
            if let Some(warning) = warning {
                headers::insert_text(&mut headers, WARNING_HEADER, &warning);
            }
            set_cache_control(&mut headers, cache);
            registry_headers(&mut headers);
            if !headers.contains_key(LOCATION) {
                return plain(StatusCode::INTERNAL_SERVER_ERROR, "Invalid redirect target", head);
            }
            (status, headers, Bytes::new())
        }
        Outcome::NotFound { message, warning } => {
            let mut headers = text_headers();
            if let Some(warning) = warning {
                headers::insert_text(&mut headers, WARNING_HEADER, &warning);
            }
            registry_headers(&mut headers);
            (StatusCode::NOT_FOUND, headers, Bytes::from(message))
        }
        Outcome::BadRequest { message } => {
            let mut headers = text_headers();
            registry_headers(&mut headers);
            (StatusCode::BAD_REQUEST, headers, Bytes::from(message))
        }
        Outcome::Json { body, cache } => {
            let mut headers = HeaderMap::new();
            headers.insert(CONTENT_TYPE, HeaderValue::from_static(JSON));
            set_cache_control(&mut headers, cache);
            registry_headers(&mut headers);
            let body = serde_json::to_vec(&body).unwrap_or_default();
            (StatusCode::OK, headers, Bytes::from(body))
        }
        Outcome::UpstreamFailure { status, message } => {
            let mut headers = text_headers();
            registry_headers(&mut headers);
            (status, headers, Bytes::from(message))
        }
        Outcome::MethodNotAllowed => {
            let mut headers = text_headers();
            headers.insert(ALLOW, HeaderValue::from_static("GET, HEAD"));
            (
                StatusCode::METHOD_NOT_ALLOWED,
                headers,
                Bytes::from_static(b"Method Not Allowed"),
            )
        }
        Outcome::Cancelled => return plain(StatusCode::SERVICE_UNAVAILABLE, "Request cancelled", head),
        Outcome::NotRegistry => return plain(StatusCode::NOT_FOUND, "Not Found", head),
    };

    finish(status, headers, body, head)
}

fn plain(status: StatusCode, message: &'static str, head: bool) -> Response<Bytes> {
    finish(status, text_headers(), Bytes::from_static(message.as_bytes()), head)
}

fn finish(status: StatusCode, mut headers: HeaderMap, body: Bytes, head: bool) -> Response<Bytes> {
    let body = if head {
        headers.insert(CONTENT_LENGTH, HeaderValue::from(body.len()));
        Bytes::new()
    } else {
        body
    };

    let mut response = Response::new(body);
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    response
}

fn text_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static(TEXT_PLAIN));
    headers.insert(CACHE_CONTROL, HeaderValue::from_static(NO_STORE));
    headers
}

fn registry_headers(headers: &mut HeaderMap) {
    headers::apply_cors(headers);
    headers::apply_cors_max_age(headers);
    headers.insert(VARY, HeaderValue::from_static("Accept"));
}

fn set_cache_control(headers: &mut HeaderMap, cache: Cacheability) {
    let value = match cache {
        Cacheability::Immutable => IMMUTABLE,
        Cacheability::Revalidate => NO_CACHE,
        Cacheability::NoStore => NO_STORE,
    };
    headers.insert(CACHE_CONTROL, HeaderValue::from_static(value));
}
