use crate::error::TransportResult;
use async_trait::async_trait;
use bytes::Bytes;
use http::{HeaderMap, StatusCode};

/// A single GET against the object-storage origin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OriginRequest {
    pub url: String,
    /// Entity tag of a cached copy, sent as `If-None-Match` when revalidating.
    pub if_none_match: Option<String>,
}

impl OriginRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            if_none_match: None,
        }
    }

    pub fn revalidate(url: impl Into<String>, etag: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            if_none_match: Some(etag.into()),
        }
    }
}

/// A fully buffered origin response.
#[derive(Debug, Clone)]
pub struct OriginResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl OriginResponse {
    pub fn new(status: StatusCode, headers: HeaderMap, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers,
            body: body.into(),
        }
    }
}

/// Service interface for the immutable object-storage backend
#[async_trait]
pub trait Origin: Send + Sync {
    /// Perform one GET. Only transport-level failures are errors; every HTTP
    /// status the origin answers with is returned as a response.
    async fn get(&self, request: &OriginRequest) -> TransportResult<OriginResponse>;
}
