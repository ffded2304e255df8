//! Fetch-through-cache primitive shared by every stage that talks to origin.

pub mod content_type;

use crate::cache::{CacheEntry, ResponseCache};
use crate::config::{CacheConfig, FetchConfig};
use crate::headers::{self, CACHE_STATUS_HEADER};
use bytes::Bytes;
use dashmap::DashMap;
use http::header::{HeaderName, HeaderValue};
use http::{HeaderMap, StatusCode};
use modproxy_api::{CacheStatus, Origin, OriginRequest, OriginResponse, TransportError};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("origin unreachable after {attempts} attempts: {source}")]
    Exhausted {
        attempts: u32,
        #[source]
        source: TransportError,
    },
    #[error("origin document could not be decoded: {source}")]
    Decode {
        #[source]
        source: serde_json::Error,
    },
    #[error("request cancelled")]
    Cancelled,
}

/// How a URL may be served from cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CachePolicy {
    /// Published content: a cached copy is served without contacting origin
    Immutable,
    /// Mutable metadata: a cached copy is revalidated with `If-None-Match`
    Revalidate,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FetchedResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
    pub cache_status: CacheStatus,
}

impl FetchedResponse {
    fn from_entry(entry: CacheEntry, cache_status: CacheStatus) -> Self {
        let mut response = Self {
            status: entry.status,
            headers: entry.headers,
            body: entry.body,
            cache_status,
        };
        response.mark(cache_status);
        response
    }

    fn mark(&mut self, cache_status: CacheStatus) {
        self.cache_status = cache_status;
        self.headers.insert(
            HeaderName::from_static(CACHE_STATUS_HEADER),
            HeaderValue::from_static(cache_status.as_str()),
        );
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T, FetchError> {
        serde_json::from_slice(&self.body).map_err(|source| FetchError::Decode { source })
    }
}

/// Origin answers, classified.
#[derive(Debug, Clone)]
pub enum FetchOutcome {
    Found(FetchedResponse),
    /// Origin said 403 or 404; the two are indistinguishable to clients
    NotFound,
    /// Any other non-success status
    Upstream(StatusCode),
}

/// One in-flight origin fetch and the requests queued behind it.
#[derive(Default)]
struct Flight {
    lock: tokio::sync::Mutex<()>,
    /// Requests holding this flight; only changed under the map's shard lock
    members: AtomicUsize,
}

/// Leaves a flight on drop, including when the request future is dropped
/// mid-fetch. The last member removes the map entry.
struct FlightMember<'a> {
    inflight: &'a DashMap<String, Arc<Flight>>,
    url: &'a str,
    flight: Arc<Flight>,
}

impl<'a> FlightMember<'a> {
    fn join(inflight: &'a DashMap<String, Arc<Flight>>, url: &'a str) -> Self {
        let flight = {
            let entry = inflight.entry(url.to_string()).or_default();
            entry.members.fetch_add(1, Ordering::SeqCst);
            entry.clone()
        };
        Self {
            inflight,
            url,
            flight,
        }
    }
}

impl Drop for FlightMember<'_> {
    fn drop(&mut self) {
        self.inflight.remove_if(self.url, |_, flight| {
            Arc::ptr_eq(flight, &self.flight) && flight.members.fetch_sub(1, Ordering::SeqCst) == 1
        });
    }
}

pub struct CachedFetcher {
    origin: Arc<dyn Origin>,
    cache: Arc<ResponseCache>,
    max_attempts: u32,
    single_flight: bool,
    inflight: DashMap<String, Arc<Flight>>,
}

impl CachedFetcher {
    pub fn new(
        origin: Arc<dyn Origin>,
        cache: Arc<ResponseCache>,
        fetch: &FetchConfig,
        cache_config: &CacheConfig,
    ) -> Self {
        Self {
            origin,
            cache,
            max_attempts: fetch.max_attempts.max(1),
            single_flight: cache_config.single_flight,
            inflight: DashMap::new(),
        }
    }

    pub fn cache(&self) -> &Arc<ResponseCache> {
        &self.cache
    }

    /// Fetch module source: like [`fetch`](Self::fetch) with the immutable
    /// policy, plus content-type correction for `path` and CORS.
    pub async fn fetch_source(
        &self,
        url: &str,
        path: &str,
        cancel: &CancellationToken,
    ) -> Result<FetchOutcome, FetchError> {
        let outcome = self.fetch(url, CachePolicy::Immutable, cancel).await?;
        Ok(match outcome {
            FetchOutcome::Found(mut response) => {
                content_type::correct_content_type(path, &mut response.headers);
                headers::apply_cors(&mut response.headers);
                FetchOutcome::Found(response)
            }
            other => other,
        })
    }

    pub async fn fetch(
        &self,
        url: &str,
        policy: CachePolicy,
        cancel: &CancellationToken,
    ) -> Result<FetchOutcome, FetchError> {
        let requested_at = Instant::now();
        if let Some(hit) = self.lookup(url, policy, requested_at) {
            return Ok(FetchOutcome::Found(hit));
        }

        if !self.single_flight {
            return self.fetch_through(url, policy, cancel).await;
        }

        let member = FlightMember::join(&self.inflight, url);
        let _guard = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(FetchError::Cancelled),
            guard = member.flight.lock.lock() => guard,
        };

        // The request we queued behind may have answered for us
        if let Some(hit) = self.lookup(url, policy, requested_at) {
            tracing::debug!("Single-flight wait for {} resolved from cache", url);
            return Ok(FetchOutcome::Found(hit));
        }

        self.fetch_through(url, policy, cancel).await
    }

    /// Immutable entries are always usable. Mutable ones only when stored or
    /// revalidated after `requested_at`, i.e. by a fetch this request waited on.
    fn lookup(&self, url: &str, policy: CachePolicy, requested_at: Instant) -> Option<FetchedResponse> {
        let entry = self.cache.get(url)?;
        if policy == CachePolicy::Revalidate && entry.cached_at < requested_at {
            return None;
        }
        self.cache.record_hit();
        Some(FetchedResponse::from_entry(entry, CacheStatus::Hit))
    }

    async fn fetch_through(
        &self,
        url: &str,
        policy: CachePolicy,
        cancel: &CancellationToken,
    ) -> Result<FetchOutcome, FetchError> {
        let cached = match policy {
            CachePolicy::Revalidate => self.cache.get(url),
            CachePolicy::Immutable => None,
        };
        let request = match cached.as_ref().and_then(|c| c.etag()) {
            Some(etag) => OriginRequest::revalidate(url, etag),
            None => OriginRequest::get(url),
        };

        let response = self.get_with_retry(&request, cancel).await?;

        if response.status == StatusCode::NOT_MODIFIED {
            if let Some(entry) = cached {
                self.cache.record_hit();
                self.cache.insert(CacheEntry::new(
                    url,
                    entry.status,
                    entry.headers.clone(),
                    entry.body.clone(),
                ));
                return Ok(FetchOutcome::Found(FetchedResponse::from_entry(
                    entry,
                    CacheStatus::Hit,
                )));
            }
        }

        self.cache.record_miss();
        match response.status {
            StatusCode::FORBIDDEN | StatusCode::NOT_FOUND => {
                tracing::debug!("Origin answered {} for {}", response.status, url);
                Ok(FetchOutcome::NotFound)
            }
            status if status.is_success() => Ok(FetchOutcome::Found(self.store(url, response))),
            status => {
                tracing::warn!("Origin answered {} for {}", status, url);
                Ok(FetchOutcome::Upstream(status))
            }
        }
    }

    fn store(&self, url: &str, response: OriginResponse) -> FetchedResponse {
        let OriginResponse {
            status,
            headers,
            body,
        } = response;
        self.cache
            .insert(CacheEntry::new(url, status, headers.clone(), body.clone()));

        let mut fetched = FetchedResponse {
            status,
            headers,
            body,
            cache_status: CacheStatus::Miss,
        };
        fetched.mark(CacheStatus::Miss);
        fetched
    }

    /// Retry transport failures immediately, up to `max_attempts` in total.
    async fn get_with_retry(
        &self,
        request: &OriginRequest,
        cancel: &CancellationToken,
    ) -> Result<OriginResponse, FetchError> {
        let mut attempt = 1;
        loop {
            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(FetchError::Cancelled),
                result = self.origin.get(request) => result,
            };

            match result {
                Ok(response) => return Ok(response),
                Err(err) if attempt < self.max_attempts => {
                    tracing::warn!(
                        "Fetching {} failed (attempt {}/{}): {}",
                        request.url,
                        attempt,
                        self.max_attempts,
                        err
                    );
                    attempt += 1;
                }
                Err(err) => {
                    tracing::error!(
                        "Giving up on {} after {} attempts: {}",
                        request.url,
                        attempt,
                        err
                    );
                    return Err(FetchError::Exhausted {
                        attempts: attempt,
                        source: err,
                    });
                }
            }
        }
    }
}
