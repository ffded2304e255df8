//! The registry pipeline:
//! parse -> legacy -> version -> negotiate -> fetch -> assemble.

use crate::assemble::assemble;
use crate::cache::ResponseCache;
use crate::config::{ProxyConfig, RegistryConfig};
use crate::error::ConfigError;
use crate::fetch::{CachedFetcher, FetchOutcome};
use crate::identifier::parse_identifier;
use crate::legacy::LegacyPolicy;
use crate::negotiate::negotiate;
use crate::origin::OriginLayout;
use crate::outcome::Outcome;
use crate::resolver::VersionResolver;
use bytes::Bytes;
use http::{Method, Response};
use modproxy_api::{CacheStats, ModuleIdentifier, Origin};
use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

/// What the pipeline needs to know about an inbound request.
#[derive(Debug, Clone)]
pub struct RegistryRequest {
    pub method: Method,
    pub path: String,
    pub accept: Option<String>,
}

impl RegistryRequest {
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: Method::GET,
            path: path.into(),
            accept: None,
        }
    }

    pub fn with_accept(mut self, accept: impl Into<String>) -> Self {
        self.accept = Some(accept.into());
        self
    }

    pub fn is_head(&self) -> bool {
        self.method == Method::HEAD
    }
}

pub struct Registry {
    pub(crate) config: RegistryConfig,
    pub(crate) legacy: LegacyPolicy,
    pub(crate) layout: OriginLayout,
    pub(crate) fetcher: CachedFetcher,
}

impl Registry {
    /// Wire a registry around an explicit origin and cache.
    pub fn new(
        config: &ProxyConfig,
        origin: Arc<dyn Origin>,
        cache: Arc<ResponseCache>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config: config.registry.clone(),
            legacy: LegacyPolicy::from_config(&config.registry)?,
            layout: OriginLayout::new(config.origin.base()),
            fetcher: CachedFetcher::new(origin, cache, &config.fetch, &config.cache),
        })
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.fetcher.cache().stats()
    }

    pub(crate) fn resolver(&self) -> VersionResolver<'_> {
        VersionResolver {
            fetcher: &self.fetcher,
            layout: &self.layout,
            public_base: self.config.public_base(),
        }
    }

    /// Run the pipeline, assemble the response and log the result.
    pub async fn respond(
        &self,
        request: &RegistryRequest,
        cancel: &CancellationToken,
    ) -> Response<Bytes> {
        let started = Instant::now();
        let outcome = self.handle(request, cancel).await;
        self.finish(request, outcome, started)
    }

    /// Assemble an outcome produced for `request` and log it. Used by every
    /// endpoint so all requests share one access-log line format.
    pub fn finish(&self, request: &RegistryRequest, outcome: Outcome, started: Instant) -> Response<Bytes> {
        let kind = outcome.kind();
        let response = assemble(outcome, request.is_head());
        log_response(request, kind, &response, started);
        response
    }

    pub async fn handle(&self, request: &RegistryRequest, cancel: &CancellationToken) -> Outcome {
        if request.method != Method::GET && request.method != Method::HEAD {
            return Outcome::MethodNotAllowed;
        }

        if let Some(outcome) = self.legacy.script_redirect(&request.path) {
            return outcome;
        }

        let Some(id) = parse_identifier(&request.path) else {
            return Outcome::NotRegistry;
        };

        let origin_name = match self.legacy.check(&id) {
            ControlFlow::Break(outcome) => return outcome,
            ControlFlow::Continue(name) => name,
        };

        let Some(version) = id.version.as_deref() else {
            return self
                .resolver()
                .redirect_to_latest(&id, &origin_name, cancel)
                .await;
        };

        if let ControlFlow::Break(outcome) =
            negotiate(&id, request.accept.as_deref(), &self.config.docs_base_url)
        {
            return outcome;
        }

        self.serve_source(&id, &origin_name, version, cancel).await
    }

    async fn serve_source(
        &self,
        id: &ModuleIdentifier,
        origin_name: &str,
        version: &str,
        cancel: &CancellationToken,
    ) -> Outcome {
        let url = self.layout.content_url(origin_name, version, &id.path);
        match self.fetcher.fetch_source(&url, &id.path, cancel).await {
            Ok(FetchOutcome::Found(response)) => Outcome::Content {
                id: id.clone(),
                response,
            },
            Ok(FetchOutcome::NotFound) => Outcome::resource_not_found(),
            Ok(FetchOutcome::Upstream(status)) => Outcome::upstream_status(status),
            Err(err) => {
                tracing::debug!("Fetching {} failed: {}", id, err);
                err.into()
            }
        }
    }
}

fn log_response(request: &RegistryRequest, kind: &str, response: &Response<Bytes>, started: Instant) {
    let cache = response
        .headers()
        .get(crate::headers::CACHE_STATUS_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("-");
    tracing::info!(
        method = %request.method,
        path = %request.path,
        outcome = kind,
        status = response.status().as_u16(),
        cache,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "request served"
    );
}
