use modproxy_api::Origin;
use modproxy_core::cache::ResponseCache;
use modproxy_core::config::{LoggingConfig, ProxyConfig};
use modproxy_core::origin::HttpOrigin;
use modproxy_core::{Registry, Result};
use std::sync::Arc;

/// Bootstraps a registry backed by the HTTP origin and a fresh response
/// cache sized from the configuration.
///
/// This is the single place where the concrete origin client is chosen; the
/// pipeline itself only ever sees `dyn Origin`.
pub fn build_default_registry(config: &ProxyConfig) -> Result<Arc<Registry>> {
    let origin: Arc<dyn Origin> = Arc::new(HttpOrigin::new(&config.origin)?);
    let cache = Arc::new(ResponseCache::new(config.cache.capacity));

    tracing::info!(
        "Registry proxying {} (cache capacity {}, {} attempts per fetch)",
        config.origin.base(),
        config.cache.capacity,
        config.fetch.max_attempts
    );

    Ok(Arc::new(Registry::new(config, origin, cache)?))
}

/// Initializes the logging system for a specific component.
/// This delegates to the core logging module.
pub fn init_logging(component: &str, config: &LoggingConfig) -> tracing_appender::non_blocking::WorkerGuard {
    modproxy_core::logging::init_logging(component, config)
}
