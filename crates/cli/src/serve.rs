use anyhow::Context;
use modproxy_core::config::ProxyConfig;
use tokio_util::sync::CancellationToken;
use tracing::info;

pub async fn run(config: ProxyConfig) -> anyhow::Result<()> {
    let registry = modproxy_runtime::build_default_registry(&config)?;

    let cancel = CancellationToken::new();
    let shutdown = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received Ctrl-C, shutting down...");
            shutdown.cancel();
        }
    });

    modproxy_server::run_server(registry, config.listen, cancel)
        .await
        .with_context(|| format!("serving on {}", config.listen))
}
