use modproxy_core::RegistryRequest;
use modproxy_core::config::ProxyConfig;
use tokio_util::sync::CancellationToken;

pub async fn run(config: ProxyConfig, path: String, accept: Option<String>) -> anyhow::Result<()> {
    let registry = modproxy_runtime::build_default_registry(&config)?;

    let mut request = RegistryRequest::get(path);
    request.accept = accept;

    let response = registry.respond(&request, &CancellationToken::new()).await;

    println!("{}", response.status());
    for (name, value) in response.headers() {
        println!("{}: {}", name, value.to_str().unwrap_or("<binary>"));
    }
    if !response.body().is_empty() {
        println!();
        println!("{}", String::from_utf8_lossy(response.body()));
    }
    Ok(())
}
