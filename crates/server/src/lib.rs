//! HTTP front end: routes inbound requests into the registry pipeline.

use axum::Router;
use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, Method, Uri, header::ACCEPT};
use axum::response::Response;
use axum::routing::get;
use modproxy_core::{Registry, RegistryRequest};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

#[derive(Clone)]
struct AppState {
    registry: Arc<Registry>,
    shutdown: CancellationToken,
}

impl AppState {
    /// Token for one request. Cancelled when the server shuts down, or when
    /// the handler future is dropped because the client went away.
    fn request_token(&self) -> CancellationToken {
        self.shutdown.child_token()
    }
}

/// Build the application router. Registry paths are handled by the fallback
/// so that any method reaches the pipeline and gets a proper 405.
pub fn router(registry: Arc<Registry>, shutdown: CancellationToken) -> Router {
    Router::new()
        .route("/_vsc1/modules/{module}", get(list_versions))
        .route("/_vsc1/modules/{module}/v_latest", get(list_latest_files))
        .route("/_vsc1/modules/{module}/v/{version}", get(list_files))
        .fallback(registry_handler)
        .with_state(AppState { registry, shutdown })
}

/// Bind `listen` and serve until `cancel_token` fires.
pub async fn run_server(
    registry: Arc<Registry>,
    listen: SocketAddr,
    cancel_token: CancellationToken,
) -> std::io::Result<()> {
    let listener = TcpListener::bind(listen).await?;
    serve(listener, registry, cancel_token).await
}

/// Serve on an already bound listener.
pub async fn serve(
    listener: TcpListener,
    registry: Arc<Registry>,
    cancel_token: CancellationToken,
) -> std::io::Result<()> {
    tracing::info!("Registry proxy listening on {}", listener.local_addr()?);

    let app = router(registry, cancel_token.clone());
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            cancel_token.cancelled().await;
        })
        .await?;

    tracing::info!("Registry proxy stopped");
    Ok(())
}

fn registry_request(method: Method, uri: &Uri, headers: &HeaderMap) -> RegistryRequest {
    RegistryRequest {
        method,
        path: uri.path().to_string(),
        accept: headers
            .get(ACCEPT)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
    }
}

async fn registry_handler(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
) -> Response {
    let request = registry_request(method, &uri, &headers);
    let cancel = state.request_token();
    let _guard = cancel.clone().drop_guard();

    state
        .registry
        .respond(&request, &cancel)
        .await
        .map(Body::from)
}

async fn list_versions(
    State(state): State<AppState>,
    Path(module): Path<String>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
) -> Response {
    let started = Instant::now();
    let request = registry_request(method, &uri, &headers);
    let cancel = state.request_token();
    let _guard = cancel.clone().drop_guard();

    let outcome = state.registry.list_versions(&module, &cancel).await;
    state.registry.finish(&request, outcome, started).map(Body::from)
}

async fn list_files(
    State(state): State<AppState>,
    Path((module, version)): Path<(String, String)>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
) -> Response {
    let started = Instant::now();
    let request = registry_request(method, &uri, &headers);
    let cancel = state.request_token();
    let _guard = cancel.clone().drop_guard();

    let outcome = state.registry.list_files(&module, &version, &cancel).await;
    state.registry.finish(&request, outcome, started).map(Body::from)
}

async fn list_latest_files(
    State(state): State<AppState>,
    Path(module): Path<String>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
) -> Response {
    let started = Instant::now();
    let request = registry_request(method, &uri, &headers);
    let cancel = state.request_token();
    let _guard = cancel.clone().drop_guard();

    let outcome = state.registry.list_latest_files(&module, &cancel).await;
    state.registry.finish(&request, outcome, started).map(Body::from)
}
