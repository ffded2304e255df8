//! End-to-end pipeline behaviour against an in-memory origin.

mod common;

use common::{MockOrigin, registry, registry_with, seeded_origin, test_config};
use http::{Method, StatusCode};
use modproxy_core::RegistryRequest;
use modproxy_core::outcome::Outcome;
use regex::Regex;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

fn header<'a>(response: &'a http::Response<bytes::Bytes>, name: &str) -> Option<&'a str> {
    response.headers().get(name).and_then(|v| v.to_str().ok())
}

#[tokio::test]
async fn test_unversioned_std_redirects_to_latest_with_warning() {
    let registry = registry(seeded_origin());
    let response = registry
        .respond(&RegistryRequest::get("/std/version.ts"), &CancellationToken::new())
        .await;

    assert_eq!(response.status(), StatusCode::FOUND);
    let location = header(&response, "location").unwrap();
    let pinned = Regex::new(r"^/std@\d+\.\d+\.\d+/version\.ts$").unwrap();
    assert!(pinned.is_match(location), "unexpected location {location}");
    assert_eq!(location, "/std@0.89.0/version.ts");

    let warning = header(&response, "x-deno-warning").unwrap();
    assert!(warning.contains("latest"));
    assert!(warning.contains("0.89.0"));
    assert!(warning.contains("/std/version.ts"));
    assert_eq!(header(&response, "cache-control"), Some("no-store"));
}

#[tokio::test]
async fn test_unversioned_requests_are_always_redirects() {
    let registry = registry(seeded_origin());
    for accept in [None, Some("*/*"), Some("text/html")] {
        for path in ["/std/version.ts", "/x/std/version.ts", "/x/oak/mod.ts", "/x/oak"] {
            let mut request = RegistryRequest::get(path);
            request.accept = accept.map(str::to_string);
            let response = registry.respond(&request, &CancellationToken::new()).await;
            assert_eq!(response.status(), StatusCode::FOUND, "{path} {accept:?}");
            assert!(header(&response, "x-deno-warning").is_some());
        }
    }
}

#[tokio::test]
async fn test_x_std_alias_resolves_like_std() {
    let registry = registry(seeded_origin());
    let cancel = CancellationToken::new();
    let a = registry.respond(&RegistryRequest::get("/std/version.ts"), &cancel).await;
    let b = registry.respond(&RegistryRequest::get("/x/std/version.ts"), &cancel).await;
    assert_eq!(header(&a, "location"), header(&b, "location"));
}

#[tokio::test]
async fn test_pinned_std_serves_typescript_with_cors() {
    let registry = registry(seeded_origin());
    let request =
        RegistryRequest::get("/std@0.89.0/version.ts").with_accept("application/typescript");
    let response = registry.respond(&request, &CancellationToken::new()).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        header(&response, "content-type"),
        Some("application/typescript; charset=utf-8")
    );
    assert_eq!(header(&response, "access-control-allow-origin"), Some("*"));
    assert_eq!(header(&response, "access-control-max-age"), Some("86400"));
    assert_eq!(
        header(&response, "cache-control"),
        Some("public, max-age=31536000, immutable")
    );
    assert_eq!(
        header(&response, "last-modified"),
        Some("Wed, 21 Oct 2020 07:28:00 GMT")
    );
    assert!(header(&response, "x-amz-request-id").is_none());
    assert_eq!(response.body().as_ref(), b"export const VERSION = \"0.89.0\";\n");
}

#[tokio::test]
async fn test_second_request_is_a_cache_hit() {
    let origin = seeded_origin();
    let registry = registry(origin.clone());
    let cancel = CancellationToken::new();

    let first = registry.respond(&RegistryRequest::get("/std@0.89.0/version.ts"), &cancel).await;
    let second = registry.respond(&RegistryRequest::get("/std@0.89.0/version.ts"), &cancel).await;

    assert_eq!(header(&first, "x-deno-cache"), Some("MISS"));
    assert_eq!(header(&second, "x-deno-cache"), Some("HIT"));
    assert_eq!(first.body(), second.body());
    assert_eq!(origin.calls_to("std/versions/0.89.0/raw/version.ts"), 1);

    let stats = registry.cache_stats();
    assert_eq!(stats.hits, 1);
    assert_eq!(stats.misses, 1);
}

#[tokio::test]
async fn test_generic_origin_type_is_corrected_by_extension() {
    let registry = registry(seeded_origin());
    let cancel = CancellationToken::new();

    let ts = registry
        .respond(&RegistryRequest::get("/x/oak@v6.5.0/mod.ts").with_accept("*/*"), &cancel)
        .await;
    assert_eq!(ts.status(), StatusCode::OK);
    assert_eq!(
        header(&ts, "content-type"),
        Some("application/typescript; charset=utf-8")
    );

    let tsx = registry
        .respond(&RegistryRequest::get("/x/oak@v6.5.0/components/App.tsx"), &cancel)
        .await;
    assert!(header(&tsx, "content-type").unwrap().starts_with("application/typescript"));

    let jsx = registry
        .respond(&RegistryRequest::get("/x/oak@v6.5.0/components/Legacy.jsx"), &cancel)
        .await;
    assert!(header(&jsx, "content-type").unwrap().starts_with("application/javascript"));
}

#[tokio::test]
async fn test_forbidden_and_missing_both_become_404() {
    let origin = seeded_origin();
    origin.put_status("oak/versions/v6.5.0/raw/gone.ts", StatusCode::NOT_FOUND);
    let registry = registry(origin.clone());
    let cancel = CancellationToken::new();

    // Unknown keys answer 403 from the mock bucket
    let forbidden = registry
        .respond(&RegistryRequest::get("/x/oak@v6.5.0/missing.ts"), &cancel)
        .await;
    let missing = registry
        .respond(&RegistryRequest::get("/x/oak@v6.5.0/gone.ts"), &cancel)
        .await;

    for response in [&forbidden, &missing] {
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(response.body().as_ref(), b"404 Resource Not Found");
    }

    // Errors are not cached
    registry
        .respond(&RegistryRequest::get("/x/oak@v6.5.0/gone.ts"), &cancel)
        .await;
    assert_eq!(origin.calls_to("oak/versions/v6.5.0/raw/gone.ts"), 2);
}

#[tokio::test]
async fn test_html_line_fragment_redirects_to_anchor() {
    let registry = registry(seeded_origin());
    let request = RegistryRequest::get("/std@0.89.0/fs/mod.ts:5:1").with_accept("text/html");
    let response = registry.respond(&request, &CancellationToken::new()).await;

    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(header(&response, "location"), Some("/std@0.89.0/fs/mod.ts#L5"));
}

#[tokio::test]
async fn test_html_without_fragment_redirects_to_docs() {
    let registry = registry(seeded_origin());
    let request = RegistryRequest::get("/x/oak@v6.5.0/mod.ts")
        .with_accept("text/html,application/xhtml+xml,*/*;q=0.8");
    let response = registry.respond(&request, &CancellationToken::new()).await;

    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(header(&response, "location"), Some("/_docs/x/oak@v6.5.0/mod.ts"));
}

#[tokio::test]
async fn test_tooling_never_gets_html_redirect() {
    let origin = seeded_origin();
    let registry = registry(origin.clone());
    let response = registry
        .respond(
            &RegistryRequest::get("/std@0.89.0/fs/mod.ts:5:1"),
            &CancellationToken::new(),
        )
        .await;

    // The fragment is an opaque path segment for tooling clients
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(origin.calls_to("std/versions/0.89.0/raw/fs/mod.ts:5:1"), 1);
}

#[tokio::test]
async fn test_transient_failures_are_retried() {
    let origin = seeded_origin();
    origin.fail_next(2);
    let registry = registry(origin.clone());

    let response = registry
        .respond(&RegistryRequest::get("/std@0.89.0/version.ts"), &CancellationToken::new())
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(origin.calls_to("std/versions/0.89.0/raw/version.ts"), 3);
}

#[tokio::test]
async fn test_exhausted_retries_surface_as_5xx() {
    let origin = seeded_origin();
    origin.fail_next(3);
    let registry = registry(origin.clone());

    let response = registry
        .respond(&RegistryRequest::get("/std@0.89.0/version.ts"), &CancellationToken::new())
        .await;

    assert!(response.status().is_server_error());
    assert_eq!(origin.calls_to("std/versions/0.89.0/raw/version.ts"), 3);
    assert!(!String::from_utf8_lossy(response.body()).contains("origin.test"));
    assert_eq!(registry.cache_stats().entries, 0);
}

#[tokio::test]
async fn test_unknown_module_and_unpublished_module_differ() {
    let registry = registry(seeded_origin());
    let cancel = CancellationToken::new();

    let unknown = registry
        .handle(&RegistryRequest::get("/x/nosuchmod/mod.ts"), &cancel)
        .await;
    assert_eq!(unknown, Outcome::not_found("Module not found"));

    let empty = registry
        .handle(&RegistryRequest::get("/x/empty_mod/mod.ts"), &cancel)
        .await;
    match empty {
        Outcome::NotFound { message, .. } => assert!(message.contains("no published version")),
        other => panic!("unexpected {other:?}"),
    }
}

#[tokio::test]
async fn test_invalid_module_name_is_bad_request() {
    let registry = registry(seeded_origin());
    let response = registry
        .respond(&RegistryRequest::get("/x/Bad-Name/mod.ts"), &CancellationToken::new())
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_v_prefixed_std_versions() {
    let registry = registry(seeded_origin());
    let cancel = CancellationToken::new();

    let old = registry
        .respond(&RegistryRequest::get("/std@v0.50.0/fs/mod.ts"), &cancel)
        .await;
    assert_eq!(old.status(), StatusCode::FOUND);
    assert_eq!(header(&old, "location"), Some("/std@0.50.0/fs/mod.ts"));
    assert!(header(&old, "x-deno-warning").is_some());

    let recent = registry
        .respond(&RegistryRequest::get("/std@v0.89.0/fs/mod.ts"), &cancel)
        .await;
    assert_eq!(recent.status(), StatusCode::NOT_FOUND);
    assert!(header(&recent, "x-deno-warning").unwrap().contains("/std@0.89.0/fs/mod.ts"));
}

#[tokio::test]
async fn test_method_not_allowed() {
    let origin = seeded_origin();
    let registry = registry(origin.clone());
    let mut request = RegistryRequest::get("/std@0.89.0/version.ts");
    request.method = Method::POST;

    let response = registry.respond(&request, &CancellationToken::new()).await;
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(origin.total_calls(), 0);
}

#[tokio::test]
async fn test_head_has_headers_but_no_body() {
    let registry = registry(seeded_origin());
    let mut request = RegistryRequest::get("/std@0.89.0/version.ts");
    request.method = Method::HEAD;

    let response = registry.respond(&request, &CancellationToken::new()).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.body().is_empty());
    assert_eq!(header(&response, "content-length"), Some("33"));
}

#[tokio::test]
async fn test_non_registry_paths_fall_through() {
    let registry = registry(seeded_origin());
    let outcome = registry
        .handle(&RegistryRequest::get("/manual/getting_started"), &CancellationToken::new())
        .await;
    assert_eq!(outcome, Outcome::NotRegistry);
}

#[tokio::test]
async fn test_script_redirect() {
    let registry = registry(seeded_origin());
    let response = registry
        .respond(&RegistryRequest::get("/install.sh"), &CancellationToken::new())
        .await;
    assert_eq!(response.status(), StatusCode::MOVED_PERMANENTLY);
    assert_eq!(header(&response, "location"), Some("/x/install/install.sh"));
}

#[tokio::test]
async fn test_cancelled_request_does_not_touch_cache() {
    let origin = seeded_origin();
    let registry = registry(origin.clone());
    let cancel = CancellationToken::new();
    cancel.cancel();

    let outcome = registry
        .handle(&RegistryRequest::get("/std@0.89.0/version.ts"), &cancel)
        .await;
    assert_eq!(outcome, Outcome::Cancelled);
    assert_eq!(registry.cache_stats().entries, 0);
}

#[tokio::test]
async fn test_cancellation_aborts_in_flight_fetch() {
    let origin = seeded_origin();
    origin.set_delay(std::time::Duration::from_secs(30));
    let registry = Arc::new(registry(origin.clone()));
    let cancel = CancellationToken::new();

    let task = {
        let registry = registry.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move {
            registry
                .handle(&RegistryRequest::get("/std@0.89.0/version.ts"), &cancel)
                .await
        })
    };
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    cancel.cancel();

    let outcome = tokio::time::timeout(std::time::Duration::from_secs(5), task)
        .await
        .expect("cancellation should end the request promptly")
        .unwrap();
    assert_eq!(outcome, Outcome::Cancelled);
    assert_eq!(registry.cache_stats().entries, 0);
}

#[tokio::test]
async fn test_latest_is_revalidated_not_pinned() {
    let origin = seeded_origin();
    let registry = registry(origin.clone());
    let cancel = CancellationToken::new();

    let first = registry.respond(&RegistryRequest::get("/std/version.ts"), &cancel).await;
    assert_eq!(header(&first, "location"), Some("/std@0.89.0/version.ts"));

    // Unchanged document: conditional request, served from cache
    registry.respond(&RegistryRequest::get("/std/version.ts"), &cancel).await;
    let conditional = origin.last_request().unwrap();
    assert_eq!(conditional.if_none_match.as_deref(), Some("\"std-v1\""));
    assert_eq!(origin.calls_to("std/meta/versions.json"), 2);

    // A new release shows up immediately
    origin.put_json(
        "std/meta/versions.json",
        serde_json::json!({ "latest": "0.90.0", "versions": ["0.90.0", "0.89.0"] }),
        Some("\"std-v2\""),
    );
    let third = registry.respond(&RegistryRequest::get("/std/version.ts"), &cancel).await;
    assert_eq!(header(&third, "location"), Some("/std@0.90.0/version.ts"));
}

#[tokio::test]
async fn test_concurrent_misses_share_one_fetch() {
    let origin = seeded_origin();
    origin.set_delay(std::time::Duration::from_millis(50));
    let registry = Arc::new(registry(origin.clone()));

    let mut tasks = Vec::new();
    for _ in 0..8 {
        let registry = registry.clone();
        tasks.push(tokio::spawn(async move {
            registry
                .respond(&RegistryRequest::get("/std@0.89.0/version.ts"), &CancellationToken::new())
                .await
        }));
    }

    let mut misses = 0;
    for task in tasks {
        let response = task.await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        if header(&response, "x-deno-cache") == Some("MISS") {
            misses += 1;
        }
    }

    assert_eq!(misses, 1);
    assert_eq!(origin.calls_to("std/versions/0.89.0/raw/version.ts"), 1);
}

#[tokio::test]
async fn test_capacity_bound_evicts_old_entries() {
    let origin = seeded_origin();
    let mut config = test_config();
    config.cache.capacity = 1;
    let registry = registry_with(origin.clone(), config);
    let cancel = CancellationToken::new();

    registry.respond(&RegistryRequest::get("/std@0.89.0/version.ts"), &cancel).await;
    registry.respond(&RegistryRequest::get("/std@0.89.0/fs/mod.ts"), &cancel).await;
    let again = registry.respond(&RegistryRequest::get("/std@0.89.0/version.ts"), &cancel).await;

    assert_eq!(header(&again, "x-deno-cache"), Some("MISS"));
    assert_eq!(registry.cache_stats().entries, 1);
    assert!(registry.cache_stats().evictions >= 1);
}

#[tokio::test]
async fn test_origin_alias_keeps_public_name() {
    let origin = seeded_origin();
    let registry = registry(origin.clone());
    let response = registry
        .respond(&RegistryRequest::get("/x/deno_std/version.ts"), &CancellationToken::new())
        .await;

    assert_eq!(header(&response, "location"), Some("/x/deno_std@0.89.0/version.ts"));
    assert_eq!(origin.calls_to("std/meta/versions.json"), 1);
}

#[tokio::test]
async fn test_origin_server_error_is_not_cached() {
    let origin = MockOrigin::new();
    origin.put_status("std/versions/0.1.0/raw/mod.ts", StatusCode::SERVICE_UNAVAILABLE);
    let registry = registry(origin.clone());

    let response = registry
        .respond(&RegistryRequest::get("/std@0.1.0/mod.ts"), &CancellationToken::new())
        .await;
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(registry.cache_stats().entries, 0);
}

#[tokio::test]
async fn test_concurrent_latest_lookups_share_one_metadata_fetch() {
    let origin = seeded_origin();
    origin.set_delay(std::time::Duration::from_millis(50));
    let registry = Arc::new(registry(origin.clone()));

    for round in 1..=2 {
        let mut tasks = Vec::new();
        for _ in 0..8 {
            let registry = registry.clone();
            tasks.push(tokio::spawn(async move {
                registry
                    .respond(&RegistryRequest::get("/std/version.ts"), &CancellationToken::new())
                    .await
            }));
        }
        for task in tasks {
            let response = task.await.unwrap();
            assert_eq!(response.status(), StatusCode::FOUND);
            assert_eq!(header(&response, "location"), Some("/std@0.89.0/version.ts"));
        }
        // One plain fetch, then one conditional request for the warm round
        assert_eq!(origin.calls_to("std/meta/versions.json"), round);
    }
    assert_eq!(
        origin.last_request().unwrap().if_none_match.as_deref(),
        Some("\"std-v1\"")
    );
}

#[tokio::test]
async fn test_html_refused_with_zero_quality_serves_source() {
    let registry = registry(seeded_origin());
    let request = RegistryRequest::get("/std@0.89.0/version.ts")
        .with_accept("text/html;q=0, application/typescript");
    let response = registry.respond(&request, &CancellationToken::new()).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(header(&response, "x-deno-cache"), Some("MISS"));
}
