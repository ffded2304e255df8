#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use http::{HeaderMap, HeaderValue, StatusCode};
use modproxy_api::{Origin, OriginRequest, OriginResponse, TransportError, TransportResult};
use modproxy_core::Registry;
use modproxy_core::cache::ResponseCache;
use modproxy_core::config::ProxyConfig;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const BASE: &str = "https://origin.test";

#[derive(Clone)]
struct Object {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
}

/// In-memory bucket. Unknown keys answer 403 like S3 does.
#[derive(Default)]
pub struct MockOrigin {
    objects: Mutex<HashMap<String, Object>>,
    requests: Mutex<Vec<OriginRequest>>,
    failures: AtomicU32,
    delay: Mutex<Option<Duration>>,
}

impl MockOrigin {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn put(&self, key: &str, content_type: Option<&str>, body: &str) {
        let mut headers = HeaderMap::new();
        if let Some(ct) = content_type {
            headers.insert("content-type", HeaderValue::from_str(ct).unwrap());
        }
        headers.insert("x-amz-request-id", HeaderValue::from_static("4442587FB7D0A2F9"));
        headers.insert("last-modified", HeaderValue::from_static("Wed, 21 Oct 2020 07:28:00 GMT"));
        self.insert(key, StatusCode::OK, headers, body);
    }

    pub fn put_json(&self, key: &str, body: serde_json::Value, etag: Option<&str>) {
        let mut headers = HeaderMap::new();
        headers.insert("content-type", HeaderValue::from_static("application/json"));
        if let Some(etag) = etag {
            headers.insert("etag", HeaderValue::from_str(etag).unwrap());
        }
        self.insert(key, StatusCode::OK, headers, &body.to_string());
    }

    pub fn put_status(&self, key: &str, status: StatusCode) {
        self.insert(key, status, HeaderMap::new(), "");
    }

    fn insert(&self, key: &str, status: StatusCode, headers: HeaderMap, body: &str) {
        self.objects.lock().unwrap().insert(
            format!("{BASE}/{key}"),
            Object {
                status,
                headers,
                body: Bytes::from(body.to_string()),
            },
        );
    }

    /// Make the next `n` requests fail at the transport level.
    pub fn fail_next(&self, n: u32) {
        self.failures.store(n, Ordering::SeqCst);
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    pub fn calls_to(&self, key: &str) -> usize {
        let url = format!("{BASE}/{key}");
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.url == url)
            .count()
    }

    pub fn last_request(&self) -> Option<OriginRequest> {
        self.requests.lock().unwrap().last().cloned()
    }

    pub fn total_calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl Origin for MockOrigin {
    async fn get(&self, request: &OriginRequest) -> TransportResult<OriginResponse> {
        self.requests.lock().unwrap().push(request.clone());

        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let failing = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(TransportError::Connect("simulated connection reset".to_string()));
        }

        let object = self.objects.lock().unwrap().get(&request.url).cloned();
        let Some(object) = object else {
            return Ok(OriginResponse::new(StatusCode::FORBIDDEN, HeaderMap::new(), Bytes::new()));
        };

        let etag = object.headers.get("etag").and_then(|v| v.to_str().ok());
        if etag.is_some() && etag == request.if_none_match.as_deref() {
            return Ok(OriginResponse::new(StatusCode::NOT_MODIFIED, HeaderMap::new(), Bytes::new()));
        }

        Ok(OriginResponse::new(object.status, object.headers, object.body))
    }
}

pub fn test_config() -> ProxyConfig {
    let mut config = ProxyConfig::default();
    config.origin.base_url = BASE.to_string();
    config.registry.std_v_prefix_cutoff = "0.60.0".to_string();
    config
}

pub fn registry(origin: Arc<MockOrigin>) -> Registry {
    registry_with(origin, test_config())
}

pub fn registry_with(origin: Arc<MockOrigin>, config: ProxyConfig) -> Registry {
    let cache = Arc::new(ResponseCache::new(config.cache.capacity));
    Registry::new(&config, origin, cache).unwrap()
}

/// std with two releases and oak with one, as the real bucket lays them out.
pub fn seeded_origin() -> Arc<MockOrigin> {
    let origin = MockOrigin::new();
    origin.put_json(
        "std/meta/versions.json",
        serde_json::json!({ "latest": "0.89.0", "versions": ["0.89.0", "0.88.0"] }),
        Some("\"std-v1\""),
    );
    origin.put(
        "std/versions/0.89.0/raw/version.ts",
        Some("application/typescript; charset=utf-8"),
        "export const VERSION = \"0.89.0\";\n",
    );
    origin.put(
        "std/versions/0.89.0/raw/fs/mod.ts",
        Some("application/typescript; charset=utf-8"),
        "export * from \"./copy.ts\";\n",
    );
    origin.put_json(
        "std/versions/0.89.0/meta/meta.json",
        serde_json::json!({
            "uploaded_at": "2021-03-09T16:00:00Z",
            "directory_listing": [
                { "path": "", "size": 100, "type": "dir" },
                { "path": "/version.ts", "size": 33, "type": "file" },
                { "path": "/fs", "size": 67, "type": "dir" },
                { "path": "/fs/mod.ts", "size": 27, "type": "file" },
                { "path": "/fs/_util.ts", "size": 40, "type": "file" },
                { "path": "/README.md", "size": 12, "type": "file" }
            ]
        }),
        Some("\"listing-v1\""),
    );

    origin.put_json(
        "oak/meta/versions.json",
        serde_json::json!({ "latest": "v6.5.0", "versions": ["v6.5.0", "v6.4.0"] }),
        None,
    );
    origin.put(
        "oak/versions/v6.5.0/raw/mod.ts",
        Some("video/mp2t"),
        "export { Application } from \"./application.ts\";\n",
    );
    origin.put(
        "oak/versions/v6.5.0/raw/components/App.tsx",
        Some("application/octet-stream"),
        "export default () => <div/>;\n",
    );
    origin.put(
        "oak/versions/v6.5.0/raw/components/Legacy.jsx",
        None,
        "export default () => <span/>;\n",
    );

    origin.put_json(
        "empty_mod/meta/versions.json",
        serde_json::json!({ "latest": null, "versions": [] }),
        None,
    );
    origin
}
