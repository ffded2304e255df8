//! Object-storage origin: URL layout and the HTTP client.

pub mod client;

pub use client::HttpOrigin;

/// Addresses documents inside the registry bucket.
#[derive(Debug, Clone)]
pub struct OriginLayout {
    base: String,
}

impl OriginLayout {
    pub fn new(base_url: &str) -> Self {
        Self {
            base: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// `<base>/<module>/versions/<version>/raw/<path>`
    pub fn content_url(&self, module: &str, version: &str, path: &str) -> String {
        format!(
            "{}/{}/versions/{}/raw/{}",
            self.base,
            module,
            version,
            path.trim_start_matches('/')
        )
    }

    /// `<base>/<module>/meta/versions.json`
    pub fn versions_url(&self, module: &str) -> String {
        format!("{}/{}/meta/versions.json", self.base, module)
    }

    /// `<base>/<module>/versions/<version>/meta/meta.json`
    pub fn listing_url(&self, module: &str, version: &str) -> String {
        format!("{}/{}/versions/{}/meta/meta.json", self.base, module, version)
    }
}
