//! Resolution of version-omitted requests to the latest published version.

use crate::fetch::{CachePolicy, CachedFetcher, FetchOutcome};
use crate::origin::OriginLayout;
use crate::outcome::Outcome;
use modproxy_api::{ModuleIdentifier, VersionInfo};
use tokio_util::sync::CancellationToken;

pub struct VersionResolver<'a> {
    pub fetcher: &'a CachedFetcher,
    pub layout: &'a OriginLayout,
    pub public_base: &'a str,
}

impl VersionResolver<'_> {
    /// Fetch `meta/versions.json`, revalidating any cached copy.
    ///
    /// A missing document means the module itself is unknown.
    pub async fn versions(
        &self,
        origin_name: &str,
        cancel: &CancellationToken,
    ) -> Result<VersionInfo, Outcome> {
        let url = self.layout.versions_url(origin_name);
        match self
            .fetcher
            .fetch(&url, CachePolicy::Revalidate, cancel)
            .await?
        {
            FetchOutcome::Found(response) => Ok(response.json()?),
            FetchOutcome::NotFound => Err(Outcome::not_found("Module not found")),
            FetchOutcome::Upstream(status) => Err(Outcome::upstream_status(status)),
        }
    }

    pub async fn latest(
        &self,
        id: &ModuleIdentifier,
        origin_name: &str,
        cancel: &CancellationToken,
    ) -> Result<String, Outcome> {
        self.versions(origin_name, cancel)
            .await?
            .latest
            .ok_or_else(|| {
                Outcome::not_found(format!(
                    "This module ({}) has no published version",
                    id.name
                ))
            })
    }

    /// Redirect a version-omitted request to the latest version, with a
    /// warning naming both the version and the unpinned path.
    pub async fn redirect_to_latest(
        &self,
        id: &ModuleIdentifier,
        origin_name: &str,
        cancel: &CancellationToken,
    ) -> Outcome {
        let latest = match self.latest(id, origin_name, cancel).await {
            Ok(latest) => latest,
            Err(outcome) => return outcome,
        };

        let location = id.with_version(latest.as_str()).public_path();
        tracing::debug!("Resolved {} to {}", id, location);

        Outcome::found(location).with_warning(format!(
            "Implicitly using latest version ({}) for {}{}",
            latest,
            self.public_base,
            id.public_path()
        ))
    }
}
