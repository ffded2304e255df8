//! Directory-listing endpoints used by editor completion
//! (`/_vsc1/modules/...`).

use crate::fetch::{CachePolicy, FetchOutcome};
use crate::outcome::{Cacheability, Outcome};
use crate::registry::Registry;
use modproxy_api::{DirectoryListing, ModuleIdentifier, Namespace};
use std::ops::ControlFlow;
use tokio_util::sync::CancellationToken;

/// Importable file paths of a listing: no leading `/`, an allowed extension,
/// and no `_`-prefixed segment anywhere in the path.
pub fn importable_files(listing: &DirectoryListing, extensions: &[String]) -> Vec<String> {
    listing
        .files()
        .map(|entry| entry.path.trim_start_matches('/'))
        .filter(|path| !path.split('/').any(|segment| segment.starts_with('_')))
        .filter(|path| extensions.iter().any(|ext| path.ends_with(ext.as_str())))
        .map(str::to_string)
        .collect()
}

fn module_id(module: &str) -> ModuleIdentifier {
    ModuleIdentifier {
        namespace: if module == "std" {
            Namespace::Std
        } else {
            Namespace::X
        },
        name: module.to_string(),
        version: None,
        path: String::new(),
    }
}

impl Registry {
    fn listing_origin_name(&self, module: &str) -> ControlFlow<Outcome, String> {
        let id = module_id(module);
        self.legacy.validate_name(&id)?;
        ControlFlow::Continue(self.legacy.origin_name(module).to_string())
    }

    /// `/_vsc1/modules/:module`: the published versions of a module.
    pub async fn list_versions(&self, module: &str, cancel: &CancellationToken) -> Outcome {
        let origin_name = match self.listing_origin_name(module) {
            ControlFlow::Break(outcome) => return outcome,
            ControlFlow::Continue(name) => name,
        };
        match self.resolver().versions(&origin_name, cancel).await {
            Ok(info) => Outcome::Json {
                body: serde_json::json!(info.versions),
                cache: Cacheability::Revalidate,
            },
            Err(outcome) => outcome,
        }
    }

    /// `/_vsc1/modules/:module/v/:version`
    pub async fn list_files(
        &self,
        module: &str,
        version: &str,
        cancel: &CancellationToken,
    ) -> Outcome {
        let origin_name = match self.listing_origin_name(module) {
            ControlFlow::Break(outcome) => return outcome,
            ControlFlow::Continue(name) => name,
        };
        self.files_of(&origin_name, version, cancel).await
    }

    /// `/_vsc1/modules/:module/v_latest`
    pub async fn list_latest_files(&self, module: &str, cancel: &CancellationToken) -> Outcome {
        let origin_name = match self.listing_origin_name(module) {
            ControlFlow::Break(outcome) => return outcome,
            ControlFlow::Continue(name) => name,
        };
        let latest = match self
            .resolver()
            .latest(&module_id(module), &origin_name, cancel)
            .await
        {
            Ok(latest) => latest,
            Err(outcome) => return outcome,
        };
        self.files_of(&origin_name, &latest, cancel).await
    }

    async fn files_of(&self, origin_name: &str, version: &str, cancel: &CancellationToken) -> Outcome {
        let url = self.layout.listing_url(origin_name, version);
        let listing: DirectoryListing = match self
            .fetcher
            .fetch(&url, CachePolicy::Revalidate, cancel)
            .await
        {
            Ok(FetchOutcome::Found(response)) => match response.json() {
                Ok(listing) => listing,
                Err(err) => return err.into(),
            },
            Ok(FetchOutcome::NotFound) => {
                return Outcome::not_found(format!("Version {version} not found"));
            }
            Ok(FetchOutcome::Upstream(status)) => return Outcome::upstream_status(status),
            Err(err) => return err.into(),
        };

        Outcome::Json {
            body: serde_json::json!(importable_files(
                &listing,
                &self.config.listing_extensions
            )),
            cache: Cacheability::Revalidate,
        }
    }
}
