//! Deprecated identifiers: renamed modules, `v`-prefixed std versions, old
//! script paths, and origin-side name aliases.

use crate::config::RegistryConfig;
use crate::error::ConfigError;
use crate::outcome::Outcome;
use modproxy_api::{ModuleIdentifier, Namespace};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;
use std::ops::ControlFlow;

static MODULE_NAME: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-z0-9_]{3,40}$").unwrap());

pub fn is_valid_module_name(name: &str) -> bool {
    MODULE_NAME.is_match(name)
}

pub struct LegacyPolicy {
    std_cutoff: semver::Version,
    origin_aliases: BTreeMap<String, String>,
    renamed_modules: BTreeMap<String, String>,
    script_redirects: BTreeMap<String, String>,
    public_base: String,
}

impl LegacyPolicy {
    pub fn from_config(config: &RegistryConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            std_cutoff: config.std_cutoff()?,
            origin_aliases: config.origin_aliases.clone(),
            renamed_modules: config.renamed_modules.clone(),
            script_redirects: config.script_redirects.clone(),
            public_base: config.public_base().to_string(),
        })
    }

    /// Exact-match redirect for retired script URLs such as `/install.sh`.
    pub fn script_redirect(&self, path: &str) -> Option<Outcome> {
        let target = self.script_redirects.get(path)?;
        Some(Outcome::moved(target.clone()).with_warning(format!(
            "{}{} has moved. Please use {} instead",
            self.public_base, path, target
        )))
    }

    /// Name used to address `name` at origin.
    pub fn origin_name<'a>(&'a self, name: &'a str) -> &'a str {
        self.origin_aliases
            .get(name)
            .map(String::as_str)
            .unwrap_or(name)
    }

    /// Reject a malformed third-party name. Standard library and aliased
    /// historical names are exempt.
    pub fn validate_name(&self, id: &ModuleIdentifier) -> ControlFlow<Outcome> {
        if id.namespace == Namespace::X
            && !self.origin_aliases.contains_key(&id.name)
            && !is_valid_module_name(&id.name)
        {
            return ControlFlow::Break(Outcome::BadRequest {
                message: format!(
                    "Invalid module name '{}': names are 3 to 40 characters of lowercase letters, digits and underscores",
                    id.name
                ),
            });
        }
        ControlFlow::Continue(())
    }

    /// Either stop with a redirect / 404, or continue with the origin name of
    /// the module.
    pub fn check(&self, id: &ModuleIdentifier) -> ControlFlow<Outcome, String> {
        if let Some(new_name) = self.renamed_modules.get(&id.name) {
            let target = id.with_name(new_name.as_str()).public_path();
            return ControlFlow::Break(Outcome::moved(target.clone()).with_warning(format!(
                "Module '{}' has been renamed to '{}'. Please update your import to {}{}",
                id.name, new_name, self.public_base, target
            )));
        }

        self.validate_name(id)?;

        if id.namespace == Namespace::Std {
            if let Some(outcome) = self.std_v_prefix(id) {
                return ControlFlow::Break(outcome);
            }
        }

        ControlFlow::Continue(self.origin_name(&id.name).to_string())
    }

    fn std_v_prefix(&self, id: &ModuleIdentifier) -> Option<Outcome> {
        let version = id.version.as_deref()?;
        let numeric = version.strip_prefix('v')?;
        let parsed = semver::Version::parse(numeric).ok()?;

        let canonical = id.with_version(numeric).public_path();
        let warning = format!(
            "std versions prefixed with 'v' were deprecated recently. Please change your import to {}{} (at {}{})",
            self.public_base,
            canonical,
            self.public_base,
            id.public_path()
        );

        if parsed >= self.std_cutoff {
            Some(
                Outcome::not_found(format!(
                    "std@{version} does not exist. Use {}{} instead",
                    self.public_base, canonical
                ))
                .with_warning(warning),
            )
        } else {
            Some(Outcome::found(canonical).with_warning(warning))
        }
    }
}
