//! Proxy configuration.
//!
//! Every section is optional in the TOML file; missing fields fall back to
//! the defaults below.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProxyConfig {
    /// Address the HTTP server binds to
    pub listen: SocketAddr,
    pub origin: OriginConfig,
    pub fetch: FetchConfig,
    pub cache: CacheConfig,
    pub registry: RegistryConfig,
    pub logging: LoggingConfig,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            listen: SocketAddr::from(([127, 0, 0, 1], 8000)),
            origin: OriginConfig::default(),
            fetch: FetchConfig::default(),
            cache: CacheConfig::default(),
            registry: RegistryConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl ProxyConfig {
    /// Load and validate a TOML configuration file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: ProxyConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        check_url("origin.base_url", &self.origin.base_url)?;
        if let Some(public_url) = &self.registry.public_url {
            check_url("registry.public_url", public_url)?;
        }
        self.registry.std_cutoff()?;

        if self.cache.capacity == 0 {
            return Err(ConfigError::Invalid(
                "cache.capacity must be at least 1".to_string(),
            ));
        }
        if self.fetch.max_attempts == 0 {
            return Err(ConfigError::Invalid(
                "fetch.max_attempts must be at least 1".to_string(),
            ));
        }
        for (old, new) in &self.registry.renamed_modules {
            if old == new {
                return Err(ConfigError::Invalid(format!(
                    "registry.renamed_modules maps {old} to itself"
                )));
            }
        }
        Ok(())
    }
}

fn check_url(field: &'static str, value: &str) -> Result<(), ConfigError> {
    match url::Url::parse(value) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => Ok(()),
        _ => Err(ConfigError::InvalidUrl {
            field,
            value: value.to_string(),
        }),
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OriginConfig {
    /// Bucket URL; content lives at `<base_url>/<module>/versions/<version>/raw/<path>`
    pub base_url: String,
    pub timeout_secs: u64,
    pub connect_timeout_secs: u64,
    pub user_agent: String,
}

impl Default for OriginConfig {
    fn default() -> Self {
        Self {
            base_url: "https://cdn.deno.land".to_string(),
            timeout_secs: 30,
            connect_timeout_secs: 10,
            user_agent: format!("modproxy/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl OriginConfig {
    pub fn base(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Attempts per origin request when the transport fails
    pub max_attempts: u32,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self { max_attempts: 3 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Maximum number of cached origin responses
    pub capacity: usize,
    /// Let concurrent misses for one URL share a single origin fetch
    pub single_flight: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: 1000,
            single_flight: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Absolute public base (e.g. `https://deno.land`) used in warning messages
    pub public_url: Option<String>,
    /// Route prefix of the documentation renderer
    pub docs_base_url: String,
    /// `v`-prefixed std versions at or above this answer 404 instead of redirecting
    pub std_v_prefix_cutoff: String,
    /// Public module name -> name used for origin lookups
    pub origin_aliases: BTreeMap<String, String>,
    /// Old public module name -> new public module name
    pub renamed_modules: BTreeMap<String, String>,
    /// Exact legacy request path -> redirect target
    pub script_redirects: BTreeMap<String, String>,
    /// File extensions included in editor-tooling listings
    pub listing_extensions: Vec<String>,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        let mut origin_aliases = BTreeMap::new();
        origin_aliases.insert("deno_std".to_string(), "std".to_string());

        let mut script_redirects = BTreeMap::new();
        script_redirects.insert(
            "/install.sh".to_string(),
            "/x/install/install.sh".to_string(),
        );
        script_redirects.insert(
            "/install.ps1".to_string(),
            "/x/install/install.ps1".to_string(),
        );

        Self {
            public_url: None,
            docs_base_url: "/_docs".to_string(),
            std_v_prefix_cutoff: "0.60.0".to_string(),
            origin_aliases,
            renamed_modules: BTreeMap::new(),
            script_redirects,
            listing_extensions: [".ts", ".tsx", ".jsx", ".mjs"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl RegistryConfig {
    pub fn std_cutoff(&self) -> Result<semver::Version, ConfigError> {
        semver::Version::parse(&self.std_v_prefix_cutoff).map_err(|_| {
            ConfigError::InvalidVersion {
                field: "registry.std_v_prefix_cutoff",
                value: self.std_v_prefix_cutoff.clone(),
            }
        })
    }

    /// Public base for human-readable messages; empty when unset.
    pub fn public_base(&self) -> &str {
        self.public_url
            .as_deref()
            .map(|u| u.trim_end_matches('/'))
            .unwrap_or("")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Directory for rolling log files; defaults to `~/.modproxy/logs`
    pub dir: Option<PathBuf>,
    /// Filter used when `RUST_LOG` is not set
    pub level: String,
    pub stderr: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            dir: None,
            level: "info".to_string(),
            stderr: true,
        }
    }
}
