mod resolve;
mod serve;

use anyhow::Context;
use clap::{Parser, Subcommand};
use modproxy_core::config::ProxyConfig;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(
    name = "modproxy",
    version,
    about = "Resolution and delivery proxy for a versioned module registry",
    long_about = "modproxy sits in front of the object store that holds published modules. \
                  It resolves version-less imports to the latest release, redirects browsers \
                  to documentation, and serves pinned source files with corrected headers."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the HTTP proxy
    #[command(
        long_about = "Starts the HTTP server. Settings come from the TOML file given with --config; \
                            --listen and --origin override the corresponding entries."
    )]
    Serve {
        /// Path to a TOML configuration file
        #[arg(short, long, value_name = "FILE")]
        config: Option<PathBuf>,

        /// Address to bind, e.g. 0.0.0.0:8000
        #[arg(long)]
        listen: Option<SocketAddr>,

        /// Base URL of the module bucket
        #[arg(long, value_name = "URL")]
        origin: Option<String>,
    },
    /// Resolve a single request path and print the response
    #[command(
        long_about = "Runs one request through the registry pipeline without starting a server \
                            and prints the status, headers and body to stdout."
    )]
    Resolve {
        /// Request path, e.g. /std/version.ts
        #[arg(value_name = "PATH")]
        path: String,

        /// Value of the Accept header to send
        #[arg(long)]
        accept: Option<String>,

        /// Path to a TOML configuration file
        #[arg(short, long, value_name = "FILE")]
        config: Option<PathBuf>,

        /// Base URL of the module bucket
        #[arg(long, value_name = "URL")]
        origin: Option<String>,
    },
}

/// Read the configuration file if one was given and apply command line
/// overrides on top.
pub fn load_config(
    path: Option<&Path>,
    listen: Option<SocketAddr>,
    origin: Option<String>,
) -> anyhow::Result<ProxyConfig> {
    let mut config = match path {
        Some(path) => ProxyConfig::load(path)
            .with_context(|| format!("loading configuration from {}", path.display()))?,
        None => ProxyConfig::default(),
    };

    if let Some(listen) = listen {
        config.listen = listen;
    }
    if let Some(origin) = origin {
        config.origin.base_url = origin;
    }
    config.validate().context("invalid configuration")?;
    Ok(config)
}

pub fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let rt = tokio::runtime::Runtime::new()?;

    match cli.command {
        Commands::Serve {
            config,
            listen,
            origin,
        } => {
            let config = load_config(config.as_deref(), listen, origin)?;
            let _guard = modproxy_runtime::init_logging("server", &config.logging);
            rt.block_on(serve::run(config))
        }
        Commands::Resolve {
            path,
            accept,
            config,
            origin,
        } => {
            let mut config = load_config(config.as_deref(), None, origin)?;
            // Keep stdout and the terminal free for the printed response
            config.logging.stderr = false;
            let _guard = modproxy_runtime::init_logging("cli", &config.logging);
            rt.block_on(resolve::run(config, path, accept))
        }
    }
}
