//! isoserve - serve a directory over loopback with cross-origin isolation
//!
//! This is the main entry point for the isoserve CLI.

use std::future::Future;
use std::net::IpAddr;
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use isoserve_core::{ConfigLoader, ServerConfig};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[cfg(target_os = "linux")]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

/// isoserve - static file server for pages that need SharedArrayBuffer
#[derive(Parser, Debug)]
#[command(name = "isoserve")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Directory to serve [default: current directory]
    directory: Option<PathBuf>,

    /// Port to listen on [default: 2561]
    #[arg(short, long)]
    port: Option<u16>,

    /// Address to listen on [default: 0.0.0.0]
    #[arg(short, long)]
    bind: Option<IpAddr>,

    /// Configuration file (.toml or .json)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Disable directory listings
    #[arg(long)]
    no_browse: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    /// Defaults, then config file, then environment, then flags
    fn server_config(&self) -> isoserve_core::Result<ServerConfig> {
        self.resolve_config(|key| std::env::var(key).ok())
    }

    /// Same layering as `server_config`, reading variables from `lookup`
    fn resolve_config<F>(&self, lookup: F) -> isoserve_core::Result<ServerConfig>
    where
        F: Fn(&str) -> Option<String>,
    {
        let config = match &self.config {
            Some(path) => ConfigLoader::load(path)?,
            None => ServerConfig::default(),
        };
        let mut config = ConfigLoader::apply_overrides(config, lookup)?;

        if let Some(directory) = &self.directory {
            config.root = directory.clone();
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(bind) = self.bind {
            config.bind = bind;
        }
        if self.no_browse {
            config.browse = false;
        }

        Ok(config)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr; stdout carries only the startup line
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let config = cli.server_config().context("invalid configuration")?;
    tracing::info!("Starting isoserve v{} with root {}", isoserve_core::VERSION, config.root.display());

    let server = isoserve_server::bind(&config)
        .await
        .with_context(|| format!("cannot start server on {}", config.listen_addr()))?;

    let shutdown = shutdown_signal();
    println!("serving at port {}", server.port());

    server.serve_until(shutdown).await?;
    Ok(())
}

/// Resolves on Ctrl-C, or SIGTERM on Unix.
///
/// The SIGTERM handler is installed when this is called, not when the
/// future is first polled, so callers can announce readiness afterwards.
fn shutdown_signal() -> impl Future<Output = ()> {
    #[cfg(unix)]
    let mut terminate = {
        use tokio::signal::unix::{SignalKind, signal};

        signal(SignalKind::terminate())
            .map_err(|e| tracing::error!("❌ Failed to create SIGTERM listener: {}", e))
            .ok()
    };

    async move {
        let ctrl_c = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("❌ Failed to listen for Ctrl-C: {}", e);
                std::future::pending::<()>().await;
            }
        };

        #[cfg(unix)]
        let terminate = async {
            match terminate.as_mut() {
                Some(stream) => {
                    stream.recv().await;
                }
                None => std::future::pending::<()>().await,
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => {}
            _ = terminate => {}
        }

        tracing::info!("📡 Termination signal received");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn test_flags_override_defaults() {
        let cli = Cli::parse_from(["isoserve", "site", "--port", "8000", "--bind", "127.0.0.1", "--no-browse"]);
        let config = cli.resolve_config(no_env).unwrap();
        assert_eq!(config.root, PathBuf::from("site"));
        assert_eq!(config.listen_addr().to_string(), "127.0.0.1:8000");
        assert!(!config.browse);
    }

    #[test]
    fn test_defaults_without_flags() {
        let cli = Cli::parse_from(["isoserve"]);
        let config = cli.resolve_config(no_env).unwrap();
        assert_eq!(config.port, 2561);
        assert_eq!(config.root, PathBuf::from("."));
        assert!(config.browse);
    }

    #[test]
    fn test_config_file_then_flags() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("isoserve.toml");
        std::fs::write(&path, "port = 9000\nbrowse = false\nindex = [\"home.html\"]\n").unwrap();

        let cli = Cli::parse_from(["isoserve", "--config", path.to_str().unwrap(), "-p", "9001"]);
        let config = cli.resolve_config(no_env).unwrap();
        assert_eq!(config.port, 9001);
        assert!(!config.browse);
        assert_eq!(config.index, vec!["home.html"]);
    }

    #[test]
    fn test_env_between_file_and_flags() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("isoserve.json");
        std::fs::write(&path, r#"{"port": 9000, "root": "from-file"}"#).unwrap();

        let env = |key: &str| match key {
            "ISOSERVE_PORT" => Some("9100".to_string()),
            "ISOSERVE_ROOT" => Some("from-env".to_string()),
            _ => None,
        };

        let cli = Cli::parse_from(["isoserve", "--config", path.to_str().unwrap()]);
        let config = cli.resolve_config(env).unwrap();
        assert_eq!(config.port, 9100);
        assert_eq!(config.root, PathBuf::from("from-env"));

        let cli = Cli::parse_from(["isoserve", "--config", path.to_str().unwrap(), "flag-root", "-p", "9200"]);
        let config = cli.resolve_config(env).unwrap();
        assert_eq!(config.port, 9200);
        assert_eq!(config.root, PathBuf::from("flag-root"));
    }

    #[test]
    fn test_verify_cli() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
