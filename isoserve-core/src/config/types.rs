//! Configuration type definitions
//!
//! These types represent the runtime configuration for isoserve.
//! A `ServerConfig` is built once at startup and never mutated afterwards.

use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;

/// Default listen port
pub const DEFAULT_PORT: u16 = 2561;

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to listen on (all interfaces by default)
    pub bind: IpAddr,

    /// Port to listen on
    pub port: u16,

    /// Document root
    pub root: PathBuf,

    /// Index files tried, in order, when a directory is requested
    pub index: Vec<String>,

    /// Produce a directory listing when no index file exists
    pub browse: bool,

    /// Consult the MIME registry for extensions the built-in table lacks
    pub guess_unknown: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_PORT,
            root: PathBuf::from("."),
            index: vec!["index.html".to_string(), "index.htm".to_string()],
            browse: true,
            guess_unknown: true,
        }
    }
}

impl ServerConfig {
    /// Socket address the listener binds to
    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind, self.port)
    }

    /// Serve `root` on `port` with every other setting left at its default
    pub fn serve_dir(root: impl Into<PathBuf>, port: u16) -> Self {
        Self {
            root: root.into(),
            port,
            ..Default::default()
        }
    }
}
