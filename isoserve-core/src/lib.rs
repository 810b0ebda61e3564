//! isoserve Core Library
//!
//! This crate provides the pieces shared by every isoserve crate:
//! the error taxonomy and the immutable server configuration.

pub mod config;
pub mod error;

pub use config::{ConfigLoader, ServerConfig};
pub use error::{Error, Result};

/// isoserve version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
