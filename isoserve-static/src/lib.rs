//! isoserve Static File Server Module
//!
//! Static file serving with:
//! - A fixed extension to content-type table
//! - Path normalization that never leaves the document root
//! - Index file handling and directory browsing
//! - Conditional GET (`If-Modified-Since`)

mod file_server;
mod listing;
mod mime;
mod path;

pub use file_server::{FileRequest, FileServer, FileServerConfig, LISTING_MIME_TYPE, Served, ServedFile};
pub use mime::{DEFAULT_MIME_TYPE, EXTENSION_TABLE, content_type_for, lookup_extension};
pub use path::RequestPath;
