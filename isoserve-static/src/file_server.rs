//! File server implementation

use bytes::Bytes;
use isoserve_core::ServerConfig;
use isoserve_core::error::{Error, Result};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::listing::generate_listing;
use crate::mime::content_type_for;
use crate::path::RequestPath;

/// Content type of generated directory listings
pub const LISTING_MIME_TYPE: &str = "text/html; charset=utf-8";

/// Configuration for the file server
#[derive(Debug, Clone)]
pub struct FileServerConfig {
    /// Root directory to serve
    pub root: PathBuf,
    /// Index files to look for
    pub index: Vec<String>,
    /// Enable directory browsing
    pub browse: bool,
    /// Fall back to the MIME registry for extensions missing from the table
    pub guess_unknown: bool,
}

impl Default for FileServerConfig {
    fn default() -> Self {
        Self::from(&ServerConfig::default())
    }
}

impl From<&ServerConfig> for FileServerConfig {
    fn from(config: &ServerConfig) -> Self {
        Self {
            root: config.root.clone(),
            index: config.index.clone(),
            browse: config.browse,
            guess_unknown: config.guess_unknown,
        }
    }
}

/// What the file server needs to know about a request
#[derive(Debug, Clone, Copy, Default)]
pub struct FileRequest<'a> {
    /// Request target: path plus optional query
    pub target: &'a str,
    /// Raw `If-Modified-Since` header
    pub if_modified_since: Option<&'a str>,
    /// Whether an `If-None-Match` header was sent
    pub if_none_match: bool,
}

impl<'a> FileRequest<'a> {
    /// Unconditional request for `target`
    pub fn get(target: &'a str) -> Self {
        Self {
            target,
            ..Default::default()
        }
    }
}

/// Content produced by the file server
#[derive(Debug, Clone)]
pub struct ServedFile {
    pub content: Bytes,
    pub mime_type: &'static str,
    pub path: PathBuf,
    pub last_modified: Option<String>,
}

/// Outcome of a successful lookup
#[derive(Debug, Clone)]
pub enum Served {
    /// File contents or a generated listing (200)
    Content(ServedFile),
    /// Directory requested without a trailing slash (301)
    Redirect { location: String },
    /// `If-Modified-Since` is not older than the file (304)
    NotModified,
}

/// Static file server
#[derive(Debug)]
pub struct FileServer {
    config: FileServerConfig,
    /// Canonical form of `config.root`, used for containment checks
    root: PathBuf,
}

impl FileServer {
    /// Create a new file server.
    ///
    /// Fails with `Error::Config` if the root is missing or not a directory.
    pub fn new(config: FileServerConfig) -> Result<Self> {
        let root = std::fs::canonicalize(&config.root).map_err(|e| {
            Error::Config(format!("Document root {} is not accessible: {}", config.root.display(), e))
        })?;
        if !root.is_dir() {
            return Err(Error::Config(format!("Document root {} is not a directory", root.display())));
        }

        Ok(Self { config, root })
    }

    /// Create a file server for a directory
    pub fn serve_dir(root: impl Into<PathBuf>) -> Result<Self> {
        Self::new(FileServerConfig {
            root: root.into(),
            ..Default::default()
        })
    }

    /// Enable directory browsing
    pub fn with_browse(mut self, enable: bool) -> Self {
        self.config.browse = enable;
        self
    }

    /// Canonical document root
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Serve a file request
    pub async fn serve(&self, request: &FileRequest<'_>) -> Result<Served> {
        let (path, query) = match request.target.split_once('?') {
            Some((path, query)) => (path, Some(query)),
            None => (request.target, None),
        };
        let req_path = RequestPath::parse(path)?;
        let file_path = self.contain(&self.root.join(&req_path.relative), &req_path).await?;

        tracing::debug!("📁 Serving request: {} -> {:?}", request.target, file_path);

        let metadata = tokio::fs::metadata(&file_path)
            .await
            .map_err(|_| Error::NotFound(req_path.decoded.clone()))?;

        if !metadata.is_dir() {
            if req_path.trailing_slash {
                return Err(Error::NotFound(req_path.decoded));
            }
            return self.serve_file(&file_path, &req_path.relative, &req_path, request).await;
        }

        if !req_path.trailing_slash {
            let location = match query {
                Some(query) => format!("{}/?{}", path, query),
                None => format!("{}/", path),
            };
            return Ok(Served::Redirect { location });
        }

        for index in &self.config.index {
            let index_path = file_path.join(index);
            if tokio::fs::try_exists(&index_path).await.unwrap_or(false) {
                let index_path = self.contain(&index_path, &req_path).await?;
                return self.serve_file(&index_path, Path::new(index), &req_path, request).await;
            }
        }

        if !self.config.browse {
            return Err(Error::NotFound(req_path.decoded));
        }

        let listing = generate_listing(&file_path, &req_path.decoded).await?;
        Ok(Served::Content(ServedFile {
            content: Bytes::from(listing),
            mime_type: LISTING_MIME_TYPE,
            path: file_path,
            last_modified: None,
        }))
    }

    /// Resolve symlinks and make sure the result stays below the root
    async fn contain(&self, path: &Path, req_path: &RequestPath) -> Result<PathBuf> {
        let canonical = tokio::fs::canonicalize(path)
            .await
            .map_err(|_| Error::NotFound(req_path.decoded.clone()))?;

        if !canonical.starts_with(&self.root) {
            tracing::warn!("🚫 Blocked path outside document root: {} -> {}", req_path.decoded, canonical.display());
            return Err(Error::ForbiddenPath(req_path.decoded.clone()));
        }
        Ok(canonical)
    }

    /// Read `file_path`, typed by the name it was requested as (`name`)
    async fn serve_file(
        &self,
        file_path: &Path,
        name: &Path,
        req_path: &RequestPath,
        request: &FileRequest<'_>,
    ) -> Result<Served> {
        let not_found = || Error::NotFound(req_path.decoded.clone());

        let metadata = tokio::fs::metadata(file_path).await.map_err(|_| not_found())?;
        if metadata.is_dir() {
            return Err(not_found());
        }
        let modified = metadata.modified().ok();

        if let (Some(since), Some(modified)) = (request.if_modified_since, modified) {
            if !request.if_none_match && not_modified_since(modified, since) {
                return Ok(Served::NotModified);
            }
        }

        let content = tokio::fs::read(file_path).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound
            | std::io::ErrorKind::PermissionDenied
            | std::io::ErrorKind::IsADirectory => not_found(),
            _ => Error::Io(e),
        })?;

        Ok(Served::Content(ServedFile {
            content: Bytes::from(content),
            mime_type: content_type_for(name, self.config.guess_unknown),
            path: file_path.to_path_buf(),
            last_modified: modified.map(httpdate::fmt_http_date),
        }))
    }
}

/// Compare at one-second resolution, as HTTP dates carry no fractions.
/// Unparseable dates never match.
fn not_modified_since(modified: SystemTime, header: &str) -> bool {
    let Ok(since) = httpdate::parse_http_date(header.trim()) else {
        return false;
    };
    let secs = |t: SystemTime| t.duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or(0);
    secs(modified) <= secs(since)
}
