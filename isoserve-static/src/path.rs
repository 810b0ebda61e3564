//! Request path resolution

use isoserve_core::error::{Error, Result};
use percent_encoding::percent_decode_str;
use std::path::{Component, Path, PathBuf};

/// A request target translated into a path relative to the document root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestPath {
    /// Normalized path below the root; empty for the root itself
    pub relative: PathBuf,
    /// Whether the request named a directory (`/docs/`)
    pub trailing_slash: bool,
    /// Decoded request path, used for listing titles
    pub decoded: String,
}

impl RequestPath {
    /// Parse and normalize the path component of a request target.
    ///
    /// Query and fragment are dropped, the path is percent-decoded, and
    /// `.`/empty segments are skipped. A `..` that would climb above the
    /// root fails with `ForbiddenPath`.
    pub fn parse(target: &str) -> Result<Self> {
        let path = target
            .split(['?', '#'])
            .next()
            .unwrap_or_default();

        if !path.starts_with('/') {
            return Err(Error::MalformedRequest(format!("request target must be a path: {:?}", target)));
        }

        let decoded = percent_decode_str(path)
            .decode_utf8()
            .map_err(|_| Error::MalformedRequest(format!("path is not valid UTF-8: {:?}", path)))?
            .into_owned();

        if decoded.contains('\0') {
            return Err(Error::MalformedRequest(format!("path contains NUL: {:?}", path)));
        }

        let mut segments: Vec<&str> = Vec::new();
        for segment in decoded.split('/') {
            match segment {
                "" | "." => continue,
                ".." => {
                    if segments.pop().is_none() {
                        return Err(Error::ForbiddenPath(decoded.clone()));
                    }
                }
                seg => {
                    // Anything that is not a plain name (drive prefixes, separators) is rejected
                    let mut components = Path::new(seg).components();
                    match (components.next(), components.next()) {
                        (Some(Component::Normal(_)), None) => segments.push(seg),
                        _ => return Err(Error::ForbiddenPath(decoded.clone())),
                    }
                }
            }
        }

        Ok(Self {
            relative: segments.iter().collect(),
            trailing_slash: path.ends_with('/'),
            decoded,
        })
    }

    /// Whether this is the root of the document tree
    pub fn is_root(&self) -> bool {
        self.relative.as_os_str().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_paths() {
        let p = RequestPath::parse("/index.html").unwrap();
        assert_eq!(p.relative, PathBuf::from("index.html"));
        assert!(!p.trailing_slash);

        let p = RequestPath::parse("/pkg/app.wasm?v=3#top").unwrap();
        assert_eq!(p.relative, PathBuf::from("pkg/app.wasm"));

        let p = RequestPath::parse("/").unwrap();
        assert!(p.is_root());
        assert!(p.trailing_slash);
    }

    #[test]
    fn test_normalization() {
        let p = RequestPath::parse("//a/./b/../c/").unwrap();
        assert_eq!(p.relative, PathBuf::from("a/c"));
        assert!(p.trailing_slash);
    }

    #[test]
    fn test_percent_decoding() {
        let p = RequestPath::parse("/my%20file.txt").unwrap();
        assert_eq!(p.relative, PathBuf::from("my file.txt"));
        assert_eq!(p.decoded, "/my file.txt");
    }

    #[test]
    fn test_traversal_rejected() {
        for target in [
            "/../etc/passwd",
            "/../../etc/passwd",
            "/a/../../etc/passwd",
            "/%2e%2e/etc/passwd",
            "/a/%2E%2E%2F%2E%2E/etc/passwd",
        ] {
            let err = RequestPath::parse(target).unwrap_err();
            assert!(matches!(err, Error::ForbiddenPath(_)), "{}: {:?}", target, err);
        }
    }

    #[test]
    fn test_malformed() {
        assert!(matches!(RequestPath::parse("*"), Err(Error::MalformedRequest(_))));
        assert!(matches!(RequestPath::parse("index.html"), Err(Error::MalformedRequest(_))));
        assert!(matches!(RequestPath::parse("/%ff%fe"), Err(Error::MalformedRequest(_))));
        assert!(matches!(RequestPath::parse("/a%00b"), Err(Error::MalformedRequest(_))));
    }
}
