//! Request handler mapping HTTP requests onto the file server

use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;

use bytes::Bytes;
use http::header::{self, HeaderValue};
use http::request::Parts;
use http_body_util::Full;
use hyper::service::Service;
use hyper::{Method, Request, Response, StatusCode};
use isoserve_core::error::{Error, Result};
use isoserve_static::{FileRequest, FileServer, Served, ServedFile};

/// Content type of generated error pages
const ERROR_MIME_TYPE: &str = "text/html;charset=utf-8";

/// Base service: resolves `GET`/`HEAD` requests against the document root
#[derive(Debug, Clone)]
pub struct FileService {
    files: Arc<FileServer>,
    peer: Option<SocketAddr>,
}

impl FileService {
    pub fn new(files: Arc<FileServer>) -> Self {
        Self { files, peer: None }
    }

    /// Remote address reported in the access log
    pub fn with_peer(mut self, peer: SocketAddr) -> Self {
        self.peer = Some(peer);
        self
    }
}

impl<B> Service<Request<B>> for FileService {
    type Response = Response<Full<Bytes>>;
    type Error = Infallible;
    type Future = Pin<Box<dyn Future<Output = std::result::Result<Self::Response, Self::Error>> + Send>>;

    fn call(&self, req: Request<B>) -> Self::Future {
        // Only GET and HEAD are served, so the body is never read
        let (parts, _body) = req.into_parts();
        let files = self.files.clone();
        let peer = self.peer;

        Box::pin(async move {
            let response = handle_request(&files, &parts).await;
            log_access(peer, &parts, response.status());
            Ok(response)
        })
    }
}

async fn handle_request(files: &FileServer, parts: &Parts) -> Response<Full<Bytes>> {
    match serve(files, parts).await {
        Ok(Served::Content(file)) => content_response(file),
        Ok(Served::Redirect { location }) => redirect_response(&location),
        Ok(Served::NotModified) => empty_response(StatusCode::NOT_MODIFIED),
        Err(err) => {
            match &err {
                Error::ForbiddenPath(_) | Error::NotFound(_) | Error::MalformedRequest(_) | Error::MethodNotAllowed(_) => {
                    tracing::debug!("Request for {} failed: {}", parts.uri, err)
                }
                _ => tracing::error!("Error serving {}: {}", parts.uri, err),
            }
            error_response(err.status())
        }
    }
}

async fn serve(files: &FileServer, parts: &Parts) -> Result<Served> {
    if parts.method != Method::GET && parts.method != Method::HEAD {
        return Err(Error::MethodNotAllowed(parts.method.to_string()));
    }

    let target = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .ok_or_else(|| Error::MalformedRequest(format!("no path in request target {}", parts.uri)))?;

    let request = FileRequest {
        target,
        if_modified_since: parts
            .headers
            .get(header::IF_MODIFIED_SINCE)
            .and_then(|v| v.to_str().ok()),
        if_none_match: parts.headers.contains_key(header::IF_NONE_MATCH),
    };

    files.serve(&request).await
}

fn content_response(file: ServedFile) -> Response<Full<Bytes>> {
    let length = file.content.len();
    let mut response = Response::new(Full::new(file.content));
    let headers = response.headers_mut();

    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(file.mime_type));
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(length));
    if let Some(last_modified) = file.last_modified.and_then(|v| HeaderValue::from_str(&v).ok()) {
        headers.insert(header::LAST_MODIFIED, last_modified);
    }

    response
}

fn redirect_response(location: &str) -> Response<Full<Bytes>> {
    match HeaderValue::from_str(location) {
        Ok(location) => {
            let mut response = empty_response(StatusCode::MOVED_PERMANENTLY);
            response.headers_mut().insert(header::LOCATION, location);
            response.headers_mut().insert(header::CONTENT_LENGTH, HeaderValue::from(0));
            response
        }
        Err(_) => error_response(StatusCode::BAD_REQUEST),
    }
}

fn empty_response(status: StatusCode) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::new()));
    *response.status_mut() = status;
    response
}

/// Small HTML page describing an error status
fn error_response(status: StatusCode) -> Response<Full<Bytes>> {
    let reason = status.canonical_reason().unwrap_or("Error");
    let body = format!(
        "<!DOCTYPE HTML>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n<title>Error response</title>\n</head>\n<body>\n<h1>Error response</h1>\n<p>Error code: {}</p>\n<p>Message: {}.</p>\n</body>\n</html>\n",
        status.as_u16(),
        reason
    );

    let length = body.len();
    let mut response = Response::new(Full::new(Bytes::from(body)));
    *response.status_mut() = status;
    response.headers_mut().insert(header::CONTENT_TYPE, HeaderValue::from_static(ERROR_MIME_TYPE));
    response.headers_mut().insert(header::CONTENT_LENGTH, HeaderValue::from(length));
    response
}

fn log_access(peer: Option<SocketAddr>, parts: &Parts, status: StatusCode) {
    let peer = peer.map(|p| p.to_string()).unwrap_or_else(|| "-".to_string());
    tracing::info!(
        "{} \"{} {} {:?}\" {}",
        peer,
        parts.method,
        parts.uri,
        parts.version,
        status.as_u16()
    );
}
