//! Cross-origin isolation headers
//!
//! Browsers only grant `SharedArrayBuffer` and high-resolution timers to
//! documents served with both headers below. `IsolationHeaders` wraps any
//! hyper service and stamps them onto every response it produces; responses
//! hyper writes on its own are covered by `IsolatedStream`.

use std::future::Future;
use std::pin::Pin;

use http::header::{HeaderMap, HeaderName, HeaderValue};
use hyper::service::Service;
use hyper::{Method, Request, Response};

use crate::stream::ResponseLog;

pub const CROSS_ORIGIN_OPENER_POLICY: HeaderName = HeaderName::from_static("cross-origin-opener-policy");
pub const CROSS_ORIGIN_EMBEDDER_POLICY: HeaderName = HeaderName::from_static("cross-origin-embedder-policy");

pub const SAME_ORIGIN: HeaderValue = HeaderValue::from_static("same-origin");
pub const REQUIRE_CORP: HeaderValue = HeaderValue::from_static("require-corp");

/// Set both isolation headers, replacing any existing values
pub fn apply_isolation_headers(headers: &mut HeaderMap) {
    headers.insert(CROSS_ORIGIN_OPENER_POLICY, SAME_ORIGIN);
    headers.insert(CROSS_ORIGIN_EMBEDDER_POLICY, REQUIRE_CORP);
}

/// Service decorator adding the isolation headers to every response
#[derive(Debug, Clone)]
pub struct IsolationHeaders<S> {
    inner: S,
    log: Option<ResponseLog>,
}

impl<S> IsolationHeaders<S> {
    pub fn new(inner: S) -> Self {
        Self { inner, log: None }
    }

    /// Record, per request, whether its response will carry a body
    pub fn with_response_log(mut self, log: ResponseLog) -> Self {
        self.log = Some(log);
        self
    }
}

impl<S, ReqBody, B> Service<Request<ReqBody>> for IsolationHeaders<S>
where
    S: Service<Request<ReqBody>, Response = Response<B>>,
    S::Future: Send + 'static,
    S::Error: Send + 'static,
    B: Send + 'static,
{
    type Response = Response<B>;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn call(&self, req: Request<ReqBody>) -> Self::Future {
        if let Some(log) = &self.log {
            log.record(req.method() != Method::HEAD);
        }
        let response = self.inner.call(req);
        Box::pin(async move {
            let mut response = response.await?;
            apply_isolation_headers(response.headers_mut());
            Ok(response)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use http_body_util::{Empty, Full};
    use hyper::StatusCode;
    use hyper::service::service_fn;
    use std::convert::Infallible;

    #[test]
    fn test_apply_replaces_existing() {
        let mut headers = HeaderMap::new();
        headers.append(CROSS_ORIGIN_OPENER_POLICY, HeaderValue::from_static("unsafe-none"));
        headers.append(CROSS_ORIGIN_OPENER_POLICY, HeaderValue::from_static("same-origin-allow-popups"));

        apply_isolation_headers(&mut headers);

        let coop: Vec<_> = headers.get_all("Cross-Origin-Opener-Policy").iter().collect();
        assert_eq!(coop, vec!["same-origin"]);
        assert_eq!(headers["Cross-Origin-Embedder-Policy"], "require-corp");
    }

    #[tokio::test]
    async fn test_decorates_every_status() {
        for status in [StatusCode::OK, StatusCode::NOT_FOUND, StatusCode::INTERNAL_SERVER_ERROR] {
            let service = IsolationHeaders::new(service_fn(move |_req: Request<Empty<Bytes>>| async move {
                let mut response = Response::new(Full::new(Bytes::from_static(b"body")));
                *response.status_mut() = status;
                Ok::<_, Infallible>(response)
            }));

            let response = service.call(Request::new(Empty::new())).await.unwrap();
            assert_eq!(response.status(), status);
            assert_eq!(response.headers()["cross-origin-opener-policy"], "same-origin");
            assert_eq!(response.headers()["cross-origin-embedder-policy"], "require-corp");
        }
    }

    #[tokio::test]
    async fn test_inner_headers_kept() {
        let service = IsolationHeaders::new(service_fn(|_req: Request<Empty<Bytes>>| async {
            let mut response = Response::new(Full::new(Bytes::new()));
            response.headers_mut().insert("content-type", HeaderValue::from_static("text/css"));
            Ok::<_, Infallible>(response)
        }));

        let response = service.call(Request::new(Empty::new())).await.unwrap();
        assert_eq!(response.headers()["content-type"], "text/css");
        assert_eq!(response.headers().len(), 3);
    }

    #[tokio::test]
    async fn test_records_body_expectation() {
        let log = ResponseLog::default();
        let service = IsolationHeaders::new(service_fn(|_req: Request<Empty<Bytes>>| async {
            Ok::<_, Infallible>(Response::new(Full::new(Bytes::from_static(b"<p>hi</p>"))))
        }))
        .with_response_log(log.clone());

        for method in [Method::GET, Method::HEAD, Method::GET] {
            let req = Request::builder().method(method).body(Empty::new()).unwrap();
            service.call(req).await.unwrap();
        }

        assert_eq!(log.pop(), Some(true));
        assert_eq!(log.pop(), Some(false));
        assert_eq!(log.pop(), Some(true));
        assert_eq!(log.pop(), None);
    }
}
