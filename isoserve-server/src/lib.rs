//! isoserve HTTP Server
//!
//! Serves a document root over HTTP/1 and marks every response with the
//! cross-origin isolation headers.

mod handler;
mod headers;
pub mod server;
mod stream;

pub use handler::FileService;
pub use headers::{
    CROSS_ORIGIN_EMBEDDER_POLICY, CROSS_ORIGIN_OPENER_POLICY, IsolationHeaders, REQUIRE_CORP, SAME_ORIGIN,
    apply_isolation_headers,
};
pub use server::{BoundServer, bind, start};
pub use stream::{IsolatedStream, ResponseLog};
