//! Listener and connection loop

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use hyper::server::conn::http1;
use hyper_util::rt::TokioIo;
use isoserve_core::ServerConfig;
use isoserve_core::error::{Error, Result};
use isoserve_static::{FileServer, FileServerConfig};
use tokio::net::{TcpListener, TcpStream};

use crate::handler::FileService;
use crate::headers::IsolationHeaders;
use crate::stream::{IsolatedStream, ResponseLog};

/// A server whose listener is bound but not yet accepting
#[derive(Debug)]
pub struct BoundServer {
    listener: TcpListener,
    files: Arc<FileServer>,
    local_addr: SocketAddr,
}

/// Bind the listener described by `config`.
///
/// Fails with `Error::Config` when the document root is unusable and with
/// `Error::Bind` when the address cannot be bound.
pub async fn bind(config: &ServerConfig) -> Result<BoundServer> {
    let files = Arc::new(FileServer::new(FileServerConfig::from(config))?);

    let addr = config.listen_addr();
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| Error::Bind { addr, source })?;
    let local_addr = listener.local_addr()?;

    tracing::info!("🌐 Bound http://{} serving {}", local_addr, files.root().display());

    Ok(BoundServer {
        listener,
        files,
        local_addr,
    })
}

/// Bind and serve until the process is terminated
pub async fn start(config: ServerConfig) -> Result<()> {
    let server = bind(&config).await?;
    tracing::info!("🚀 Serving at port {}", server.port());
    server.serve().await
}

impl BoundServer {
    /// Address the listener is bound to
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Port the listener is bound to
    pub fn port(&self) -> u16 {
        self.local_addr.port()
    }

    /// Serve forever
    pub async fn serve(self) -> Result<()> {
        self.serve_until(std::future::pending()).await
    }

    /// Serve until `shutdown` completes.
    ///
    /// Stops accepting once the signal fires; connections already being
    /// served are not waited for.
    pub async fn serve_until<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    tracing::info!("🛑 Stopped accepting on {}", self.local_addr);
                    return Ok(());
                }
                accepted = self.listener.accept() => {
                    let (stream, peer) = match accepted {
                        Ok(s) => s,
                        Err(e) => {
                            tracing::warn!("Accept error: {}", e);
                            continue;
                        }
                    };
                    self.spawn_connection(stream, peer);
                }
            }
        }
    }

    fn spawn_connection(&self, stream: TcpStream, peer: SocketAddr) {
        let log = ResponseLog::default();
        let io = TokioIo::new(IsolatedStream::new(stream, log.clone()));
        let service =
            IsolationHeaders::new(FileService::new(self.files.clone()).with_peer(peer)).with_response_log(log);

        tokio::task::spawn(async move {
            if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                tracing::debug!("Error serving connection from {}: {:?}", peer, err);
            }
        });
    }
}
