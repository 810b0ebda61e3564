//! Connection stream that keeps the isolation headers on every response head
//!
//! hyper answers requests it cannot parse (400, 431, 505) without calling the
//! service, so `IsolationHeaders` never sees those responses. `IsolatedStream`
//! sits under hyper, follows the framing of the outgoing bytes, and adds the
//! headers to any response head that lacks them. Bodies pass through untouched.

use std::collections::VecDeque;
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll, ready};

use parking_lot::Mutex;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

use crate::headers::{CROSS_ORIGIN_EMBEDDER_POLICY, CROSS_ORIGIN_OPENER_POLICY, REQUIRE_CORP, SAME_ORIGIN};

/// Heads larger than this are passed through unexamined
const MAX_HEAD_SIZE: usize = 64 * 1024;

/// Per-connection queue: for each request the service answered, whether its
/// response carries a body (`false` for `HEAD`)
#[derive(Debug, Clone, Default)]
pub struct ResponseLog {
    expects_body: Arc<Mutex<VecDeque<bool>>>,
}

impl ResponseLog {
    pub fn record(&self, expects_body: bool) {
        self.expects_body.lock().push_back(expects_body);
    }

    pub(crate) fn pop(&self) -> Option<bool> {
        self.expects_body.lock().pop_front()
    }
}

/// Where the writer is within the current response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Framing {
    /// Collecting a response head
    Head,
    /// Passing through this many body bytes
    Body(u64),
    /// Framing unknown (chunked or close-delimited); pass everything through
    Passthrough,
}

/// Stream wrapper adding the isolation headers to response heads written without them
#[derive(Debug)]
pub struct IsolatedStream<T> {
    inner: T,
    log: ResponseLog,
    framing: Framing,
    head: Vec<u8>,
    pending: Vec<u8>,
    flushed: usize,
}

impl<T> IsolatedStream<T> {
    pub fn new(inner: T, log: ResponseLog) -> Self {
        Self {
            inner,
            log,
            framing: Framing::Head,
            head: Vec::new(),
            pending: Vec::new(),
            flushed: 0,
        }
    }

    /// Buffer head bytes; returns how many bytes of `buf` belong to the head
    fn accept_head(&mut self, buf: &[u8]) -> usize {
        let old_len = self.head.len();
        let search_from = old_len.saturating_sub(3);
        self.head.extend_from_slice(buf);

        match find_head_end(&self.head[search_from..]) {
            Some(pos) => {
                let end = search_from + pos + 4;
                self.head.truncate(end);
                let head = std::mem::take(&mut self.head);
                self.finish_head(&head);
                end - old_len
            }
            None => {
                if self.head.len() > MAX_HEAD_SIZE {
                    let head = std::mem::take(&mut self.head);
                    self.pending.extend_from_slice(&head);
                    self.framing = Framing::Passthrough;
                }
                buf.len()
            }
        }
    }

    fn finish_head(&mut self, head: &[u8]) {
        let summary = HeadSummary::parse(head);

        if summary.isolated {
            self.pending.extend_from_slice(head);
        } else {
            tracing::debug!("Adding isolation headers to a {} written by the HTTP layer", summary.status);
            self.pending.extend_from_slice(&head[..head.len() - 2]);
            for (name, value) in [
                (CROSS_ORIGIN_OPENER_POLICY, SAME_ORIGIN),
                (CROSS_ORIGIN_EMBEDDER_POLICY, REQUIRE_CORP),
            ] {
                self.pending.extend_from_slice(name.as_str().as_bytes());
                self.pending.extend_from_slice(b": ");
                self.pending.extend_from_slice(value.as_bytes());
                self.pending.extend_from_slice(b"\r\n");
            }
            self.pending.extend_from_slice(b"\r\n");
        }

        // Interim responses are followed by the final head
        if (100..200).contains(&summary.status) {
            self.framing = Framing::Head;
            return;
        }

        // Only service responses have a log entry; hyper's own errors have empty bodies
        let expects_body = if summary.isolated {
            self.log.pop().unwrap_or(true)
        } else {
            true
        };

        self.framing = if !expects_body || summary.status == 204 || summary.status == 304 {
            Framing::Head
        } else if summary.chunked {
            Framing::Passthrough
        } else {
            match summary.content_length {
                Some(0) => Framing::Head,
                Some(n) => Framing::Body(n),
                None => Framing::Passthrough,
            }
        };
    }
}

impl<T: AsyncWrite + Unpin> IsolatedStream<T> {
    /// Write out buffered head bytes
    fn poll_drain(&mut self, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        while self.flushed < self.pending.len() {
            let n = ready!(Pin::new(&mut self.inner).poll_write(cx, &self.pending[self.flushed..]))?;
            if n == 0 {
                return Poll::Ready(Err(io::ErrorKind::WriteZero.into()));
            }
            self.flushed += n;
        }
        self.pending.clear();
        self.flushed = 0;
        Poll::Ready(Ok(()))
    }
}

impl<T: AsyncRead + Unpin> AsyncRead for IsolatedStream<T> {
    fn poll_read(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_read(cx, buf)
    }
}

impl<T: AsyncWrite + Unpin> AsyncWrite for IsolatedStream<T> {
    fn poll_write(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &[u8]) -> Poll<io::Result<usize>> {
        let this = self.get_mut();
        ready!(this.poll_drain(cx))?;

        match this.framing {
            Framing::Passthrough => Pin::new(&mut this.inner).poll_write(cx, buf),
            Framing::Body(remaining) => {
                let limit = remaining.min(buf.len() as u64) as usize;
                let n = ready!(Pin::new(&mut this.inner).poll_write(cx, &buf[..limit]))?;
                let left = remaining - n as u64;
                this.framing = if left == 0 { Framing::Head } else { Framing::Body(left) };
                Poll::Ready(Ok(n))
            }
            Framing::Head => {
                let accepted = this.accept_head(buf);
                // Anything still buffered goes out on the next write or flush
                if let Poll::Ready(Err(e)) = this.poll_drain(cx) {
                    return Poll::Ready(Err(e));
                }
                Poll::Ready(Ok(accepted))
            }
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        ready!(this.poll_drain(cx))?;
        Pin::new(&mut this.inner).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        ready!(this.poll_drain(cx))?;
        Pin::new(&mut this.inner).poll_shutdown(cx)
    }
}

/// What the writer needs from a response head
#[derive(Debug, Default, PartialEq, Eq)]
struct HeadSummary {
    status: u16,
    content_length: Option<u64>,
    chunked: bool,
    isolated: bool,
}

impl HeadSummary {
    fn parse(head: &[u8]) -> Self {
        let text = String::from_utf8_lossy(head);
        let mut lines = text.split("\r\n");

        let status = lines
            .next()
            .and_then(|line| line.split(' ').nth(1))
            .and_then(|code| code.parse().ok())
            .unwrap_or(0);

        let mut summary = HeadSummary {
            status,
            ..Default::default()
        };
        let (mut coop, mut coep) = (false, false);

        for line in lines {
            let Some((name, value)) = line.split_once(':') else {
                continue;
            };
            let (name, value) = (name.trim(), value.trim());

            if name.eq_ignore_ascii_case("content-length") {
                summary.content_length = value.parse().ok();
            } else if name.eq_ignore_ascii_case("transfer-encoding") {
                summary.chunked = value.to_ascii_lowercase().contains("chunked");
            } else if name.eq_ignore_ascii_case(CROSS_ORIGIN_OPENER_POLICY.as_str()) {
                coop = true;
            } else if name.eq_ignore_ascii_case(CROSS_ORIGIN_EMBEDDER_POLICY.as_str()) {
                coep = true;
            }
        }

        summary.isolated = coop && coep;
        summary
    }
}

fn find_head_end(bytes: &[u8]) -> Option<usize> {
    bytes.windows(4).position(|w| w == b"\r\n\r\n")
}
