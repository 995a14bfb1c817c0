//! Async readers that misbehave on purpose.

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, ReadBuf};

/// Yields a prefix of bytes and then fails, like a client that disconnects
/// part way through an upload.
#[derive(Debug)]
pub struct FailingReader {
    prefix: Vec<u8>,
    position: usize,
}

impl FailingReader {
    /// Reader that yields `prefix` and then errors.
    #[must_use]
    pub const fn after(prefix: Vec<u8>) -> Self {
        Self {
            prefix,
            position: 0,
        }
    }
}

impl AsyncRead for FailingReader {
    fn poll_read(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let remaining = self.prefix.len() - self.position;
        if remaining == 0 {
            return Poll::Ready(Err(io::Error::new(
                io::ErrorKind::ConnectionReset,
                "client disconnected",
            )));
        }
        let take = remaining.min(buf.remaining());
        let start = self.position;
        buf.put_slice(&self.prefix[start..start + take]);
        self.position += take;
        Poll::Ready(Ok(()))
    }
}

/// Never produces data and never completes.
#[derive(Debug, Default)]
pub struct PendingReader;

impl AsyncRead for PendingReader {
    fn poll_read(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        _buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Poll::Pending
    }
}
