use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use std::io::{Error, ErrorKind};
use tokio::sync::mpsc;

use super::ArchiveSink;

/// Sink feeding an HTTP response body through a bounded channel.
///
/// The channel bound is what gives backpressure: when the client reads
/// slowly the body stream stops draining and `write_all` waits.
pub struct BodySink {
    tx: mpsc::Sender<std::io::Result<Bytes>>,
}

impl BodySink {
    /// Create a sink and the body stream it feeds. `capacity` is the number
    /// of in-flight chunks.
    pub fn channel(
        capacity: usize,
    ) -> (Self, impl Stream<Item = std::io::Result<Bytes>> + Send + 'static) {
        let (tx, rx) = mpsc::channel(capacity.max(1));

        let body = futures::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|item| (item, rx))
        });

        (Self { tx }, body)
    }
}

#[async_trait]
impl ArchiveSink for BodySink {
    async fn write_all(&mut self, buf: &[u8]) -> std::io::Result<()> {
        if buf.is_empty() {
            return Ok(());
        }

        self.tx
            .send(Ok(Bytes::copy_from_slice(buf)))
            .await
            .map_err(|_| Error::new(ErrorKind::BrokenPipe, "client disconnected"))
    }

    async fn abort(&mut self, reason: &str) {
        // An error item makes the server drop the connection instead of
        // terminating the body normally. If the receiver is gone the
        // connection is already closed.
        let _ = self
            .tx
            .send(Err(Error::new(ErrorKind::ConnectionAborted, reason.to_string())))
            .await;
    }
}

/// In-memory sink, mostly for tests and small archives
#[derive(Debug, Default)]
pub struct MemorySink {
    buf: Vec<u8>,
    aborted: bool,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bytes(&self) -> &[u8] {
        &self.buf
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.buf
    }

    /// Whether `abort` was called
    pub fn is_aborted(&self) -> bool {
        self.aborted
    }
}

#[async_trait]
impl ArchiveSink for MemorySink {
    async fn write_all(&mut self, buf: &[u8]) -> std::io::Result<()> {
        if self.aborted {
            return Err(Error::new(ErrorKind::ConnectionAborted, "sink aborted"));
        }
        self.buf.extend_from_slice(buf);
        Ok(())
    }

    async fn abort(&mut self, _reason: &str) {
        self.aborted = true;
    }
}
