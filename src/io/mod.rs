mod http;
mod sink;

pub use http::HttpSource;
pub use sink::{BodySink, MemorySink};

use async_trait::async_trait;
use tokio::io::AsyncRead;
use url::Url;

use crate::error::FetchError;

/// Owned byte stream for one entry's content. Dropping it releases the
/// underlying connection.
pub type ContentStream = Box<dyn AsyncRead + Send + Unpin>;

/// Trait for acquiring entry content from where it is hosted
#[async_trait]
pub trait ContentSource: Send + Sync {
    /// Open the content at `url`, failing on transport errors and
    /// non-success statuses
    async fn open(&self, url: &Url) -> Result<ContentStream, FetchError>;

    /// Best-effort size of the content at `url`
    async fn content_length(&self, url: &Url) -> Option<u64>;
}

/// Trait for the output an archive is streamed into
#[async_trait]
pub trait ArchiveSink: Send {
    /// Write the whole buffer, waiting for the consumer if needed
    async fn write_all(&mut self, buf: &[u8]) -> std::io::Result<()>;

    /// Push any buffered bytes to the consumer
    async fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }

    /// Terminate the underlying transport so the consumer sees a failure
    /// rather than a normally completed stream
    async fn abort(&mut self, reason: &str);
}
