use async_trait::async_trait;
use bytes::Bytes;
use futures::TryStreamExt;
use reqwest::Client;
use std::time::Duration;
use tokio_util::io::StreamReader;
use url::Url;

use super::{ContentSource, ContentStream};
use crate::error::FetchError;

/// Content source fetching entries over HTTP(S)
#[derive(Clone)]
pub struct HttpSource {
    client: Client,
}

impl HttpSource {
    /// Create a source with a fresh connection pool.
    ///
    /// Only connection establishment is bounded; bodies may take as long as
    /// the client keeps reading.
    pub fn new() -> Result<Self, FetchError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self { client })
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    /// Fetch a whole (small) document into memory
    pub async fn fetch_bytes(&self, url: &Url) -> Result<Bytes, FetchError> {
        let resp = self.get(url).await?;
        Ok(resp.bytes().await?)
    }

    async fn get(&self, url: &Url) -> Result<reqwest::Response, FetchError> {
        let resp = self.client.get(url.clone()).send().await?;

        if !resp.status().is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: resp.status().as_u16(),
            });
        }

        Ok(resp)
    }
}

#[async_trait]
impl ContentSource for HttpSource {
    async fn open(&self, url: &Url) -> Result<ContentStream, FetchError> {
        let resp = self.get(url).await?;

        let body = resp.bytes_stream().map_err(std::io::Error::other);
        Ok(Box::new(StreamReader::new(Box::pin(body))))
    }

    async fn content_length(&self, url: &Url) -> Option<u64> {
        let resp = self.client.head(url.clone()).send().await.ok()?;

        if !resp.status().is_success() {
            return None;
        }

        resp.headers()
            .get(reqwest::header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse().ok())
    }
}
