//! Archive requests: the JSON payload and how `GET` requests obtain it.

use base64::Engine;
use base64::prelude::BASE64_STANDARD;
use serde::{Deserialize, Serialize};
use tracing::info;
use url::Url;
use url::form_urlencoded;

use crate::entry::FileDescriptor;
use crate::error::RequestError;
use crate::io::HttpSource;

/// Archive name used when the request does not provide one.
pub const DEFAULT_ARCHIVE_NAME: &str = "archive.zip";

/// Body of a `POST /zip` request, or the document a `GET /zip` source URL
/// points to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZipPayload {
    #[serde(default)]
    pub filename: String,
    /// Files in archive order. `links` is accepted for older clients.
    #[serde(default, alias = "links")]
    pub files: Vec<FileDescriptor>,
}

impl ZipPayload {
    pub fn from_json(body: &[u8]) -> Result<Self, RequestError> {
        Ok(serde_json::from_slice(body)?)
    }

    /// Resolve a `GET` query: decode the base64 `source` URL, fetch the
    /// payload it points to and apply a `filename` override.
    pub async fn from_query(query: &str, source: &HttpSource) -> Result<Self, RequestError> {
        let params = GetParams::parse(query);

        let encoded = params
            .source
            .filter(|s| !s.is_empty())
            .ok_or(RequestError::MissingSource)?;
        let source_url = decode_source_url(&encoded)?;

        info!(source = %source_url, "fetching files to zip");
        let body = source.fetch_bytes(&source_url).await?;
        let mut payload = Self::from_json(&body)?;

        if let Some(filename) = params.filename {
            payload.filename = filename;
        }

        Ok(payload)
    }

    /// Name for the `Content-Disposition` header.
    pub fn archive_name(&self) -> &str {
        if self.filename.is_empty() {
            DEFAULT_ARCHIVE_NAME
        } else {
            &self.filename
        }
    }
}

#[derive(Debug, Default)]
struct GetParams {
    source: Option<String>,
    filename: Option<String>,
}

impl GetParams {
    /// First value wins for repeated parameters.
    fn parse(query: &str) -> Self {
        let mut params = Self::default();
        for (key, value) in form_urlencoded::parse(query.as_bytes()) {
            match &*key {
                "source" if params.source.is_none() => params.source = Some(value.into_owned()),
                "filename" if params.filename.is_none() => {
                    params.filename = Some(value.into_owned())
                }
                _ => {}
            }
        }
        params
    }
}

fn decode_source_url(encoded: &str) -> Result<Url, RequestError> {
    let decoded = BASE64_STANDARD
        .decode(encoded)
        .map_err(|_| RequestError::InvalidSource)?;
    let raw = String::from_utf8(decoded).map_err(|_| RequestError::InvalidSource)?;
    let url = Url::parse(&raw).map_err(|_| RequestError::InvalidSource)?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(RequestError::InvalidSource);
    }

    Ok(url)
}

/// `Content-Disposition` value for `name`, with characters that would break
/// the quoted string replaced by `_`.
pub fn content_disposition(name: &str) -> String {
    let safe: String = name
        .chars()
        .map(|c| match c {
            '"' | '\\' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    format!("attachment; filename=\"{safe}\"")
}
