//! Requested files and their validated archive entries.
//!
//! A [`FileDescriptor`] is what a caller sends; an [`Entry`] is what the
//! archive streamer accepts. The only way from one to the other is
//! [`Entry::new`], which rejects non-HTTP sources and archive paths that
//! would land outside the archive root.

mod path;

pub use path::{clean, normalize};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{EntryError, FetchError};
use crate::io::{ContentSource, ContentStream};
use crate::zip::CompressionMethod;

/// Longest name a ZIP header can record (16-bit length field).
pub const MAX_ARCHIVE_PATH_LEN: usize = u16::MAX as usize;

/// One requested file, as received from the client.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileDescriptor {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub filename: String,
    #[serde(default)]
    pub compress: bool,
}

/// A validated file to include in an archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    source_url: Url,
    archive_path: String,
    compression_method: CompressionMethod,
}

impl Entry {
    /// Validate a source URL and archive path.
    ///
    /// # Errors
    ///
    /// - [`EntryError::InvalidUrl`] if the URL does not parse or is not
    ///   `http`/`https`
    /// - [`EntryError::PathTraversal`] if the cleaned path starts with `..`
    /// - [`EntryError::InvalidFilename`] if the cleaned path has no file name
    ///   or is longer than [`MAX_ARCHIVE_PATH_LEN`] bytes
    pub fn new(source_url: &str, archive_path: &str, compress: bool) -> Result<Self, EntryError> {
        let invalid_url = || EntryError::InvalidUrl {
            url: source_url.to_string(),
        };
        let url = Url::parse(source_url).map_err(|_| invalid_url())?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(invalid_url());
        }

        let normalized = path::normalize(archive_path);

        if path::escapes_root(&normalized) {
            return Err(EntryError::PathTraversal { path: normalized });
        }

        let name = path::base_name(&normalized);
        if name.is_empty() || name == "." || normalized.len() > MAX_ARCHIVE_PATH_LEN {
            return Err(EntryError::InvalidFilename {
                path: archive_path.to_string(),
            });
        }

        let compression_method = if compress {
            CompressionMethod::Deflate
        } else {
            CompressionMethod::Stored
        };

        Ok(Self {
            source_url: url,
            archive_path: normalized,
            compression_method,
        })
    }

    pub fn from_descriptor(file: &FileDescriptor) -> Result<Self, EntryError> {
        Self::new(&file.url, &file.filename, file.compress)
    }

    pub fn source_url(&self) -> &Url {
        &self.source_url
    }

    /// Normalized, relative, `/`-separated path inside the archive.
    pub fn archive_path(&self) -> &str {
        &self.archive_path
    }

    pub fn compression_method(&self) -> CompressionMethod {
        self.compression_method
    }

    /// Open this entry's content. The caller owns the returned stream and
    /// releases it by dropping it.
    pub async fn open<S>(&self, source: &S) -> Result<ContentStream, FetchError>
    where
        S: ContentSource + ?Sized,
    {
        source.open(&self.source_url).await
    }

    /// Advisory content size, `0` when unknown.
    pub async fn estimated_size<S>(&self, source: &S) -> u64
    where
        S: ContentSource + ?Sized,
    {
        source.content_length(&self.source_url).await.unwrap_or(0)
    }
}
