//! Error types shared by the entry model, the archive streamer, request
//! signing and the HTTP layer.

use thiserror::Error;

/// Reasons a requested file cannot become an [`Entry`](crate::entry::Entry).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EntryError {
    /// The source URL is unparsable or not `http`/`https`.
    #[error("invalid file url: {url}")]
    InvalidUrl { url: String },

    /// The archive path escapes the archive root once cleaned.
    #[error("invalid zip filename (path traversal): {path}")]
    PathTraversal { path: String },

    /// The archive path has no usable final segment.
    #[error("invalid zip filename: {path:?}")]
    InvalidFilename { path: String },
}

/// Failure to retrieve content from an upstream URL.
#[derive(Error, Debug)]
pub enum FetchError {
    /// Transport-level failure (DNS, connect, TLS, body read).
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Upstream answered with a non-success status.
    #[error("couldn't fetch from {url}: HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised while building or streaming an archive.
#[derive(Error, Debug)]
pub enum ArchiveError {
    /// No files were requested.
    #[error("no file to zip")]
    EmptyInput,

    #[error(transparent)]
    Entry(#[from] EntryError),

    /// Content for `path` could not be fetched.
    #[error("failed to fetch {path}: {source}")]
    Fetch {
        path: String,
        #[source]
        source: FetchError,
    },

    /// Writing to the output failed (including client disconnects).
    #[error("failed to write {path}: {source}")]
    Stream {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl ArchiveError {
    /// Archive path of the entry being written when the error occurred.
    pub fn path(&self) -> Option<&str> {
        match self {
            Self::Fetch { path, .. } | Self::Stream { path, .. } => Some(path),
            Self::EmptyInput | Self::Entry(_) => None,
        }
    }

    /// True when the error happened after output may already have been sent.
    pub fn is_mid_stream(&self) -> bool {
        matches!(self, Self::Fetch { .. } | Self::Stream { .. })
    }
}

/// Request authentication failures.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthError {
    #[error("missing signature or expiry")]
    MissingSignature,

    #[error("expiry is not a unix timestamp")]
    InvalidExpiry,

    #[error("signature expired")]
    Expired,

    #[error("signature mismatch")]
    SignatureMismatch,
}

/// Errors surfaced to HTTP clients before any response byte is written.
#[derive(Error, Debug)]
pub enum RequestError {
    #[error("invalid signature")]
    Unauthorized(#[from] AuthError),

    #[error("missing source url")]
    MissingSource,

    #[error("invalid source url")]
    InvalidSource,

    #[error("couldn't fetch archive description: {0}")]
    SourceFetch(#[from] FetchError),

    #[error("invalid payload: {0}")]
    InvalidPayload(#[from] serde_json::Error),

    #[error(transparent)]
    Archive(#[from] ArchiveError),

    #[error("invalid archive name")]
    InvalidArchiveName,
}
