//! # zipfly
//!
//! Build ZIP archives on the fly from remotely hosted files and stream them
//! straight to an HTTP client.
//!
//! Nothing is staged on disk: each file is fetched when its turn comes and
//! copied into the archive as it arrives, so memory use stays bounded by
//! one entry's in-flight bytes no matter how large the archive gets.
//!
//! ## Features
//!
//! - `GET /zip` with a base64 URL pointing at a JSON file list, or
//!   `POST /zip` with the list in the body
//! - Per-file choice of STORED or DEFLATE
//! - Path-traversal safe archive paths
//! - HMAC-SHA256 request signatures with expiry
//! - ZIP64 for large archives
//!
//! ## Example
//!
//! ```no_run
//! use zipfly::io::{HttpSource, MemorySink};
//! use zipfly::{Entry, ZipStreamer};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let entries = vec![
//!         Entry::new("https://example.com/a.jpg", "photos/a.jpg", false)?,
//!         Entry::new("https://example.com/notes.txt", "notes.txt", true)?,
//!     ];
//!
//!     let source = HttpSource::new()?;
//!     let mut sink = MemorySink::new();
//!     let summary = ZipStreamer::new(entries)?.stream_to(&source, &mut sink).await?;
//!     println!("{} entries, {} bytes", summary.entries, summary.bytes_written);
//!
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod entry;
pub mod error;
pub mod io;
pub mod logging;
pub mod server;
pub mod signature;
pub mod zip;

pub use cli::Cli;
pub use entry::{Entry, FileDescriptor};
pub use error::{ArchiveError, AuthError, EntryError, FetchError, RequestError};
pub use io::{ArchiveSink, ContentSource};
pub use server::{Server, ServerOptions, ZipPayload};
pub use signature::{SignaturePolicy, SignatureValidator};
pub use zip::{ArchiveSummary, CompressionMethod, ZipStreamer};
