//! Streaming ZIP writer.
//!
//! Entries are fetched one at a time, in order, and copied straight into
//! the sink. Because sizes and CRCs are unknown until an entry's data has
//! been written, every local header sets the data-descriptor flag and the
//! real values follow the data. The central directory at the end repeats
//! them authoritatively.

use crc32fast::Hasher;
use flate2::Compression;
use flate2::write::DeflateEncoder;
use std::io::Write;
use tokio::io::AsyncReadExt;
use tracing::{debug, warn};

use crate::entry::{Entry, FileDescriptor};
use crate::error::ArchiveError;
use crate::io::{ArchiveSink, ContentSource, ContentStream};

use super::structures::*;

/// Read buffer size for copying entry content.
const COPY_BUFFER_SIZE: usize = 64 * 1024;

/// Result of a completed archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArchiveSummary {
    /// Number of entries written
    pub entries: usize,
    /// Total archive size in bytes
    pub bytes_written: u64,
}

/// Ordered list of entries to stream as one archive.
#[derive(Debug)]
pub struct ZipStreamer {
    entries: Vec<Entry>,
}

impl ZipStreamer {
    /// Create a streamer. Fails with [`ArchiveError::EmptyInput`] when
    /// `entries` is empty.
    pub fn new(entries: Vec<Entry>) -> Result<Self, ArchiveError> {
        if entries.is_empty() {
            return Err(ArchiveError::EmptyInput);
        }
        Ok(Self { entries })
    }

    /// Validate every descriptor, stopping at the first invalid one.
    pub fn from_descriptors(files: &[FileDescriptor]) -> Result<Self, ArchiveError> {
        if files.is_empty() {
            return Err(ArchiveError::EmptyInput);
        }

        let entries = files
            .iter()
            .map(Entry::from_descriptor)
            .collect::<Result<Vec<_>, _>>()?;

        Self::new(entries)
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    /// Sum of every entry's advisory size. Never used to size the archive.
    pub async fn estimated_size<S>(&self, source: &S) -> u64
    where
        S: ContentSource + ?Sized,
    {
        let mut total = 0u64;
        for entry in &self.entries {
            total = total.saturating_add(entry.estimated_size(source).await);
        }
        total
    }

    /// Write the archive to `sink`.
    ///
    /// Stops at the first entry that fails to fetch or write; later entries
    /// are not attempted and the trailing central directory is not written,
    /// so the partial output is never a valid archive.
    pub async fn stream_to<S, K>(self, source: &S, sink: &mut K) -> Result<ArchiveSummary, ArchiveError>
    where
        S: ContentSource + ?Sized,
        K: ArchiveSink + ?Sized,
    {
        let mut out = CountingSink { inner: sink, offset: 0 };
        let mut directory = Vec::with_capacity(self.entries.len());

        for entry in &self.entries {
            match write_entry(&mut out, source, entry).await {
                Ok(header) => directory.push(header),
                Err(e) => {
                    warn!(path = entry.archive_path(), error = %e, "aborting archive");
                    return Err(e);
                }
            }
        }

        write_central_directory(&mut out, &directory)
            .await
            .map_err(|source| ArchiveError::Stream {
                path: "<central directory>".to_string(),
                source,
            })?;

        Ok(ArchiveSummary {
            entries: directory.len(),
            bytes_written: out.offset,
        })
    }
}

/// Sink wrapper tracking the current archive offset.
struct CountingSink<'a, K: ArchiveSink + ?Sized> {
    inner: &'a mut K,
    offset: u64,
}

impl<K: ArchiveSink + ?Sized> CountingSink<'_, K> {
    async fn write(&mut self, buf: &[u8]) -> std::io::Result<()> {
        self.inner.write_all(buf).await?;
        self.offset += buf.len() as u64;
        Ok(())
    }
}

async fn write_entry<S, K>(
    out: &mut CountingSink<'_, K>,
    source: &S,
    entry: &Entry,
) -> Result<CentralDirectoryHeader, ArchiveError>
where
    S: ContentSource + ?Sized,
    K: ArchiveSink + ?Sized,
{
    let path = entry.archive_path();
    let stream_err = |source: std::io::Error| ArchiveError::Stream {
        path: path.to_string(),
        source,
    };

    // The stream is dropped (and its connection released) on every path out
    // of this function.
    let mut content = entry
        .open(source)
        .await
        .map_err(|source| ArchiveError::Fetch {
            path: path.to_string(),
            source,
        })?;

    let lfh_offset = out.offset;
    let header = LocalFileHeader::streaming(path, entry.compression_method(), DosDateTime::now());
    out.write(&header.to_bytes()).await.map_err(stream_err)?;

    let descriptor = copy_content(out, &mut content, entry).await?;
    out.write(&descriptor.to_bytes()).await.map_err(stream_err)?;

    debug!(
        path,
        size = descriptor.uncompressed_size,
        compressed = descriptor.compressed_size,
        "entry written"
    );

    Ok(CentralDirectoryHeader {
        file_name: path.to_string(),
        flags: header.flags,
        compression_method: header.compression_method,
        modified: header.modified,
        descriptor,
        lfh_offset,
    })
}

/// Copy `content` into the entry's data region, compressing as needed.
async fn copy_content<K>(
    out: &mut CountingSink<'_, K>,
    content: &mut ContentStream,
    entry: &Entry,
) -> Result<DataDescriptor, ArchiveError>
where
    K: ArchiveSink + ?Sized,
{
    let path = entry.archive_path();
    let stream_err = |source: std::io::Error| ArchiveError::Stream {
        path: path.to_string(),
        source,
    };
    let fetch_err = |source: std::io::Error| ArchiveError::Fetch {
        path: path.to_string(),
        source: source.into(),
    };

    let mut hasher = Hasher::new();
    let mut encoder = match entry.compression_method() {
        CompressionMethod::Deflate => Some(DeflateEncoder::new(Vec::new(), Compression::default())),
        CompressionMethod::Stored => None,
    };
    let mut buf = vec![0u8; COPY_BUFFER_SIZE];
    let mut uncompressed_size = 0u64;
    let mut compressed_size = 0u64;

    loop {
        let n = content.read(&mut buf).await.map_err(fetch_err)?;
        if n == 0 {
            break;
        }

        let chunk = &buf[..n];
        hasher.update(chunk);
        uncompressed_size += n as u64;

        match encoder.as_mut() {
            Some(encoder) => {
                encoder.write_all(chunk).map_err(stream_err)?;
                let compressed = std::mem::take(encoder.get_mut());
                if !compressed.is_empty() {
                    out.write(&compressed).await.map_err(stream_err)?;
                    compressed_size += compressed.len() as u64;
                }
            }
            None => {
                out.write(chunk).await.map_err(stream_err)?;
                compressed_size += n as u64;
            }
        }
    }

    if let Some(encoder) = encoder {
        let tail = encoder.finish().map_err(stream_err)?;
        out.write(&tail).await.map_err(stream_err)?;
        compressed_size += tail.len() as u64;
    }

    Ok(DataDescriptor {
        crc32: hasher.finalize(),
        compressed_size,
        uncompressed_size,
    })
}

async fn write_central_directory<K>(
    out: &mut CountingSink<'_, K>,
    directory: &[CentralDirectoryHeader],
) -> std::io::Result<()>
where
    K: ArchiveSink + ?Sized,
{
    let cd_offset = out.offset;
    for header in directory {
        out.write(&header.to_bytes()).await?;
    }
    let cd_size = out.offset - cd_offset;

    let eocd = EndOfCentralDirectory {
        total_entries: directory.len() as u64,
        cd_size,
        cd_offset,
    };
    out.write(&eocd.to_bytes()).await?;
    out.inner.flush().await
}
