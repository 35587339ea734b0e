//! Streaming ZIP archive creation.
//!
//! This module writes ZIP archives front to back into a non-seekable sink,
//! fetching each entry's content only when it is its turn.
//!
//! ## Architecture
//!
//! - [`structures`]: ZIP format records (local headers, data descriptors,
//!   central directory, EOCD) and their byte encoding
//! - [`streamer`]: [`ZipStreamer`], which turns an ordered list of entries
//!   into an archive
//!
//! ## Layout Produced
//!
//! For every entry, in request order:
//! 1. Local file header with CRC and sizes zeroed (data-descriptor flag set)
//! 2. Entry data, stored or raw deflate
//! 3. Data descriptor with the real CRC-32 and sizes
//!
//! then the Central Directory and the End of Central Directory record.
//! ZIP64 records are added when sizes, offsets or the entry count overflow
//! the classic fields.
//!
//! ## Limitations
//!
//! - No encryption
//! - No archive or entry comments
//! - Readers must honour data descriptors (any reader using the central
//!   directory does)

mod streamer;
mod structures;

pub use streamer::{ArchiveSummary, ZipStreamer};
pub use structures::*;
