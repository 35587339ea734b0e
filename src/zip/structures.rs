use byteorder::{LittleEndian, WriteBytesExt};
use chrono::{Datelike, NaiveDateTime, Timelike};

/// ZIP compression methods
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionMethod {
    Stored,
    Deflate,
}

impl CompressionMethod {
    pub fn as_u16(&self) -> u16 {
        match self {
            CompressionMethod::Stored => 0,
            CompressionMethod::Deflate => 8,
        }
    }
}

/// Version needed to extract: 2.0 (deflate, data descriptors)
pub const VERSION_DEFAULT: u16 = 20;
/// Version needed to extract: 4.5 (ZIP64)
pub const VERSION_ZIP64: u16 = 45;

/// General purpose flag: sizes and CRC follow the data in a data descriptor
pub const FLAG_DATA_DESCRIPTOR: u16 = 0x0008;
/// General purpose flag: file name is UTF-8
pub const FLAG_UTF8: u16 = 0x0800;

/// ZIP64 extended information extra field ID
pub const ZIP64_EXTRA_ID: u16 = 0x0001;

const U16_MAX: u64 = u16::MAX as u64;
const U32_MAX: u64 = u32::MAX as u64;

/// MS-DOS date and time as stored in ZIP headers (2 second resolution).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DosDateTime {
    pub time: u16,
    pub date: u16,
}

impl DosDateTime {
    /// Encode a calendar time. Years outside 1980..=2107 are clamped,
    /// the DOS epoch cannot represent them.
    pub fn from_datetime(dt: &NaiveDateTime) -> Self {
        let year = dt.year().clamp(1980, 2107) as u16;
        let date = ((year - 1980) << 9) | ((dt.month() as u16) << 5) | dt.day() as u16;
        let time = ((dt.hour() as u16) << 11)
            | ((dt.minute() as u16) << 5)
            | (dt.second().min(59) as u16 / 2);
        Self { time, date }
    }

    /// Current local time.
    pub fn now() -> Self {
        Self::from_datetime(&chrono::Local::now().naive_local())
    }
}

/// Local File Header (LFH) - 30 bytes plus name
pub struct LocalFileHeader<'a> {
    pub flags: u16,
    pub compression_method: CompressionMethod,
    pub modified: DosDateTime,
    pub file_name: &'a str,
}

impl LocalFileHeader<'_> {
    pub const SIGNATURE: &'static [u8] = b"PK\x03\x04";
    pub const SIZE: usize = 30;

    /// Header for an entry whose CRC and sizes are only known after its
    /// data has been written.
    pub fn streaming<'a>(
        file_name: &'a str,
        compression_method: CompressionMethod,
        modified: DosDateTime,
    ) -> LocalFileHeader<'a> {
        LocalFileHeader {
            flags: FLAG_DATA_DESCRIPTOR | FLAG_UTF8,
            compression_method,
            modified,
            file_name,
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(Self::SIZE + self.file_name.len());
        buf.extend_from_slice(Self::SIGNATURE);
        put_u16(&mut buf, VERSION_DEFAULT);
        put_u16(&mut buf, self.flags);
        put_u16(&mut buf, self.compression_method.as_u16());
        put_u16(&mut buf, self.modified.time);
        put_u16(&mut buf, self.modified.date);
        // CRC-32, compressed and uncompressed sizes live in the data descriptor
        put_u32(&mut buf, 0);
        put_u32(&mut buf, 0);
        put_u32(&mut buf, 0);
        put_u16(&mut buf, self.file_name.len() as u16);
        put_u16(&mut buf, 0);
        buf.extend_from_slice(self.file_name.as_bytes());
        buf
    }
}

/// Data descriptor written after an entry's data - 16 bytes, or 24 with
/// 64-bit sizes
#[derive(Debug, Clone, Copy)]
pub struct DataDescriptor {
    pub crc32: u32,
    pub compressed_size: u64,
    pub uncompressed_size: u64,
}

impl DataDescriptor {
    pub const SIGNATURE: &'static [u8] = b"PK\x07\x08";
    pub const SIZE: usize = 16;
    pub const ZIP64_SIZE: usize = 24;

    pub fn is_zip64(&self) -> bool {
        self.compressed_size >= U32_MAX || self.uncompressed_size >= U32_MAX
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(Self::ZIP64_SIZE);
        buf.extend_from_slice(Self::SIGNATURE);
        put_u32(&mut buf, self.crc32);
        if self.is_zip64() {
            put_u64(&mut buf, self.compressed_size);
            put_u64(&mut buf, self.uncompressed_size);
        } else {
            put_u32(&mut buf, self.compressed_size as u32);
            put_u32(&mut buf, self.uncompressed_size as u32);
        }
        buf
    }
}

/// Central Directory File Header (CDFH) - 46 bytes minimum
#[derive(Debug, Clone)]
pub struct CentralDirectoryHeader {
    pub file_name: String,
    pub flags: u16,
    pub compression_method: CompressionMethod,
    pub modified: DosDateTime,
    pub descriptor: DataDescriptor,
    pub lfh_offset: u64,
}

impl CentralDirectoryHeader {
    pub const SIGNATURE: &'static [u8] = b"PK\x01\x02";
    pub const MIN_SIZE: usize = 46;

    pub fn is_zip64(&self) -> bool {
        self.descriptor.is_zip64() || self.lfh_offset >= U32_MAX
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let zip64 = self.is_zip64();
        let version = if zip64 { VERSION_ZIP64 } else { VERSION_DEFAULT };
        let extra_len = if zip64 { 28 } else { 0 };

        let mut buf = Vec::with_capacity(Self::MIN_SIZE + self.file_name.len() + extra_len);
        buf.extend_from_slice(Self::SIGNATURE);
        put_u16(&mut buf, version); // version made by
        put_u16(&mut buf, version); // version needed
        put_u16(&mut buf, self.flags);
        put_u16(&mut buf, self.compression_method.as_u16());
        put_u16(&mut buf, self.modified.time);
        put_u16(&mut buf, self.modified.date);
        put_u32(&mut buf, self.descriptor.crc32);
        if zip64 {
            // Real values are in the ZIP64 extra field
            put_u32(&mut buf, u32::MAX);
            put_u32(&mut buf, u32::MAX);
        } else {
            put_u32(&mut buf, self.descriptor.compressed_size as u32);
            put_u32(&mut buf, self.descriptor.uncompressed_size as u32);
        }
        put_u16(&mut buf, self.file_name.len() as u16);
        put_u16(&mut buf, extra_len as u16);
        put_u16(&mut buf, 0); // comment length
        put_u16(&mut buf, 0); // disk number start
        put_u16(&mut buf, 0); // internal attributes
        put_u32(&mut buf, 0); // external attributes
        put_u32(&mut buf, if zip64 { u32::MAX } else { self.lfh_offset as u32 });
        buf.extend_from_slice(self.file_name.as_bytes());

        if zip64 {
            put_u16(&mut buf, ZIP64_EXTRA_ID);
            put_u16(&mut buf, 24);
            put_u64(&mut buf, self.descriptor.uncompressed_size);
            put_u64(&mut buf, self.descriptor.compressed_size);
            put_u64(&mut buf, self.lfh_offset);
        }

        buf
    }
}

/// End of Central Directory (EOCD) - 22 bytes minimum
pub struct EndOfCentralDirectory {
    pub total_entries: u64,
    pub cd_size: u64,
    pub cd_offset: u64,
}

impl EndOfCentralDirectory {
    pub const SIGNATURE: &'static [u8] = b"PK\x05\x06";
    pub const SIZE: usize = 22;

    pub fn is_zip64(&self) -> bool {
        self.total_entries >= U16_MAX || self.cd_size >= U32_MAX || self.cd_offset >= U32_MAX
    }

    /// Encode the trailer. When any field overflows the classic record, the
    /// ZIP64 EOCD and its locator are emitted first and the classic fields
    /// are saturated.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(Zip64EOCD::SIZE + Zip64EOCDLocator::SIZE + Self::SIZE);

        if self.is_zip64() {
            let eocd64_offset = self.cd_offset + self.cd_size;
            buf.extend(
                Zip64EOCD {
                    total_entries: self.total_entries,
                    cd_size: self.cd_size,
                    cd_offset: self.cd_offset,
                }
                .to_bytes(),
            );
            buf.extend(Zip64EOCDLocator { eocd64_offset }.to_bytes());
        }

        buf.extend_from_slice(Self::SIGNATURE);
        put_u16(&mut buf, 0); // disk number
        put_u16(&mut buf, 0); // disk with central directory
        put_u16(&mut buf, self.total_entries.min(U16_MAX) as u16);
        put_u16(&mut buf, self.total_entries.min(U16_MAX) as u16);
        put_u32(&mut buf, self.cd_size.min(U32_MAX) as u32);
        put_u32(&mut buf, self.cd_offset.min(U32_MAX) as u32);
        put_u16(&mut buf, 0); // comment length
        buf
    }
}

/// ZIP64 End of Central Directory Locator - 20 bytes
pub struct Zip64EOCDLocator {
    pub eocd64_offset: u64,
}

impl Zip64EOCDLocator {
    pub const SIGNATURE: &'static [u8] = b"PK\x06\x07";
    pub const SIZE: usize = 20;

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(Self::SIZE);
        buf.extend_from_slice(Self::SIGNATURE);
        put_u32(&mut buf, 0); // disk with ZIP64 EOCD
        put_u64(&mut buf, self.eocd64_offset);
        put_u32(&mut buf, 1); // total disks
        buf
    }
}

/// ZIP64 End of Central Directory - 56 bytes
pub struct Zip64EOCD {
    pub total_entries: u64,
    pub cd_size: u64,
    pub cd_offset: u64,
}

impl Zip64EOCD {
    pub const SIGNATURE: &'static [u8] = b"PK\x06\x06";
    pub const SIZE: usize = 56;

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(Self::SIZE);
        buf.extend_from_slice(Self::SIGNATURE);
        // Size of the remaining record, excluding the leading 12 bytes
        put_u64(&mut buf, (Self::SIZE - 12) as u64);
        put_u16(&mut buf, VERSION_ZIP64);
        put_u16(&mut buf, VERSION_ZIP64);
        put_u32(&mut buf, 0);
        put_u32(&mut buf, 0);
        put_u64(&mut buf, self.total_entries);
        put_u64(&mut buf, self.total_entries);
        put_u64(&mut buf, self.cd_size);
        put_u64(&mut buf, self.cd_offset);
        buf
    }
}

// Writes into a Vec<u8> cannot fail.
fn put_u16(buf: &mut Vec<u8>, value: u16) {
    let _ = buf.write_u16::<LittleEndian>(value);
}

fn put_u32(buf: &mut Vec<u8>, value: u32) {
    let _ = buf.write_u32::<LittleEndian>(value);
}

fn put_u64(buf: &mut Vec<u8>, value: u64) {
    let _ = buf.write_u64::<LittleEndian>(value);
}
