use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Cursor, Write};

use crate::error::{Error, Result};

/// ZIP compression methods
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionMethod {
    Stored,
    Deflate,
    Unknown(u16),
}

impl CompressionMethod {
    pub fn from_u16(value: u16) -> Self {
        match value {
            0 => CompressionMethod::Stored,
            8 => CompressionMethod::Deflate,
            _ => CompressionMethod::Unknown(value),
        }
    }

    pub fn as_u16(&self) -> u16 {
        match self {
            CompressionMethod::Stored => 0,
            CompressionMethod::Deflate => 8,
            CompressionMethod::Unknown(v) => *v,
        }
    }
}

/// "Version needed to extract" / "version made by" written by this crate (2.0).
pub const VERSION: u16 = 20;

/// General purpose flag bit marking an encrypted entry.
pub const FLAG_ENCRYPTED: u16 = 0x0001;

/// End of Central Directory (EOCD) - 22 bytes minimum
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndOfCentralDirectory {
    pub disk_number: u16,
    pub disk_with_cd: u16,
    pub disk_entries: u16,
    pub total_entries: u16,
    pub cd_size: u32,
    pub cd_offset: u32,
    pub comment_len: u16,
}

impl EndOfCentralDirectory {
    pub const SIGNATURE: &'static [u8] = b"PK\x05\x06";
    pub const SIZE: usize = 22;

    /// Single-disk EOCD for `entries` records occupying `cd_size` bytes at `cd_offset`.
    pub fn new(entries: u16, cd_size: u32, cd_offset: u32) -> Self {
        Self {
            disk_number: 0,
            disk_with_cd: 0,
            disk_entries: entries,
            total_entries: entries,
            cd_size,
            cd_offset,
            comment_len: 0,
        }
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < Self::SIZE || &data[0..4] != Self::SIGNATURE {
            return Err(Error::format("EOCD not found"));
        }

        let mut cursor = Cursor::new(&data[4..]);

        Ok(Self {
            disk_number: cursor.read_u16::<LittleEndian>()?,
            disk_with_cd: cursor.read_u16::<LittleEndian>()?,
            disk_entries: cursor.read_u16::<LittleEndian>()?,
            total_entries: cursor.read_u16::<LittleEndian>()?,
            cd_size: cursor.read_u32::<LittleEndian>()?,
            cd_offset: cursor.read_u32::<LittleEndian>()?,
            comment_len: cursor.read_u16::<LittleEndian>()?,
        })
    }

    pub fn write_to<W: Write>(&self, out: &mut W) -> std::io::Result<()> {
        out.write_all(Self::SIGNATURE)?;
        out.write_u16::<LittleEndian>(self.disk_number)?;
        out.write_u16::<LittleEndian>(self.disk_with_cd)?;
        out.write_u16::<LittleEndian>(self.disk_entries)?;
        out.write_u16::<LittleEndian>(self.total_entries)?;
        out.write_u32::<LittleEndian>(self.cd_size)?;
        out.write_u32::<LittleEndian>(self.cd_offset)?;
        out.write_u16::<LittleEndian>(self.comment_len)?;
        Ok(())
    }

    pub fn is_zip64(&self) -> bool {
        self.disk_entries == 0xFFFF
            || self.total_entries == 0xFFFF
            || self.cd_size == 0xFFFFFFFF
            || self.cd_offset == 0xFFFFFFFF
    }

    pub fn is_multi_disk(&self) -> bool {
        self.disk_number != 0 || self.disk_with_cd != 0 || self.disk_entries != self.total_entries
    }
}

/// Central Directory File Header (CDFH) - 46 bytes minimum
pub const CDFH_SIGNATURE: &[u8] = b"PK\x01\x02";
pub const CDFH_MIN_SIZE: usize = 46;

/// Local File Header (LFH) - 30 bytes
pub const LFH_SIGNATURE: &[u8] = b"PK\x03\x04";
pub const LFH_SIZE: usize = 30;

/// Metadata of one archive member, shared by the writer and the parser.
///
/// Only STORE is ever written, so `compressed_size == uncompressed_size` for
/// every record this crate produces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZipEntryRecord {
    pub name: String,
    pub crc32: u32,
    pub compressed_size: u32,
    pub uncompressed_size: u32,
    pub compression_method: CompressionMethod,
    pub flags: u16,
    pub local_header_offset: u32,
    pub is_directory: bool,
}

impl ZipEntryRecord {
    /// A STORE record for `name` holding `size` bytes with checksum `crc32`.
    pub fn stored(name: String, crc32: u32, size: u32, local_header_offset: u32) -> Self {
        let is_directory = name.ends_with('/');
        Self {
            name,
            crc32,
            compressed_size: size,
            uncompressed_size: size,
            compression_method: CompressionMethod::Stored,
            flags: 0,
            local_header_offset,
            is_directory,
        }
    }

    pub fn is_encrypted(&self) -> bool {
        self.flags & FLAG_ENCRYPTED != 0
    }

    fn name_len(&self) -> std::io::Result<u16> {
        u16::try_from(self.name.len()).map_err(|_| {
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "entry name too long")
        })
    }

    /// Emit the local file header (without the data that follows it).
    pub fn write_local_header<W: Write>(&self, out: &mut W) -> std::io::Result<()> {
        out.write_all(LFH_SIGNATURE)?;
        out.write_u16::<LittleEndian>(VERSION)?; // version needed
        out.write_u16::<LittleEndian>(self.flags)?;
        out.write_u16::<LittleEndian>(self.compression_method.as_u16())?;
        out.write_u16::<LittleEndian>(0)?; // mod time
        out.write_u16::<LittleEndian>(0)?; // mod date
        out.write_u32::<LittleEndian>(self.crc32)?;
        out.write_u32::<LittleEndian>(self.compressed_size)?;
        out.write_u32::<LittleEndian>(self.uncompressed_size)?;
        out.write_u16::<LittleEndian>(self.name_len()?)?;
        out.write_u16::<LittleEndian>(0)?; // extra length
        out.write_all(self.name.as_bytes())?;
        Ok(())
    }

    /// Emit the central directory header for this record.
    pub fn write_central_header<W: Write>(&self, out: &mut W) -> std::io::Result<()> {
        out.write_all(CDFH_SIGNATURE)?;
        out.write_u16::<LittleEndian>(VERSION)?; // version made by
        out.write_u16::<LittleEndian>(VERSION)?; // version needed
        out.write_u16::<LittleEndian>(self.flags)?;
        out.write_u16::<LittleEndian>(self.compression_method.as_u16())?;
        out.write_u16::<LittleEndian>(0)?; // mod time
        out.write_u16::<LittleEndian>(0)?; // mod date
        out.write_u32::<LittleEndian>(self.crc32)?;
        out.write_u32::<LittleEndian>(self.compressed_size)?;
        out.write_u32::<LittleEndian>(self.uncompressed_size)?;
        out.write_u16::<LittleEndian>(self.name_len()?)?;
        out.write_u16::<LittleEndian>(0)?; // extra length
        out.write_u16::<LittleEndian>(0)?; // comment length
        out.write_u16::<LittleEndian>(0)?; // disk number start
        out.write_u16::<LittleEndian>(0)?; // internal attrs
        out.write_u32::<LittleEndian>(0)?; // external attrs
        out.write_u32::<LittleEndian>(self.local_header_offset)?;
        out.write_all(self.name.as_bytes())?;
        Ok(())
    }

    pub fn local_header_len(&self) -> usize {
        LFH_SIZE + self.name.len()
    }

    pub fn central_header_len(&self) -> usize {
        CDFH_MIN_SIZE + self.name.len()
    }
}
