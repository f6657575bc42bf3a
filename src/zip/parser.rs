//! Low-level ZIP archive parser.
//!
//! This module handles the binary parsing of ZIP file structures,
//! reading from any source that implements the [`ReadAt`] trait.
//!
//! ## Parsing Strategy
//!
//! ZIP files are designed to be read from the end:
//! 1. Find the End of Central Directory (EOCD) by scanning backward
//! 2. Read the Central Directory to get metadata for all entries
//! 3. For extraction, read each entry's Local File Header and data
//!
//! Only single-disk, non-ZIP64 archives are accepted. A central directory
//! that disagrees with its EOCD rejects the whole archive.

use byteorder::{LittleEndian, ReadBytesExt};
use std::io::{Cursor, Read};
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::io::ReadAt;

use super::structures::*;

/// Largest comment an EOCD can carry; bounds the backward search window.
const MAX_COMMENT_SIZE: u64 = 65535;

/// Low-level ZIP file parser.
///
/// Typically used through [`ZipExtractor`](super::ZipExtractor)
/// rather than directly.
///
/// ## Example
///
/// ```ignore
/// let parser = ZipParser::new(reader);
/// let entries = parser.list_files().await?;
/// for entry in entries {
///     let offset = parser.get_data_offset(&entry).await?;
///     // Read file data from offset...
/// }
/// ```
pub struct ZipParser<R: ReadAt> {
    /// The underlying data source
    reader: Arc<R>,
    /// Total size of the archive in bytes
    size: u64,
}

impl<R: ReadAt> ZipParser<R> {
    pub fn new(reader: Arc<R>) -> Self {
        let size = reader.size();
        Self { reader, size }
    }

    /// Find and parse the End of Central Directory record.
    ///
    /// Tries the common comment-less layout first, then scans the last
    /// `MAX_COMMENT_SIZE + 22` bytes backward for the signature.
    ///
    /// # Returns
    ///
    /// A tuple of (EOCD record, offset of EOCD in file).
    ///
    /// # Errors
    ///
    /// [`Error::Format`] with "EOCD not found" when no signature with room
    /// for a full record exists in the search window.
    pub async fn find_eocd(&self) -> Result<(EndOfCentralDirectory, u64)> {
        let eocd_size = EndOfCentralDirectory::SIZE as u64;
        if self.size < eocd_size {
            return Err(Error::format("EOCD not found"));
        }

        let offset = self.size - eocd_size;
        let mut buf = vec![0u8; EndOfCentralDirectory::SIZE];
        self.reader.read_exact_at(offset, &mut buf).await?;

        if &buf[0..4] == EndOfCentralDirectory::SIGNATURE && buf[20..22] == [0, 0] {
            let eocd = EndOfCentralDirectory::from_bytes(&buf)?;
            return Ok((eocd, offset));
        }

        // Not at the tail - there may be a trailing comment or junk.
        let search_size = (MAX_COMMENT_SIZE + eocd_size).min(self.size);
        let search_start = self.size - search_size;

        let mut buf = vec![0u8; search_size as usize];
        self.reader.read_exact_at(search_start, &mut buf).await?;

        for i in (0..=buf.len() - EndOfCentralDirectory::SIZE).rev() {
            if &buf[i..i + 4] != EndOfCentralDirectory::SIGNATURE {
                continue;
            }
            let comment_len = u16::from_le_bytes([buf[i + 20], buf[i + 21]]) as usize;
            if i + EndOfCentralDirectory::SIZE + comment_len > buf.len() {
                continue;
            }
            let eocd = EndOfCentralDirectory::from_bytes(&buf[i..i + EndOfCentralDirectory::SIZE])?;
            return Ok((eocd, search_start + i as u64));
        }

        Err(Error::format("EOCD not found"))
    }

    /// List all entries in the ZIP archive, in central directory order.
    ///
    /// # Errors
    ///
    /// [`Error::Format`] if the EOCD is missing, describes a ZIP64 or
    /// multi-disk archive, points outside the file, or the central directory
    /// holds fewer well-formed records than the EOCD promises.
    pub async fn list_files(&self) -> Result<Vec<ZipEntryRecord>> {
        let (eocd, eocd_offset) = self.find_eocd().await?;

        if eocd.is_zip64() {
            return Err(Error::format("ZIP64 archives are not supported"));
        }
        if eocd.is_multi_disk() {
            return Err(Error::format("multi-disk archives are not supported"));
        }

        let cd_offset = eocd.cd_offset as u64;
        let cd_size = eocd.cd_size as u64;
        if cd_offset + cd_size > eocd_offset {
            return Err(Error::format(format!(
                "central directory ({cd_size} bytes at {cd_offset}) overlaps EOCD at {eocd_offset}"
            )));
        }

        let mut cd_data = vec![0u8; cd_size as usize];
        self.reader.read_exact_at(cd_offset, &mut cd_data).await?;

        let expected = eocd.disk_entries as usize;
        let mut entries = Vec::with_capacity(expected);
        let mut cursor = Cursor::new(cd_data.as_slice());

        for index in 0..expected {
            let entry = parse_cdfh(&mut cursor).map_err(|e| {
                Error::format(format!(
                    "truncated central directory: entry {index} of {expected}: {e}"
                ))
            })?;
            entries.push(entry);
        }

        Ok(entries)
    }

    /// Get the actual data offset for an entry.
    ///
    /// The Local File Header has its own filename and extra lengths, which
    /// may differ from the Central Directory entry, so they are read from
    /// the LFH itself.
    ///
    /// # Errors
    ///
    /// [`Error::Format`] if the LFH is invalid or the data would run past
    /// the end of the archive.
    pub async fn get_data_offset(&self, entry: &ZipEntryRecord) -> Result<u64> {
        let lfh_offset = entry.local_header_offset as u64;
        let mut lfh_buf = vec![0u8; LFH_SIZE];
        self.reader.read_exact_at(lfh_offset, &mut lfh_buf).await?;

        if &lfh_buf[0..4] != LFH_SIGNATURE {
            return Err(Error::format(format!(
                "invalid local file header for '{}' at offset {lfh_offset}",
                entry.name
            )));
        }

        let mut cursor = Cursor::new(&lfh_buf);
        cursor.set_position(26); // Offset to filename length field

        let file_name_length = cursor.read_u16::<LittleEndian>()? as u64;
        let extra_field_length = cursor.read_u16::<LittleEndian>()? as u64;

        let data_offset = lfh_offset + LFH_SIZE as u64 + file_name_length + extra_field_length;

        if data_offset + entry.compressed_size as u64 > self.size {
            return Err(Error::format(format!(
                "data for '{}' runs past end of archive",
                entry.name
            )));
        }

        Ok(data_offset)
    }

    pub fn reader(&self) -> &Arc<R> {
        &self.reader
    }
}

/// Parse one Central Directory File Header, leaving the cursor on the next.
fn parse_cdfh(cursor: &mut Cursor<&[u8]>) -> Result<ZipEntryRecord> {
    let mut sig = [0u8; 4];
    cursor.read_exact(&mut sig)?;
    if sig != CDFH_SIGNATURE {
        return Err(Error::format("bad central directory signature"));
    }

    let _version_made_by = cursor.read_u16::<LittleEndian>()?;
    let _version_needed = cursor.read_u16::<LittleEndian>()?;
    let flags = cursor.read_u16::<LittleEndian>()?;
    let compression_method = cursor.read_u16::<LittleEndian>()?;
    let _last_mod_time = cursor.read_u16::<LittleEndian>()?;
    let _last_mod_date = cursor.read_u16::<LittleEndian>()?;
    let crc32 = cursor.read_u32::<LittleEndian>()?;
    let compressed_size = cursor.read_u32::<LittleEndian>()?;
    let uncompressed_size = cursor.read_u32::<LittleEndian>()?;
    let file_name_length = cursor.read_u16::<LittleEndian>()?;
    let extra_field_length = cursor.read_u16::<LittleEndian>()?;
    let file_comment_length = cursor.read_u16::<LittleEndian>()?;
    let _disk_number_start = cursor.read_u16::<LittleEndian>()?;
    let _internal_attrs = cursor.read_u16::<LittleEndian>()?;
    let _external_attrs = cursor.read_u32::<LittleEndian>()?;
    let local_header_offset = cursor.read_u32::<LittleEndian>()?;

    let mut file_name_bytes = vec![0u8; file_name_length as usize];
    cursor.read_exact(&mut file_name_bytes)?;
    // Lossy conversion: the path guard still sees every separator and dot.
    let name = String::from_utf8_lossy(&file_name_bytes).into_owned();

    // Extra field and comment are not used, but must be inside the directory.
    let skip = extra_field_length as u64 + file_comment_length as u64;
    let next = cursor.position() + skip;
    if next > cursor.get_ref().len() as u64 {
        return Err(Error::format("central directory record overruns directory"));
    }
    cursor.set_position(next);

    let is_directory = name.ends_with('/');

    Ok(ZipEntryRecord {
        name,
        crc32,
        compressed_size,
        uncompressed_size,
        compression_method: CompressionMethod::from_u16(compression_method),
        flags,
        local_header_offset,
        is_directory,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::MemoryReader;
    use crate::zip::writer::ZipWriter;

    async fn build(entries: &[(&str, &str)]) -> Vec<u8> {
        let mut writer = ZipWriter::new(Vec::new());
        for (name, data) in entries {
            writer.add_entry(name, data.as_bytes()).await.unwrap();
        }
        writer.finish().await.unwrap()
    }

    fn parser(bytes: Vec<u8>) -> ZipParser<MemoryReader> {
        ZipParser::new(Arc::new(MemoryReader::new(bytes)))
    }

    #[tokio::test]
    async fn lists_written_entries() {
        let bytes = build(&[("a.txt", "hello"), ("d/b.txt", "world!")]).await;
        let parser = parser(bytes.clone());
        let entries = parser.list_files().await.unwrap();

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].name, "a.txt");
        assert_eq!(entries[1].name, "d/b.txt");
        assert_eq!(entries[1].uncompressed_size, 6);
        assert_eq!(entries[1].crc32, crate::crc::crc32(b"world!"));

        let offset = parser.get_data_offset(&entries[1]).await.unwrap() as usize;
        assert_eq!(&bytes[offset..offset + 6], b"world!");
    }

    #[tokio::test]
    async fn finds_eocd_behind_comment() {
        let mut bytes = build(&[("a.txt", "hello")]).await;
        let eocd_pos = bytes.len() - EndOfCentralDirectory::SIZE;
        bytes[eocd_pos + 20] = 7;
        bytes.extend_from_slice(b"comment");

        let (eocd, offset) = parser(bytes).find_eocd().await.unwrap();
        assert_eq!(offset as usize, eocd_pos);
        assert_eq!(eocd.total_entries, 1);
    }

    #[tokio::test]
    async fn finds_eocd_in_window_of_large_source() {
        let mut bytes = vec![0xAA; 200_000];
        bytes.extend_from_slice(&build(&[("a.txt", "hello")]).await);
        let eocd_pos = bytes.len() - EndOfCentralDirectory::SIZE;
        bytes[eocd_pos + 20] = 3;
        bytes.extend_from_slice(b"abc");

        let (eocd, offset) = parser(bytes).find_eocd().await.unwrap();
        assert_eq!(offset as usize, eocd_pos);
        assert_eq!(eocd.total_entries, 1);
    }

    #[tokio::test]
    async fn signature_before_window_is_not_found() {
        let mut bytes = build(&[("a.txt", "hello")]).await;
        bytes.extend(std::iter::repeat_n(0u8, MAX_COMMENT_SIZE as usize + 1));

        let err = parser(bytes).find_eocd().await.unwrap_err();
        assert!(matches!(err, Error::Format(ref msg) if msg == "EOCD not found"));
    }

    #[tokio::test]
    async fn rejects_buffer_without_eocd() {
        let err = parser(b"definitely not a zip archive".to_vec())
            .list_files()
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Format(ref msg) if msg == "EOCD not found"));

        let err = parser(Vec::new()).list_files().await.unwrap_err();
        assert!(matches!(err, Error::Format(_)));
    }

    #[tokio::test]
    async fn rejects_corrupt_central_directory() {
        let mut bytes = build(&[("a.txt", "hello"), ("b.txt", "x")]).await;
        let cd_offset = 30 + 5 + 5 + 30 + 5 + 1;
        // second central record loses its signature
        let second = cd_offset + 46 + 5;
        bytes[second] = b'X';

        let err = parser(bytes).list_files().await.unwrap_err();
        assert!(matches!(err, Error::Format(ref msg) if msg.contains("truncated central directory")));
    }

    #[tokio::test]
    async fn rejects_out_of_bounds_directory() {
        let mut bytes = build(&[("a.txt", "hello")]).await;
        let eocd_pos = bytes.len() - EndOfCentralDirectory::SIZE;
        bytes[eocd_pos + 16..eocd_pos + 20].copy_from_slice(&1000u32.to_le_bytes());

        let err = parser(bytes).list_files().await.unwrap_err();
        assert!(matches!(err, Error::Format(_)));
    }

    #[tokio::test]
    async fn rejects_zip64_marker() {
        let mut bytes = build(&[("a.txt", "hello")]).await;
        let eocd_pos = bytes.len() - EndOfCentralDirectory::SIZE;
        bytes[eocd_pos + 16..eocd_pos + 20].copy_from_slice(&u32::MAX.to_le_bytes());

        let err = parser(bytes).list_files().await.unwrap_err();
        assert!(matches!(err, Error::Format(ref msg) if msg.contains("ZIP64")));
    }

    #[tokio::test]
    async fn rejects_multi_disk_archive() {
        let mut bytes = build(&[("a.txt", "hello")]).await;
        let eocd_pos = bytes.len() - EndOfCentralDirectory::SIZE;
        bytes[eocd_pos + 4] = 1;

        let err = parser(bytes).list_files().await.unwrap_err();
        assert!(matches!(err, Error::Format(ref msg) if msg.contains("multi-disk")));
    }

    #[tokio::test]
    async fn data_past_end_is_rejected() {
        let bytes = build(&[("a.txt", "hello")]).await;
        let parser = parser(bytes);
        let mut entry = parser.list_files().await.unwrap().remove(0);
        entry.compressed_size = 10_000;
        assert!(matches!(
            parser.get_data_offset(&entry).await,
            Err(Error::Format(_))
        ));
    }
}
