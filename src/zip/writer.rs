//! STORE-only ZIP writer.
//!
//! Entries are appended as local file header + raw bytes. [`ZipWriter::finish`]
//! then emits one central directory header per entry, in the same order, and
//! the EOCD record. Every offset and size must fit the 32-bit ZIP fields;
//! anything larger is refused with [`Error::TooLarge`] since ZIP64 is not
//! written.

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::debug;

use crate::collector::FileEntry;
use crate::crc::crc32;
use crate::error::{Error, Result};

use super::structures::{EndOfCentralDirectory, ZipEntryRecord};

/// Highest entry count that does not collide with the ZIP64 sentinel.
const MAX_ENTRIES: usize = 0xFFFE;

/// Streaming writer for uncompressed ZIP archives.
pub struct ZipWriter<W> {
    out: W,
    /// Bytes written so far, i.e. the offset of the next header
    offset: u64,
    records: Vec<ZipEntryRecord>,
}

impl<W: AsyncWrite + Unpin> ZipWriter<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            offset: 0,
            records: Vec::new(),
        }
    }

    /// Records written so far, in archive order.
    pub fn records(&self) -> &[ZipEntryRecord] {
        &self.records
    }

    /// Append one stored entry named `name` holding `data`.
    pub async fn add_entry(&mut self, name: &str, data: &[u8]) -> Result<()> {
        if self.records.len() >= MAX_ENTRIES {
            return Err(Error::too_large("entry count"));
        }
        if name.len() > u16::MAX as usize {
            return Err(Error::too_large(format!("name length of '{name}'")));
        }
        let size = u32::try_from(data.len())
            .map_err(|_| Error::too_large(format!("size of '{name}'")))?;
        let offset = fit_u32(self.offset, "local header offset")?;

        let record = ZipEntryRecord::stored(name.to_string(), crc32(data), size, offset);

        let mut header = Vec::with_capacity(record.local_header_len());
        record.write_local_header(&mut header)?;
        self.out.write_all(&header).await?;
        self.out.write_all(data).await?;
        self.offset += (header.len() + data.len()) as u64;

        debug!(name, size, offset, crc32 = record.crc32, "stored entry");
        self.records.push(record);
        Ok(())
    }

    /// Read a collected file from disk and append it under its relative path.
    pub async fn add_file(&mut self, entry: &FileEntry) -> Result<()> {
        let data = tokio::fs::read(&entry.full_path)
            .await
            .map_err(|e| Error::io_at(&entry.full_path, e))?;
        self.add_entry(&entry.relative_path, &data).await
    }

    /// Write the central directory and EOCD, flush, and hand back the sink.
    pub async fn finish(mut self) -> Result<W> {
        let cd_offset = fit_u32(self.offset, "central directory offset")?;

        let mut central = Vec::new();
        for record in &self.records {
            record.write_central_header(&mut central)?;
        }
        let cd_size = fit_u32(central.len() as u64, "central directory size")?;

        let eocd = EndOfCentralDirectory::new(self.records.len() as u16, cd_size, cd_offset);
        eocd.write_to(&mut central)?;

        self.out.write_all(&central).await?;
        self.out.flush().await?;
        self.offset += central.len() as u64;

        debug!(
            entries = self.records.len(),
            cd_offset, cd_size, total = self.offset, "wrote central directory"
        );
        Ok(self.out)
    }
}

/// Values equal to `u32::MAX` are ZIP64 sentinels, so they are refused too.
fn fit_u32(value: u64, what: &str) -> Result<u32> {
    match u32::try_from(value) {
        Ok(v) if v != u32::MAX => Ok(v),
        _ => Err(Error::too_large(what)),
    }
}

/// Pack `entries` in order into `out`, returning the sink and the records written.
pub async fn write_entries<W: AsyncWrite + Unpin>(
    entries: &[FileEntry],
    out: W,
) -> Result<(W, Vec<ZipEntryRecord>)> {
    let mut writer = ZipWriter::new(out);
    for entry in entries {
        writer.add_file(entry).await?;
    }
    let records = writer.records().to_vec();
    let out = writer.finish().await?;
    Ok((out, records))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::zip::structures::{CDFH_SIGNATURE, LFH_SIGNATURE};

    fn u32_at(buf: &[u8], pos: usize) -> u32 {
        u32::from_le_bytes([buf[pos], buf[pos + 1], buf[pos + 2], buf[pos + 3]])
    }

    fn u16_at(buf: &[u8], pos: usize) -> u16 {
        u16::from_le_bytes([buf[pos], buf[pos + 1]])
    }

    #[tokio::test]
    async fn empty_archive_is_bare_eocd() {
        let out = ZipWriter::new(Vec::new()).finish().await.unwrap();
        assert_eq!(out.len(), EndOfCentralDirectory::SIZE);
        assert_eq!(&out[0..4], EndOfCentralDirectory::SIGNATURE);
        assert_eq!(u16_at(&out, 8), 0);
        assert_eq!(u32_at(&out, 16), 0);
    }

    #[tokio::test]
    async fn offsets_and_sizes_line_up() {
        let mut writer = ZipWriter::new(Vec::new());
        writer.add_entry("file1.txt", b"hello").await.unwrap();
        writer.add_entry("sub/x.bin", b"abc").await.unwrap();

        let records = writer.records().to_vec();
        assert_eq!(records[0].local_header_offset, 0);
        assert_eq!(records[1].local_header_offset, (30 + 9 + 5) as u32);
        assert_eq!(records[0].crc32, crc32(b"hello"));

        let out = writer.finish().await.unwrap();

        // first local header and its data
        assert_eq!(&out[0..4], LFH_SIGNATURE);
        assert_eq!(&out[30..39], b"file1.txt");
        assert_eq!(&out[39..44], b"hello");

        let cd_offset = (30 + 9 + 5) + (30 + 9 + 3);
        assert_eq!(&out[cd_offset..cd_offset + 4], CDFH_SIGNATURE);
        let cd_size = 2 * (46 + 9);

        let eocd = &out[out.len() - EndOfCentralDirectory::SIZE..];
        assert_eq!(&eocd[0..4], EndOfCentralDirectory::SIGNATURE);
        assert_eq!(u16_at(eocd, 8), 2);
        assert_eq!(u16_at(eocd, 10), 2);
        assert_eq!(u32_at(eocd, 12), cd_size as u32);
        assert_eq!(u32_at(eocd, 16), cd_offset as u32);
        assert_eq!(out.len(), cd_offset + cd_size + EndOfCentralDirectory::SIZE);
    }

    #[tokio::test]
    async fn missing_source_file_aborts() {
        let entry = FileEntry {
            full_path: "/nonexistent/zipstore/file".into(),
            relative_path: "file".to_string(),
        };
        let err = write_entries(&[entry], Vec::new()).await.unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
    }

    #[tokio::test]
    async fn oversized_name_is_too_large() {
        let mut writer = ZipWriter::new(Vec::new());
        let name = "n".repeat(u16::MAX as usize + 1);
        let err = writer.add_entry(&name, b"").await.unwrap_err();
        assert!(matches!(err, Error::TooLarge { .. }));
        assert!(writer.records().is_empty());

        let name = "n".repeat(u16::MAX as usize);
        writer.add_entry(&name, b"").await.unwrap();
    }

    #[tokio::test]
    async fn entry_count_is_capped() {
        let mut writer = ZipWriter::new(Vec::new());
        for i in 0..MAX_ENTRIES {
            writer.add_entry(&i.to_string(), b"").await.unwrap();
        }
        let err = writer.add_entry("one-too-many", b"").await.unwrap_err();
        assert!(matches!(err, Error::TooLarge { ref what } if what == "entry count"));
        assert_eq!(writer.records().len(), MAX_ENTRIES);
    }

    #[test]
    fn sentinel_values_rejected() {
        assert_eq!(fit_u32(10, "x").unwrap(), 10);
        assert!(fit_u32(u32::MAX as u64, "x").is_err());
        assert!(fit_u32(u32::MAX as u64 + 1, "x").is_err());
    }
}
