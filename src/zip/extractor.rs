use std::sync::Arc;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::error::{Error, Result};
use crate::guard::{DestinationRoot, SafePath};
use crate::io::ReadAt;

use super::parser::ZipParser;
use super::structures::{CompressionMethod, ZipEntryRecord};

/// Summary of a finished extraction
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractReport {
    pub files: usize,
    pub directories: usize,
    pub bytes: u64,
}

/// ZIP file extractor
pub struct ZipExtractor<R: ReadAt> {
    parser: ZipParser<R>,
}

impl<R: ReadAt> ZipExtractor<R> {
    pub fn new(reader: Arc<R>) -> Self {
        Self {
            parser: ZipParser::new(reader),
        }
    }

    /// List all entries in the archive
    pub async fn list_files(&self) -> Result<Vec<ZipEntryRecord>> {
        self.parser.list_files().await
    }

    /// Extract entry data to memory
    pub async fn extract_to_memory(&self, entry: &ZipEntryRecord) -> Result<Vec<u8>> {
        if entry.compression_method != CompressionMethod::Stored {
            return Err(Error::UnsupportedCompression {
                name: entry.name.clone(),
                method: entry.compression_method.as_u16(),
            });
        }
        if entry.is_encrypted() {
            return Err(Error::format(format!(
                "entry '{}' is encrypted",
                entry.name
            )));
        }

        if entry.compressed_size != entry.uncompressed_size {
            return Err(Error::format(format!(
                "stored entry '{}' has mismatched sizes ({} != {})",
                entry.name, entry.compressed_size, entry.uncompressed_size
            )));
        }

        let data_offset = self.parser.get_data_offset(entry).await?;

        let mut buf = vec![0u8; entry.uncompressed_size as usize];
        self.parser
            .reader()
            .read_exact_at(data_offset, &mut buf)
            .await?;

        Ok(buf)
    }

    /// Extract a file entry to its guarded location, replacing any existing file
    pub async fn extract_to_file(
        &self,
        entry: &ZipEntryRecord,
        root: &DestinationRoot,
        target: &SafePath,
    ) -> Result<()> {
        let data = self.extract_to_memory(entry).await?;

        root.confirm(target).await?;
        let output_path = target.path();
        if let Some(parent) = output_path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| Error::io_at(parent, e))?;
        }

        let mut file = fs::File::create(output_path)
            .await
            .map_err(|e| Error::io_at(output_path, e))?;
        file.write_all(&data)
            .await
            .map_err(|e| Error::io_at(output_path, e))?;
        file.flush().await.map_err(|e| Error::io_at(output_path, e))?;

        Ok(())
    }

    /// Create a directory entry (and its parents) at its guarded location
    pub async fn extract_directory(&self, root: &DestinationRoot, target: &SafePath) -> Result<()> {
        root.confirm(target).await?;
        fs::create_dir_all(target.path())
            .await
            .map_err(|e| Error::io_at(target.path(), e))
    }

    /// Extract every entry under `root`, in central directory order.
    ///
    /// All entry names are resolved through the path guard before anything
    /// is written, so an archive with even one escaping name leaves the
    /// destination untouched.
    pub async fn extract_all(&self, root: &DestinationRoot) -> Result<ExtractReport> {
        let entries = self.list_files().await?;

        let plan = entries
            .iter()
            .map(|entry| root.resolve(&entry.name).map(|target| (entry, target)))
            .collect::<Result<Vec<_>>>()?;

        let mut report = ExtractReport::default();
        for (entry, target) in &plan {
            if entry.is_directory {
                self.extract_directory(root, target).await?;
                report.directories += 1;
                debug!(name = %entry.name, "created directory");
            } else {
                self.extract_to_file(entry, root, target).await?;
                report.files += 1;
                report.bytes += entry.uncompressed_size as u64;
                debug!(name = %entry.name, size = entry.uncompressed_size, "extracted file");
            }
        }

        Ok(report)
    }
}
