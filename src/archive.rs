//! The two public operations: pack a directory, unpack an archive.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::io::BufWriter;
use tracing::{info, warn};

use crate::collector::{self, FileEntry};
use crate::error::{Error, Result};
use crate::guard::DestinationRoot;
use crate::io::{LocalFileReader, MemoryReader};
use crate::zip::{ExtractReport, ZipEntryRecord, ZipExtractor, ZipParser, write_entries};

/// Options for [`create_archive_with`].
#[derive(Debug, Clone, Default)]
pub struct PackOptions {
    /// Relative paths or bare file names to leave out
    pub skip_paths: Vec<String>,
}

impl PackOptions {
    pub fn skip(mut self, path: impl Into<String>) -> Self {
        self.skip_paths.push(path.into());
        self
    }
}

/// Pack every regular file under `source_dir` into a new STORE-only ZIP at
/// `dest_file`, overwriting it if present.
///
/// Entries whose relative path or file name equals one of `skip_paths` are
/// left out. Empty directories are not recorded.
pub async fn create_archive<S: AsRef<str>>(
    source_dir: impl AsRef<Path>,
    dest_file: impl AsRef<Path>,
    skip_paths: &[S],
) -> Result<()> {
    let options = PackOptions {
        skip_paths: skip_paths.iter().map(|s| s.as_ref().to_string()).collect(),
    };
    create_archive_with(source_dir, dest_file, &options)
        .await
        .map(|_| ())
}

/// [`create_archive`] taking [`PackOptions`], returning the records written.
pub async fn create_archive_with(
    source_dir: impl AsRef<Path>,
    dest_file: impl AsRef<Path>,
    options: &PackOptions,
) -> Result<Vec<ZipEntryRecord>> {
    let source_dir = source_dir.as_ref().to_path_buf();
    let dest_file = dest_file.as_ref();

    let exclude = canonical_target(dest_file).await;
    let skip_paths = options.skip_paths.clone();
    let entries: Vec<FileEntry> = tokio::task::spawn_blocking(move || {
        collector::collect_excluding(&source_dir, &skip_paths, exclude.as_deref())
    })
    .await
    .map_err(std::io::Error::other)??;

    let file = tokio::fs::File::create(dest_file)
        .await
        .map_err(|e| Error::io_at(dest_file, e))?;

    match write_entries(&entries, BufWriter::new(file)).await {
        Ok((_, records)) => {
            info!(
                archive = %dest_file.display(),
                files = records.len(),
                "created archive"
            );
            Ok(records)
        }
        Err(err) => {
            if let Err(e) = tokio::fs::remove_file(dest_file).await {
                warn!(archive = %dest_file.display(), error = %e, "could not remove partial archive");
            }
            Err(err)
        }
    }
}

/// Unpack `archive_file` into `dest_dir`, creating it if absent and
/// overwriting colliding files.
///
/// Every entry name is checked against the destination before anything is
/// written; one escaping name fails the call with [`Error::Security`] and
/// nothing is extracted.
pub async fn extract_archive(
    archive_file: impl AsRef<Path>,
    dest_dir: impl AsRef<Path>,
) -> Result<()> {
    extract_archive_with_report(archive_file, dest_dir)
        .await
        .map(|_| ())
}

/// [`extract_archive`], returning what was written.
pub async fn extract_archive_with_report(
    archive_file: impl AsRef<Path>,
    dest_dir: impl AsRef<Path>,
) -> Result<ExtractReport> {
    let archive_file = archive_file.as_ref();
    let reader = Arc::new(LocalFileReader::new(archive_file)?);
    let root = DestinationRoot::create(dest_dir.as_ref()).await?;

    let report = ZipExtractor::new(reader).extract_all(&root).await?;
    info!(
        archive = %archive_file.display(),
        dest = %root.path().display(),
        files = report.files,
        directories = report.directories,
        bytes = report.bytes,
        "extracted archive"
    );
    Ok(report)
}

/// Parse the central directory of the archive at `archive_file`.
pub async fn list_archive(archive_file: impl AsRef<Path>) -> Result<Vec<ZipEntryRecord>> {
    let reader = Arc::new(LocalFileReader::new(archive_file.as_ref())?);
    ZipParser::new(reader).list_files().await
}

/// Parse the central directory of an in-memory archive.
pub async fn read_entries(archive: Vec<u8>) -> Result<Vec<ZipEntryRecord>> {
    ZipParser::new(Arc::new(MemoryReader::new(archive)))
        .list_files()
        .await
}

/// Canonical location `path` will have once created, if its parent exists.
async fn canonical_target(path: &Path) -> Option<PathBuf> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let parent = tokio::fs::canonicalize(parent).await.ok()?;
    Some(parent.join(path.file_name()?))
}
