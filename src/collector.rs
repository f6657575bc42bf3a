//! Source tree walking for [`create_archive`](crate::create_archive).

use std::path::{Component, Path, PathBuf};

use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};

use crate::error::{Error, Result};

/// A regular file on disk slated for archiving.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    pub full_path: PathBuf,
    /// Path relative to the source root, `/`-separated
    pub relative_path: String,
}

/// Walk `source_dir` depth-first and return every regular file in it.
///
/// A file or directory is left out when its relative path or its bare name
/// equals one of `skip_paths`; a skipped directory is not descended into.
/// Symlinks and special files are never followed or packed. Siblings are
/// visited in file-name order so repeated runs produce the same archive.
pub fn collect(source_dir: &Path, skip_paths: &[String]) -> Result<Vec<FileEntry>> {
    collect_excluding(source_dir, skip_paths, None)
}

/// Like [`collect`], additionally leaving out the file at `exclude`
/// (canonical path), which is the archive being written.
pub(crate) fn collect_excluding(
    source_dir: &Path,
    skip_paths: &[String],
    exclude: Option<&Path>,
) -> Result<Vec<FileEntry>> {
    let meta = std::fs::metadata(source_dir).map_err(|e| Error::io_at(source_dir, e))?;
    if !meta.is_dir() {
        return Err(Error::NotADirectory {
            path: source_dir.to_path_buf(),
        });
    }
    let root = source_dir
        .canonicalize()
        .map_err(|e| Error::io_at(source_dir, e))?;

    let walker = WalkDir::new(&root)
        .min_depth(1)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| !is_skipped(&root, entry, skip_paths));

    let mut entries = Vec::new();
    for item in walker {
        let entry = item.map_err(walk_error)?;
        let file_type = entry.file_type();

        if file_type.is_dir() {
            continue;
        }
        if !file_type.is_file() {
            warn!(path = %entry.path().display(), "skipping non-regular file");
            continue;
        }
        if exclude == Some(entry.path()) {
            debug!(path = %entry.path().display(), "not packing the output archive into itself");
            continue;
        }

        let relative_path = relative_name(&root, entry.path())?;
        entries.push(FileEntry {
            full_path: entry.into_path(),
            relative_path,
        });
    }

    Ok(entries)
}

fn is_skipped(root: &Path, entry: &DirEntry, skip_paths: &[String]) -> bool {
    if skip_paths.is_empty() {
        return false;
    }
    let relative = entry
        .path()
        .strip_prefix(root)
        .map(|p| {
            p.components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/")
        })
        .unwrap_or_default();
    let name = entry.file_name().to_string_lossy();

    let skipped = skip_paths.iter().any(|s| *s == relative || *s == name);
    if skipped {
        debug!(path = %relative, "skipped by exclusion list");
    }
    skipped
}

/// Archive name for `path`: its components below `root` joined with `/`.
fn relative_name(root: &Path, path: &Path) -> Result<String> {
    let relative = path.strip_prefix(root).map_err(|_| Error::InvalidName {
        path: path.to_path_buf(),
    })?;

    let mut parts = Vec::new();
    for component in relative.components() {
        match component {
            Component::Normal(part) => parts.push(part.to_str().ok_or_else(|| {
                Error::InvalidName {
                    path: path.to_path_buf(),
                }
            })?),
            _ => {
                return Err(Error::InvalidName {
                    path: path.to_path_buf(),
                });
            }
        }
    }
    Ok(parts.join("/"))
}

fn walk_error(err: walkdir::Error) -> Error {
    let path = err.path().map(Path::to_path_buf);
    match (path, err.into_io_error()) {
        (Some(path), Some(io)) => Error::io_at(path, io),
        (None, Some(io)) => Error::Io(io),
        (_, None) => Error::Io(std::io::Error::other("filesystem loop while walking source")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn tree() -> tempfile::TempDir {
        let dir = tempfile::Builder::new()
            .prefix("zipstore-collect-")
            .tempdir()
            .unwrap();
        fs::write(dir.path().join("file1.txt"), "hello").unwrap();
        fs::write(dir.path().join("file2.txt"), "world").unwrap();
        fs::create_dir_all(dir.path().join("subdir/deeper")).unwrap();
        fs::write(dir.path().join("subdir/nested.txt"), "nested content").unwrap();
        fs::write(dir.path().join("subdir/deeper/file2.txt"), "again").unwrap();
        fs::create_dir(dir.path().join("empty")).unwrap();
        dir
    }

    fn names(entries: &[FileEntry]) -> Vec<&str> {
        entries.iter().map(|e| e.relative_path.as_str()).collect()
    }

    #[test]
    fn collects_regular_files_in_stable_order() {
        let dir = tree();
        let entries = collect(dir.path(), &[]).unwrap();
        assert_eq!(
            names(&entries),
            [
                "file1.txt",
                "file2.txt",
                "subdir/deeper/file2.txt",
                "subdir/nested.txt"
            ]
        );
        assert!(entries[0].full_path.is_absolute());
    }

    #[test]
    fn skip_by_basename_matches_at_any_depth() {
        let dir = tree();
        let entries = collect(dir.path(), &["file2.txt".to_string()]).unwrap();
        assert_eq!(names(&entries), ["file1.txt", "subdir/nested.txt"]);
    }

    #[test]
    fn skip_by_relative_path_prunes_directory() {
        let dir = tree();
        let entries = collect(dir.path(), &["subdir/deeper".to_string()]).unwrap();
        assert_eq!(
            names(&entries),
            ["file1.txt", "file2.txt", "subdir/nested.txt"]
        );
    }

    #[cfg(unix)]
    #[test]
    fn symlinks_are_not_packed() {
        let dir = tree();
        std::os::unix::fs::symlink("/etc/hostname", dir.path().join("link")).unwrap();
        std::os::unix::fs::symlink(dir.path(), dir.path().join("loop")).unwrap();
        let entries = collect(dir.path(), &[]).unwrap();
        assert!(!names(&entries).contains(&"link"));
        assert!(names(&entries).iter().all(|n| !n.starts_with("loop")));
    }

    #[test]
    fn missing_source_is_not_found() {
        let err = collect(Path::new("/nonexistent/zipstore/src"), &[]).unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
    }

    #[test]
    fn file_source_is_rejected() {
        let dir = tree();
        let err = collect(&dir.path().join("file1.txt"), &[]).unwrap_err();
        assert!(matches!(err, Error::NotADirectory { .. }));
    }
}
