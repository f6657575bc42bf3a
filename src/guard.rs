//! Zip Slip protection.
//!
//! Every path extraction writes to is a [`SafePath`], and the only way to
//! obtain one is [`DestinationRoot::resolve`], which refuses any entry name
//! that does not land strictly inside the canonical destination root.

use std::path::{Component, Path, PathBuf};

use tracing::warn;

use crate::error::{Error, Result};

/// Canonical, absolute directory that extraction is confined to.
#[derive(Debug, Clone)]
pub struct DestinationRoot {
    root: PathBuf,
}

/// An entry's output location, proven to lie under a [`DestinationRoot`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SafePath {
    name: String,
    path: PathBuf,
}

impl SafePath {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl DestinationRoot {
    /// Create `dir` (and parents) if absent and canonicalize it.
    pub async fn create(dir: &Path) -> Result<Self> {
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|e| Error::io_at(dir, e))?;
        let root = tokio::fs::canonicalize(dir)
            .await
            .map_err(|e| Error::io_at(dir, e))?;
        Ok(Self { root })
    }

    /// Use an already canonical absolute path as the root.
    pub fn from_canonical(root: PathBuf) -> Self {
        debug_assert!(root.is_absolute());
        Self { root }
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Resolve an archive entry name against the root.
    ///
    /// The name is normalized lexically (`.` dropped, `..` popped). Absolute
    /// names, names that climb above the root, and names that resolve to
    /// the root itself are rejected with [`Error::Security`].
    pub fn resolve(&self, name: &str) -> Result<SafePath> {
        let slip = || Error::Security {
            name: name.to_string(),
        };

        let mut parts: Vec<&std::ffi::OsStr> = Vec::new();
        for component in Path::new(name).components() {
            match component {
                Component::Prefix(_) | Component::RootDir => return Err(slip()),
                Component::CurDir => {}
                Component::ParentDir => {
                    if parts.pop().is_none() {
                        return Err(slip());
                    }
                }
                Component::Normal(part) => parts.push(part),
            }
        }

        if parts.is_empty() {
            return Err(slip());
        }

        let path: PathBuf = parts.iter().fold(self.root.clone(), |acc, p| acc.join(p));
        if !path.starts_with(&self.root) || path == self.root {
            return Err(slip());
        }

        Ok(SafePath {
            name: name.to_string(),
            path,
        })
    }

    /// Re-check a resolved path against what is actually on disk, right
    /// before creating anything for it: the deepest existing ancestor must
    /// canonicalize inside the root, and a symlink already sitting at the
    /// target is removed rather than followed.
    pub async fn confirm(&self, target: &SafePath) -> Result<()> {
        let mut ancestor = target.path.parent();
        while let Some(dir) = ancestor {
            match tokio::fs::canonicalize(dir).await {
                Ok(canonical) => {
                    if !canonical.starts_with(&self.root) {
                        return Err(Error::Security {
                            name: target.name.clone(),
                        });
                    }
                    break;
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => ancestor = dir.parent(),
                Err(e) => return Err(Error::io_at(dir, e)),
            }
        }

        if let Ok(meta) = tokio::fs::symlink_metadata(&target.path).await {
            if meta.file_type().is_symlink() {
                warn!(name = %target.name, "replacing existing symlink at extraction target");
                tokio::fs::remove_file(&target.path)
                    .await
                    .map_err(|e| Error::io_at(&target.path, e))?;
            }
        }

        Ok(())
    }
}
