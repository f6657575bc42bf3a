use std::io;
use std::path::PathBuf;

/// Coarse classification of an [`Error`], for callers that only need to
/// branch on what went wrong rather than inspect the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Format,
    UnsupportedCompression,
    Security,
    Io,
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("no such file or directory: '{}'", .path.display())]
    NotFound { path: PathBuf },

    #[error("'{}' is not a directory", .path.display())]
    NotADirectory { path: PathBuf },

    #[error("invalid archive: {0}")]
    Format(String),

    #[error("unsupported compression method {method} for entry '{name}' (only STORE is supported)")]
    UnsupportedCompression { name: String, method: u16 },

    #[error("Zip Slip detected: {name} resolves outside target directory")]
    Security { name: String },

    #[error("{what} does not fit in a ZIP32 field (ZIP64 is not supported)")]
    TooLarge { what: String },

    #[error("file name is not valid UTF-8: '{}'", .path.display())]
    InvalidName { path: PathBuf },

    #[error("I/O error on '{}': {source}", .path.display())]
    IoAt { path: PathBuf, source: io::Error },

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::NotFound { .. } | Error::NotADirectory { .. } => ErrorKind::NotFound,
            Error::Format(_) | Error::TooLarge { .. } => ErrorKind::Format,
            Error::UnsupportedCompression { .. } => ErrorKind::UnsupportedCompression,
            Error::Security { .. } => ErrorKind::Security,
            Error::InvalidName { .. } | Error::IoAt { .. } | Error::Io(_) => ErrorKind::Io,
        }
    }

    pub(crate) fn format(msg: impl Into<String>) -> Self {
        Error::Format(msg.into())
    }

    pub(crate) fn too_large(what: impl Into<String>) -> Self {
        Error::TooLarge { what: what.into() }
    }

    /// Attach a path to an I/O error, promoting `NotFound` to [`Error::NotFound`].
    pub(crate) fn io_at(path: impl Into<PathBuf>, source: io::Error) -> Self {
        let path = path.into();
        if source.kind() == io::ErrorKind::NotFound {
            Error::NotFound { path }
        } else {
            Error::IoAt { path, source }
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn security_message_names_entry() {
        let err = Error::Security {
            name: "../../evil.txt".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Zip Slip detected: ../../evil.txt resolves outside target directory"
        );
        assert_eq!(err.kind(), ErrorKind::Security);
    }

    #[test]
    fn missing_path_is_not_found() {
        let err = Error::io_at(
            "/nonexistent.zip",
            io::Error::new(io::ErrorKind::NotFound, "gone"),
        );
        assert!(matches!(err, Error::NotFound { .. }));
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let err = Error::io_at("/x", io::Error::new(io::ErrorKind::PermissionDenied, "no"));
        assert_eq!(err.kind(), ErrorKind::Io);
    }
}
