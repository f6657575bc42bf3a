//! # zipstore
//!
//! Pack a directory tree into a single uncompressed ZIP archive and unpack
//! such an archive back into a directory tree, using nothing but plain byte
//! I/O: no compression library, no external archive crate.
//!
//! The format written is the STORE-only subset of ZIP (local headers, raw
//! data, central directory, EOCD), so any standard unzip tool can read it.
//! The reader accepts the same subset and refuses anything else.
//!
//! ## Features
//!
//! - Table-driven CRC-32 computed at compile time
//! - Deterministic packing order with skip lists by relative path or file name
//! - Zip Slip protection: every entry is checked against the destination
//!   before a single byte is written
//! - Typed errors ([`Error`], [`ErrorKind`]) separating malicious or corrupt
//!   archives from ordinary I/O failures
//!
//! ## Limitations
//!
//! - Empty directories are not preserved through a round trip
//! - No ZIP64, encryption, compression or symlink preservation
//!
//! ## Example
//!
//! ```no_run
//! #[tokio::main]
//! async fn main() -> zipstore::Result<()> {
//!     zipstore::create_archive("site", "site.zip", &["node_modules"]).await?;
//!     zipstore::extract_archive("site.zip", "restored").await?;
//!     Ok(())
//! }
//! ```

pub mod archive;
pub mod cli;
pub mod collector;
pub mod crc;
pub mod error;
pub mod guard;
pub mod io;
pub mod zip;

pub use archive::{
    PackOptions, create_archive, create_archive_with, extract_archive,
    extract_archive_with_report, list_archive, read_entries,
};
pub use cli::Cli;
pub use collector::{FileEntry, collect};
pub use crc::crc32;
pub use error::{Error, ErrorKind, Result};
pub use guard::{DestinationRoot, SafePath};
pub use io::{LocalFileReader, MemoryReader, ReadAt};
pub use zip::{ExtractReport, ZipEntryRecord, ZipExtractor, ZipWriter};
