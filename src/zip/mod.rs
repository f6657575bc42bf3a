//! ZIP archive reading and writing.
//!
//! Only the STORE method (no compression) is produced or accepted, so the
//! format handled here is a strict subset of ZIP that any standard tool
//! can read.
//!
//! ## Architecture
//!
//! - [`structures`]: ZIP format records (EOCD, local and central headers)
//! - [`writer`]: emits local headers, data, central directory and EOCD
//! - [`parser`]: locates the EOCD and walks the central directory
//! - [`extractor`]: materializes parsed entries through the path guard
//!
//! ## ZIP Format Overview
//!
//! A ZIP file consists of:
//! 1. Local file headers and data for each file
//! 2. Central Directory with metadata for all files
//! 3. End of Central Directory (EOCD) record at the end
//!
//! ## Limitations
//!
//! - No compression, encryption, ZIP64 or multi-disk support
//! - Modification times are written as zero
//! - Directories are never written as explicit entries, so empty
//!   directories do not survive a pack/unpack round trip. Directory
//!   entries found in foreign archives are still extracted.

mod extractor;
mod parser;
mod structures;
mod writer;

pub use extractor::{ExtractReport, ZipExtractor};
pub use parser::ZipParser;
pub use structures::*;
pub use writer::{ZipWriter, write_entries};
