//! Main entry point for the zipstore CLI application.
//!
//! Thin wrapper around [`zipstore::create_archive_with`],
//! [`zipstore::extract_archive_with_report`] and [`zipstore::list_archive`].

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use zipstore::cli::Command;
use zipstore::{Cli, PackOptions, ZipEntryRecord};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // RUST_LOG wins over the -q/--debug flags when set.
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cli.log_level()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Pack {
            source,
            archive,
            exclude,
        } => {
            let options = PackOptions {
                skip_paths: exclude,
            };
            zipstore::create_archive_with(&source, &archive, &options)
                .await
                .with_context(|| format!("packing {} into {}", source.display(), archive.display()))?;
        }
        Command::Unpack {
            archive,
            extract_dir,
        } => {
            zipstore::extract_archive_with_report(&archive, &extract_dir)
                .await
                .with_context(|| {
                    format!("unpacking {} into {}", archive.display(), extract_dir.display())
                })?;
        }
        Command::List { archive, verbose } => {
            let entries = zipstore::list_archive(&archive)
                .await
                .with_context(|| format!("reading {}", archive.display()))?;
            list_files(&entries, verbose);
        }
    }

    Ok(())
}

/// Print archive contents, one name per line or as a table with `-v`.
fn list_files(entries: &[ZipEntryRecord], verbose: bool) {
    if !verbose {
        for entry in entries {
            println!("{}", entry.name);
        }
        return;
    }

    println!("{:>10}  {:>8}  {:>10}  Name", "Length", "CRC-32", "Offset");
    println!("{}", "-".repeat(50));

    let mut total = 0u64;
    let mut file_count = 0usize;
    for entry in entries {
        println!(
            "{:>10}  {:08x}  {:>10}  {}",
            entry.uncompressed_size, entry.crc32, entry.local_header_offset, entry.name
        );
        if !entry.is_directory {
            total += entry.uncompressed_size as u64;
            file_count += 1;
        }
    }

    println!("{}", "-".repeat(50));
    println!("{:>10}  {:>22}  {} files ({})", total, "", file_count, format_size(total));
}

/// Format a byte size into a human-readable string.
///
/// ```ignore
/// assert_eq!(format_size(500), "500 bytes");
/// assert_eq!(format_size(1536), "1.50 KB");
/// ```
fn format_size(size: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if size >= GB {
        format!("{:.2} GB", size as f64 / GB as f64)
    } else if size >= MB {
        format!("{:.2} MB", size as f64 / MB as f64)
    } else if size >= KB {
        format!("{:.2} KB", size as f64 / KB as f64)
    } else {
        format!("{} bytes", size)
    }
}
