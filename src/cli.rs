use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "zipstore")]
#[command(version)]
#[command(about = "Pack and unpack directory trees as uncompressed ZIP archives", long_about = None)]
#[command(after_help = "Examples:\n  \
  zipstore pack ./site site.zip -x .git -x node_modules\n  \
  zipstore unpack site.zip -d ./restored\n  \
  zipstore list -v site.zip")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Quiet mode, only warnings and errors
    #[arg(short = 'q', long, global = true, conflicts_with = "debug")]
    pub quiet: bool,

    /// Log every entry as it is processed
    #[arg(long, global = true)]
    pub debug: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Pack a directory into an archive
    Pack {
        /// Directory to pack
        #[arg(value_name = "SOURCE_DIR")]
        source: PathBuf,

        /// Archive to create (overwritten if present)
        #[arg(value_name = "ARCHIVE")]
        archive: PathBuf,

        /// Leave out entries whose relative path or file name matches
        #[arg(short = 'x', long = "exclude", value_name = "NAME")]
        exclude: Vec<String>,
    },

    /// Unpack an archive into a directory
    Unpack {
        /// Archive to read
        #[arg(value_name = "ARCHIVE")]
        archive: PathBuf,

        /// Extract files into exdir
        #[arg(short = 'd', value_name = "DIR", default_value = ".")]
        extract_dir: PathBuf,
    },

    /// List archive contents
    List {
        /// Archive to read
        #[arg(value_name = "ARCHIVE")]
        archive: PathBuf,

        /// List verbosely (size, CRC-32, header offset)
        #[arg(short = 'v')]
        verbose: bool,
    },
}

impl Cli {
    /// Default tracing directive implied by the verbosity flags.
    pub fn log_level(&self) -> &'static str {
        if self.quiet {
            "warn"
        } else if self.debug {
            "debug"
        } else {
            "info"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pack_collects_repeated_excludes() {
        let cli = Cli::parse_from(["zipstore", "pack", "src", "out.zip", "-x", "a", "-x", "b/c"]);
        match &cli.command {
            Command::Pack { exclude, .. } => assert_eq!(exclude, &["a", "b/c"]),
            other => panic!("unexpected command {other:?}"),
        }
        assert_eq!(cli.log_level(), "info");
    }

    #[test]
    fn unpack_defaults_to_current_dir() {
        let cli = Cli::parse_from(["zipstore", "-q", "unpack", "out.zip"]);
        match &cli.command {
            Command::Unpack { extract_dir, .. } => assert_eq!(*extract_dir, PathBuf::from(".")),
            other => panic!("unexpected command {other:?}"),
        }
        assert_eq!(cli.log_level(), "warn");
    }
}
