//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Batch acquisition of chemical safety data sheets.
///
/// Looks up each CAS number across several SDS sources in priority order,
/// stores every document once, and extracts GHS hazard data from it.
#[derive(Parser, Debug)]
#[command(name = "sds-finder")]
#[command(author, version, about)]
pub struct Args {
    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Settings file (defaults to ./sds-finder.toml when present)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Directory for stored documents (overrides settings)
    #[arg(long, global = true)]
    pub sds_dir: Option<PathBuf>,

    /// SQLite database file (overrides settings)
    #[arg(long, global = true)]
    pub database: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Engine operations.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Fetch SDS documents for one or more CAS numbers
    Fetch {
        /// CAS numbers
        #[arg(required = true)]
        identifiers: Vec<String>,

        /// Concurrent identifiers (1-100)
        #[arg(short, long, value_parser = clap::value_parser!(u8).range(1..=100))]
        pool_size: Option<u8>,
    },

    /// Fetch every CAS number listed in a file (one per line, or CSV with a Cas# column)
    Import {
        /// Input file
        file: PathBuf,

        /// Concurrent identifiers (1-100)
        #[arg(short, long, value_parser = clap::value_parser!(u8).range(1..=100))]
        pool_size: Option<u8>,

        /// Identifiers per sub-batch (1-1000)
        #[arg(long, value_parser = clap::value_parser!(u16).range(1..=1000))]
        chunk_size: Option<u16>,
    },

    /// Show stored-document metadata
    Status {
        /// CAS number
        identifier: String,
    },

    /// Write the stored document to a directory as {CAS}-SDS.pdf
    Document {
        /// CAS number
        identifier: String,

        /// Output directory
        #[arg(short, long, default_value = ".")]
        output: PathBuf,
    },

    /// Check that the stored file exists and is a PDF
    Validate {
        /// CAS number
        identifier: String,
    },

    /// Extract GHS hazard data from the stored document
    Extract {
        /// CAS number
        identifier: String,
    },

    /// Show the stored hazard record without re-extracting
    Hazards {
        /// CAS number
        identifier: String,
    },

    /// Translate a GHS flammability category to an NFPA classification
    Classify {
        /// GHS category, e.g. "Category 2"
        category: String,

        /// Flash point (Fahrenheit unless --celsius)
        #[arg(long, allow_negative_numbers = true)]
        flash_point: Option<f64>,

        /// Boiling point (Fahrenheit unless --celsius)
        #[arg(long, allow_negative_numbers = true)]
        boiling_point: Option<f64>,

        /// Temperatures are in degrees Celsius
        #[arg(long)]
        celsius: bool,
    },

    /// List configured sources in priority order
    Sources,

    /// Show store statistics
    Stats,

    /// Delete a stored document so it can be fetched again
    Remove {
        /// CAS number
        identifier: String,
    },
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_fetch_parses_identifiers_and_pool_size() {
        let args = Args::try_parse_from(["sds-finder", "fetch", "67-64-1", "64-17-5", "-p", "4"])
            .unwrap();
        match args.command {
            Command::Fetch {
                identifiers,
                pool_size,
            } => {
                assert_eq!(identifiers, ["67-64-1", "64-17-5"]);
                assert_eq!(pool_size, Some(4));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_cli_fetch_requires_an_identifier() {
        let err = Args::try_parse_from(["sds-finder", "fetch"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn test_cli_pool_size_zero_rejected() {
        let err = Args::try_parse_from(["sds-finder", "fetch", "67-64-1", "-p", "0"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);

        let err =
            Args::try_parse_from(["sds-finder", "fetch", "67-64-1", "-p", "101"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    #[test]
    fn test_cli_global_flags_after_subcommand() {
        let args = Args::try_parse_from(["sds-finder", "stats", "-vv", "--config", "x.toml"])
            .unwrap();
        assert_eq!(args.verbose, 2);
        assert_eq!(args.config, Some(PathBuf::from("x.toml")));
        assert!(!args.quiet);
    }

    #[test]
    fn test_cli_classify_accepts_negative_celsius() {
        let args = Args::try_parse_from([
            "sds-finder",
            "classify",
            "Category 1",
            "--flash-point",
            "-20",
            "--celsius",
        ])
        .unwrap();
        match args.command {
            Command::Classify {
                category,
                flash_point,
                boiling_point,
                celsius,
            } => {
                assert_eq!(category, "Category 1");
                assert_eq!(flash_point, Some(-20.0));
                assert_eq!(boiling_point, None);
                assert!(celsius);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_cli_hazards_takes_one_identifier() {
        let args = Args::try_parse_from(["sds-finder", "hazards", "67-64-1"]).unwrap();
        assert!(matches!(args.command, Command::Hazards { identifier } if identifier == "67-64-1"));
        assert!(Args::try_parse_from(["sds-finder", "hazards"]).is_err());
    }

    #[test]
    fn test_cli_help_flag_shows_usage() {
        let err = Args::try_parse_from(["sds-finder", "--help"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayHelp);
    }
}
