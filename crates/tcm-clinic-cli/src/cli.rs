//! CLI argument definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser, Debug)]
#[command(
    name = "tcm-clinic",
    version,
    about = "TCM clinic catalog - herbs, formulas and prescriptions",
    long_about = "Manage a local herb and formula catalog.\n\n\
                  Formula compositions are normalized against the herb catalog on read;\n\
                  malformed records are reported, never rejected."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Database path (overrides TCM_DB_PATH).
    #[arg(long = "db", value_name = "PATH", global = true)]
    pub db: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only log errors.
    #[arg(short = 'q', long = "quiet", global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format (pretty for human, json for machine parsing).
    #[arg(
        long = "log-format",
        value_enum,
        default_value = "pretty",
        global = true
    )]
    pub log_format: LogFormatArg,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Import herbs from a JSON array file (insert or update by id).
    ImportHerbs {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },

    /// Import formulas from a JSON array file (insert or update by id).
    ImportFormulas {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },

    /// Show a formula with its resolved herbs and total weight.
    Formula {
        /// Formula id or pinyin name.
        #[arg(value_name = "ID|PINYIN")]
        key: String,
    },

    /// Search herbs by pinyin, Chinese, English or Latin name.
    Search {
        #[arg(value_name = "QUERY")]
        query: String,

        /// Maximum number of results.
        #[arg(long = "limit", default_value_t = 20)]
        limit: usize,
    },

    /// Check every formula's composition against the herb catalog.
    ///
    /// Exits with status 1 when any issue is found.
    Audit,

    /// Export a prescription sheet with calculated dosages.
    Prescription {
        #[arg(value_name = "ID")]
        id: String,

        /// Output format.
        #[arg(long = "format", value_enum, default_value = "json")]
        format: OutputFormatArg,
    },
}

/// Prescription export formats.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormatArg {
    Json,
    Csv,
}

/// CLI log format choices.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogFormatArg {
    Pretty,
    Compact,
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_prescription_csv() {
        let cli = Cli::try_parse_from(["tcm-clinic", "--db", "x.db", "prescription", "rx-1", "--format", "csv"])
            .unwrap();
        assert_eq!(cli.db, Some(PathBuf::from("x.db")));
        match cli.command {
            Command::Prescription { id, format } => {
                assert_eq!(id, "rx-1");
                assert_eq!(format, OutputFormatArg::Csv);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["tcm-clinic", "audit", "-vv", "--log-format", "json"]).unwrap();
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.log_format, LogFormatArg::Json);
        assert!(matches!(cli.command, Command::Audit));
    }

    #[test]
    fn test_quiet_conflicts_with_verbose() {
        assert!(Cli::try_parse_from(["tcm-clinic", "-q", "-v", "audit"]).is_err());
    }

    #[test]
    fn test_search_default_limit() {
        let cli = Cli::try_parse_from(["tcm-clinic", "search", "gui"]).unwrap();
        assert!(matches!(cli.command, Command::Search { limit: 20, .. }));
    }
}
