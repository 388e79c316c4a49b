use clap::{Parser, Subcommand};

use crate::config::RunOverrides;

#[derive(Parser, Debug)]
#[command(name = "icardfinder")]
#[command(about = "Bulk retrieval of HPD I-card records for a list of NYC addresses")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Create default configuration file at ./config/icardfinder.toml
    #[arg(long, global = true)]
    pub init: bool,

    /// Configuration file (defaults to ./config/icardfinder.toml)
    #[arg(short = 'c', long, value_name = "FILE", global = true)]
    pub config: Option<String>,

    /// Input CSV: borough, house number, street, extra columns...
    #[arg(short, long, value_name = "FILE")]
    pub input: Option<String>,

    /// Success log to append results to
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<String>,

    /// Failure log. When set, failed lookups are dead-lettered instead of re-queued
    #[arg(long, value_name = "FILE")]
    pub failures: Option<String>,

    /// Number of concurrent lookups (1-100)
    #[arg(short = 'j', long, value_name = "N")]
    pub workers: Option<usize>,

    /// Do not skip addresses already present in the success log
    #[arg(long)]
    pub no_replay_success: bool,

    /// Also skip addresses already present in the failure log
    #[arg(long)]
    pub replay_failures: bool,

    /// Attempts per address before it is dead-lettered
    #[arg(long, value_name = "COUNT")]
    pub max_attempts: Option<u32>,

    /// Write the run summary as JSON to this file
    #[arg(long, value_name = "FILE")]
    pub summary_file: Option<String>,

    /// Hide the progress bar
    #[arg(long)]
    pub no_progress: bool,

    /// Disable colored log output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Verbose logging (use -v for DEBUG, -vv for TRACE including dependencies)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Compare the results recorded in two success logs
    Diff {
        /// First success log
        left: String,

        /// Second success log
        right: String,
    },
}

impl Cli {
    /// Values that replace the `[run]` section of the config file
    pub fn run_overrides(&self) -> RunOverrides {
        RunOverrides {
            input_path: self.input.clone(),
            output_path: self.output.clone(),
            failure_path: self.failures.clone(),
            workers: self.workers,
            replay_success: self.no_replay_success.then_some(false),
            replay_failures: self.replay_failures.then_some(true),
            max_attempts: self.max_attempts,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_flags_means_no_overrides() {
        let cli = Cli::parse_from(["icardfinder"]);
        let overrides = cli.run_overrides();
        assert!(overrides.input_path.is_none());
        assert!(overrides.workers.is_none());
        assert!(overrides.replay_success.is_none());
        assert!(overrides.replay_failures.is_none());
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_run_flags_map_to_overrides() {
        let cli = Cli::parse_from([
            "icardfinder",
            "-i",
            "in.csv",
            "-o",
            "out.csv",
            "--failures",
            "failed.csv",
            "-j",
            "25",
            "--no-replay-success",
            "--replay-failures",
            "--max-attempts",
            "2",
            "-vv",
        ]);
        let overrides = cli.run_overrides();
        assert_eq!(overrides.input_path.as_deref(), Some("in.csv"));
        assert_eq!(overrides.output_path.as_deref(), Some("out.csv"));
        assert_eq!(overrides.failure_path.as_deref(), Some("failed.csv"));
        assert_eq!(overrides.workers, Some(25));
        assert_eq!(overrides.replay_success, Some(false));
        assert_eq!(overrides.replay_failures, Some(true));
        assert_eq!(overrides.max_attempts, Some(2));
        assert_eq!(cli.verbose, 2);
    }

    #[test]
    fn test_diff_subcommand() {
        let cli = Cli::parse_from(["icardfinder", "diff", "a.csv", "b.csv"]);
        match cli.command {
            Some(Commands::Diff { left, right }) => {
                assert_eq!(left, "a.csv");
                assert_eq!(right, "b.csv");
            }
            other => panic!("expected diff subcommand, got {:?}", other),
        }
    }
}
