//! Command-line argument model

use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand, ValueEnum};

use crate::cli::commands::{
    batch::BatchArgs, check::CheckArgs, completions::CompletionsArgs,
    difficulty::DifficultyArgs, generate::GenerateArgs, limits::LimitsArgs,
};

#[derive(Parser, Debug)]
#[command(
    name = "spcs",
    version,
    about = "Synthesize X̄-R control chart data that hits a target Cpk",
    long_about = "Synthesize 5×25 X̄-R control chart data for an inspection item.\n\n\
        Control limits are derived from the tolerance and a target Cpk; a randomized \
        search then produces measurements that land on that Cpk, pass the eight run \
        rules and carry the instrument's resolution."
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Derive X̄ and R chart control limits from a tolerance
    Limits(LimitsArgs),

    /// Generate one chart's worth of data
    Generate(GenerateArgs),

    /// Recompute statistics and run rules for an existing 5×25 CSV
    Check(CheckArgs),

    /// Show which Cpk values a reference band can support
    Difficulty(DifficultyArgs),

    /// Run every task of a YAML plan (or a directory of plans)
    Batch(BatchArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

/// Options shared by every command
#[derive(clap::Args, Debug, Clone)]
pub struct GlobalOpts {
    /// Output format
    #[arg(long, short = 'o', global = true, default_value = "auto")]
    pub output: OutputFormat,

    /// Log more (-v info, -vv debug); RUST_LOG overrides
    #[arg(long, short = 'v', global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Only log errors
    #[arg(long, short = 'q', global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Extra config file layered over the user and project configs
    #[arg(long, global = true, env = "SPCS_CONFIG")]
    pub config: Option<PathBuf>,

    /// Seed for reproducible output
    #[arg(long, global = true, env = "SPCS_SEED")]
    pub seed: Option<u64>,
}

impl GlobalOpts {
    /// Default tracing filter for the verbosity flags
    pub fn log_level(&self) -> &'static str {
        if self.quiet {
            return "error";
        }
        match self.verbose {
            0 => "warn",
            1 => "info",
            _ => "debug",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable summary
    Auto,
    Yaml,
    Json,
    /// Bare measurement matrix
    Csv,
    /// Bordered table
    Table,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_verbosity_levels() {
        let cli = Cli::parse_from(["spcs", "-vv", "limits", "--theory", "10±1"]);
        assert_eq!(cli.global.log_level(), "debug");
        let cli = Cli::parse_from(["spcs", "-q", "limits", "--theory", "10±1"]);
        assert_eq!(cli.global.log_level(), "error");
        let cli = Cli::parse_from(["spcs", "limits", "--theory", "10±1"]);
        assert_eq!(cli.global.log_level(), "warn");
    }
}
