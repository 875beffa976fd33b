//! Command-line argument definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Donation recommendations from shell history.
///
/// Analyzes Atuin command history and recommends proportional donations to
/// the open source projects behind the tools you actually run.
#[derive(Debug, Parser)]
#[command(name = "fund", version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to config file.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Analyze command usage patterns.
    Analyze {
        /// Time period: day, week, month, year, all.
        #[arg(short, long)]
        period: Option<String>,

        /// Filter by hostname (substring match).
        #[arg(short = 'H', long)]
        hostname: Option<String>,

        /// Number of top executables to show.
        #[arg(short, long, default_value_t = 20)]
        limit: usize,

        /// Hide the unknown-executables section.
        #[arg(long)]
        no_unknown: bool,

        /// Resolve shell aliases to known projects.
        #[arg(long)]
        aliases: bool,
    },

    /// Generate donation recommendations based on usage.
    Recommend {
        /// Total donation amount in USD (defaults from config).
        #[arg(short, long)]
        amount: Option<f64>,

        /// Time period: day, week, month, year, all.
        #[arg(short, long)]
        period: Option<String>,

        /// Maximum number of projects.
        #[arg(short = 'n', long)]
        max_projects: Option<usize>,

        /// Minimum donation per project.
        #[arg(short, long)]
        min_amount: Option<f64>,

        /// Weighting strategy: count, duration, success, combined.
        #[arg(short, long)]
        weight: Option<String>,

        /// Output format: table, markdown, json.
        #[arg(short, long, default_value = "table")]
        format: String,

        /// Filter by hostname (substring match).
        #[arg(short = 'H', long)]
        hostname: Option<String>,

        /// Resolve shell aliases to known projects.
        #[arg(long)]
        aliases: bool,
    },

    /// Generate donation links and reports.
    Donate {
        /// Total donation amount in USD (defaults from config).
        #[arg(short, long)]
        amount: Option<f64>,

        /// Time period: day, week, month, year, all.
        #[arg(short, long)]
        period: Option<String>,

        /// Maximum number of projects.
        #[arg(short = 'n', long)]
        max_projects: Option<usize>,

        /// Write a report file (.md or .html by extension).
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Filter by hostname (substring match).
        #[arg(short = 'H', long)]
        hostname: Option<String>,
    },

    /// Search or list known projects.
    Projects {
        /// Search query (name, executable or description).
        query: Option<String>,

        /// List all projects.
        #[arg(short, long)]
        all: bool,
    },

    /// Inspect or classify executables with no project mapping.
    Unknowns {
        #[command(subcommand)]
        action: UnknownsAction,
    },

    /// Show history database statistics.
    Stats,

    /// View or initialize configuration.
    Config {
        /// Show current configuration.
        #[arg(short, long)]
        show: bool,

        /// Create a default configuration file.
        #[arg(long)]
        init: bool,

        /// Print the configuration file path.
        #[arg(long)]
        path: bool,
    },
}

/// Actions on the unknown-executable registry.
#[derive(Debug, Subcommand)]
pub enum UnknownsAction {
    /// List recorded unknown executables.
    List,

    /// Investigate where an executable comes from.
    Investigate {
        /// Executable name.
        executable: String,

        /// Re-investigate even if already recorded.
        #[arg(long)]
        force: bool,
    },

    /// Manually classify an executable.
    Classify {
        /// Executable name.
        executable: String,

        /// Classification: system, third-party, user, ignored.
        #[arg(long = "as", value_name = "CLASS")]
        classification: String,

        /// Project id to suggest for third-party tools.
        #[arg(long)]
        project: Option<String>,

        /// Free-form notes.
        #[arg(long)]
        notes: Option<String>,
    },
}
