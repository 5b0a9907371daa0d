use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::config::DEFAULT_RANGE;

#[derive(Parser, Debug)]
#[command(
    name = "dmarc-analyzer",
    about = "Summarize DMARC aggregate report compliance from an ingested report database",
    version,
    long_about = None
)]
pub struct Args {
    /// Path to the report database
    #[arg(short, long, global = true, default_value = "dmarc.db")]
    pub database: PathBuf,

    /// Range used when a command is not given --range (e.g. 4w, 2m, 1y)
    #[arg(long, global = true, default_value = DEFAULT_RANGE)]
    pub default_range: String,

    /// Output format
    #[arg(short, long, global = true, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Number of worker threads for record aggregation
    #[arg(short, long, global = true)]
    pub workers: Option<usize>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Compliance summary for every domain seen in the window
    Dashboard {
        /// Relative range such as 4w, 2m or 1y
        #[arg(short, long)]
        range: Option<String>,
    },

    /// Compliance, reports and records for a single header-From domain
    Domain {
        domain: String,

        /// Relative range such as 4w, 2m or 1y
        #[arg(short, long)]
        range: Option<String>,
    },

    /// Full details of one report
    Report { serial: i64 },

    /// Distinct sending IPs across reports in the window
    Senders {
        /// Relative range such as 4w, 2m or 1y
        #[arg(short, long)]
        range: Option<String>,

        /// Only senders for header-From domains containing this text
        #[arg(long)]
        domain: Option<String>,

        /// Only senders whose address contains this text
        #[arg(long)]
        ip: Option<String>,
    },
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}
