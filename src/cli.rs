use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};
use keyrate::TrackerConfig;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Feed a JSON-lines event log through a tracker and print the reads
    Replay(Replay),
}

#[derive(Parser, Clone, Debug)]
pub struct Replay {
    /// Event log to read (stdin when omitted)
    #[arg(long)]
    pub input: Option<PathBuf>,

    /// Trailing window used for rates, in milliseconds
    #[arg(long, default_value_t = 10_000)]
    pub window_ms: u64,

    /// Reject empty keys and negative or non-finite amounts
    #[arg(long)]
    pub strict: bool,

    /// Output format for reports
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    /// Print every key's snapshot after the last event
    #[arg(long)]
    pub summary: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

impl From<&Replay> for TrackerConfig {
    fn from(r: &Replay) -> Self {
        TrackerConfig::with_window(Duration::from_millis(r.window_ms))
    }
}
