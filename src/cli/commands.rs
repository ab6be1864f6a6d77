//! CLI arguments

use clap::Parser;
use std::path::PathBuf;

/// Export the last 30 days of Webex converged recordings to CSV
#[derive(Parser, Debug, Clone, Default)]
#[command(name = "recordings-export")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file (YAML)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Output CSV path
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// API base URL
    #[arg(long)]
    pub base_url: Option<String>,

    /// Records requested per page (1-100)
    #[arg(long)]
    pub page_size: Option<usize>,

    /// Columns written first (comma-separated)
    #[arg(long, value_delimiter = ',')]
    pub columns: Vec<String>,

    /// Read the access token from this environment variable instead of prompting
    #[arg(long, value_name = "VAR")]
    pub token_env: Option<String>,

    /// Verbose output
    #[arg(short, long)]
    pub verbose: bool,
}
