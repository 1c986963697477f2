//! CLI commands implementation.
//!
//! This module contains the CLI parser and dispatches to command-specific modules.

mod config_cmd;
mod crawl;
mod init;
mod status;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::{load_settings_with_options, LoadOptions};

#[derive(Parser)]
#[command(name = "crs")]
#[command(about = "Incremental CRS report fetcher")]
#[command(version)]
pub struct Cli {
    /// Data directory (overrides config file)
    #[arg(long, short = 't', global = true, env = "CRS_DATA_DIR")]
    target: Option<PathBuf>,

    /// Config file path (overrides auto-discovery)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Remote sink descriptor with TOKEN= and PATH= lines
    #[arg(long, global = true, env = "CRS_SINK_FILE")]
    sink_file: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the data directory and ledger
    Init,

    /// Fetch new and changed reports from the paginated search listing
    Listing {
        /// Listing page to start from
        #[arg(long)]
        start_page: Option<u32>,
    },

    /// Crawl the Constitution Annotated page tree
    Conan {
        /// Page path to start from
        #[arg(long)]
        root: Option<String>,
    },

    /// Show ledger statistics and recent entries
    Status {
        /// Number of recent entries to list
        #[arg(long, default_value = "10")]
        recent: usize,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the effective configuration
    Config,
}

/// Run the CLI.
pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let options = LoadOptions {
        config_path: cli.config,
        data_dir: cli.target,
        sink_file: cli.sink_file,
    };
    let (settings, config) = load_settings_with_options(options).await?;

    match cli.command {
        Commands::Init => init::cmd_init(&settings).await,
        Commands::Listing { start_page } => {
            crawl::cmd_listing(&settings, &config, start_page).await
        }
        Commands::Conan { root } => crawl::cmd_conan(&settings, &config, root.as_deref()).await,
        Commands::Status { recent, json } => status::cmd_status(&settings, recent, json).await,
        Commands::Config => config_cmd::cmd_config(&settings, &config).await,
    }
}
