pub mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "subfeed")]
#[command(about = "Tracks airing schedules and fetches their caption archives", long_about = None)]
pub struct Cli {
    /// Config file (default: ~/.config/subfeed/config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Items processed concurrently per cycle (overrides poller.workers)
    #[arg(short, long, global = true)]
    pub workers: Option<usize>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run one reconciliation cycle
    Poll,
    /// Run a cycle on every tick until interrupted
    Watch {
        /// Tick interval (e.g., "10m", "1h", "1d"; default: poller.interval)
        #[arg(short, long)]
        interval: Option<String>,

        /// Wait for the first tick instead of running immediately
        #[arg(long)]
        no_initial_run: bool,
    },
    /// Download and unpack the caption archives linked from pages
    Fetch {
        /// Page or archive URLs
        #[arg(required = true)]
        urls: Vec<String>,
    },
    /// Show how a URL is classified and where it downloads from
    Resolve {
        url: String,
    },
    /// Unpack a local archive
    Unpack {
        archive: PathBuf,

        /// Destination (default: next to the archive, named after it)
        #[arg(short, long)]
        dest: Option<PathBuf>,
    },
    /// List tracked schedules or stored captions
    List {
        /// Show captions instead of schedules
        #[arg(long)]
        captions: bool,
    },
}
