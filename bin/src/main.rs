//! arcstream CLI - Streaming miniSEED retrieval from FDSNWS dataselect services.

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "arcstream")]
#[command(about = "Streaming miniSEED retrieval from FDSNWS dataselect services", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Quiet mode (suppress progress output)
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch records and write them as raw miniSEED
    Fetch {
        /// Service URL (e.g., fdsnwss://service.example.org)
        url: String,

        /// Streams as NET.STA.LOC.CHA (use -- or nothing for an empty location)
        #[arg(short, long = "stream", required = true, num_args = 1..)]
        streams: Vec<String>,

        /// Start time (RFC 3339, YYYY-MM-DDTHH:MM:SS[.ffffff] or YYYY-MM-DD), UTC
        #[arg(long)]
        start: String,

        /// End time, same formats as --start. Defaults to now.
        #[arg(long)]
        end: Option<String>,

        /// I/O timeout in seconds (0 disables it)
        #[arg(long)]
        timeout: Option<u64>,

        /// Session configuration file (JSON)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Output file path. Defaults to stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List available services
    Services,
}

fn init_tracing(verbose: u8, quiet: bool) {
    let level = match (quiet, verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "info",
        (false, 2) => "debug",
        (false, _) => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    // Show help if no command provided
    let Some(command) = cli.command else {
        Cli::command().print_help()?;
        return Ok(());
    };

    match command {
        Commands::Fetch {
            url,
            streams,
            start,
            end,
            timeout,
            config,
            output,
        } => commands::fetch::fetch(commands::fetch::FetchArgs {
            url: &url,
            streams: &streams,
            start: &start,
            end: end.as_deref(),
            timeout,
            config,
            output,
            quiet: cli.quiet,
        }),
        Commands::Services => commands::services::list_services(),
    }
}
