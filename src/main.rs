use anyhow::Context;
use clap::{Parser, Subcommand};
use git_conduit::commands::*;
use git_conduit::core::{
    bootstrap::Session, config::ConduitConfig, error::ConduitError, print_error,
};
use std::env;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "git-conduit")]
#[command(about = "Cached, rate-limited access to a git repository")]
#[command(version)]
struct Cli {
    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    /// Repository path (defaults to the current directory)
    #[arg(long, short = 'C', global = true)]
    path: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show branch, upstream and grouped file status
    Status,
    /// Show recent commits
    Log {
        /// Number of commits to show (defaults to max_log_entries)
        #[arg(short = 'n', long = "max-count")]
        limit: Option<usize>,
        /// Draw the commit graph across all refs
        #[arg(long)]
        graph: bool,
    },
    /// List local and remote branches
    Branches,
    /// Re-print status whenever git's state changes
    Watch {
        /// Exit after this many refreshes
        #[arg(long)]
        count: Option<usize>,
    },
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let config = ConduitConfig::load().context("Failed to load configuration")?;
    let path = match cli.path {
        Some(path) => path,
        None => env::current_dir().context("Failed to read current directory")?,
    };
    let session = Session::open(&path, &config)?;
    let service = session.service();

    match cli.command {
        Commands::Status => execute_status(service)?,
        Commands::Log { limit, graph } => {
            execute_log(service, limit.unwrap_or(config.max_log_entries), graph)?
        }
        Commands::Branches => execute_branches(service)?,
        Commands::Watch { count } => execute_watch(&session, count)?,
    }
    Ok(())
}

fn main() {
    let cli = Cli::parse();

    // Configure logging based on --debug flag
    if cli.debug {
        env::set_var("RUST_LOG", "debug");
    } else if env::var_os("RUST_LOG").is_none() {
        env::set_var("RUST_LOG", "info");
    }
    env_logger::init();

    if let Err(e) = run(cli) {
        match e.downcast_ref::<ConduitError>() {
            Some(ConduitError::NotARepository { .. }) => print_error("Not in a git repository"),
            _ => print_error(&format!("{e:#}")),
        }
        std::process::exit(1);
    }
}
