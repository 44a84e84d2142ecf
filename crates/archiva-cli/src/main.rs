//! Archiva CLI - Maven repository proxy and indexer

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;
mod display;
mod error;
mod exit_codes;

use error::{CliError, Result};

#[derive(Parser)]
#[command(name = "archiva")]
#[command(author = "Archiva Contributors")]
#[command(version)]
#[command(about = "Maven repository proxy with artifact indexing", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (defaults to ~/.config/archiva/archiva.yaml)
    #[arg(short, long, global = true, env = "ARCHIVA_CONFIG")]
    config: Option<PathBuf>,

    /// Enable debug output
    #[arg(long, global = true)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// List the proxy connectors of a managed repository
    Connectors {
        /// Managed repository id
        repository: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Fetch an artifact or path through the proxy connectors
    Fetch {
        /// Managed repository id
        repository: String,

        /// Repository path or groupId:artifactId:version[:classifier][:type]
        target: String,
    },

    /// Fetch and merge maven-metadata.xml from all remotes
    Metadata {
        /// Managed repository id
        repository: String,

        /// Metadata path or the directory holding it
        path: String,
    },

    /// Index the artifacts of a managed repository
    Scan {
        /// Managed repository id
        repository: String,

        /// Do not write the packed index
        #[arg(long)]
        skip_pack: bool,
    },

    /// Search the local indexes
    Search {
        /// Search terms
        query: String,

        /// Limit the search to one repository
        #[arg(short, long)]
        repository: Option<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Build the merged index of a repository group
    MergeIndex {
        /// Repository group id
        group: String,

        /// Build a temporary index with its own id
        #[arg(long)]
        temporary: bool,

        /// Write the packed index next to the merged index
        #[arg(long)]
        pack: bool,

        /// Directory of the merged index; temporary indexes go in a new
        /// subdirectory of it
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Download the index published by a remote repository
    RemoteIndex {
        /// Remote repository id
        remote: String,
    },

    /// Run the index scheduler until interrupted
    Daemon,
}

fn main() {
    // Setup miette for nice error display
    miette::set_panic_hook();

    let cli = Cli::parse();
    init_tracing(cli.debug);

    if let Err(err) = run(cli) {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}

fn init_tracing(debug: bool) {
    let default_level = if debug { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run(cli: Cli) -> Result<()> {
    let config = commands::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Connectors { repository, json } => {
            commands::connectors::run(&config, &repository, json)
        }

        Commands::Scan {
            repository,
            skip_pack,
        } => commands::scan::run(&config, &repository, skip_pack),

        Commands::Search {
            query,
            repository,
            json,
        } => commands::search::run(&config, &query, repository.as_deref(), json),

        Commands::MergeIndex {
            group,
            temporary,
            pack,
            output,
        } => commands::merge_index::run(&config, &group, temporary, pack, output.as_deref()),

        Commands::Fetch { repository, target } => {
            runtime()?.block_on(commands::fetch::run(&config, &repository, &target))
        }

        Commands::Metadata { repository, path } => {
            runtime()?.block_on(commands::metadata::run(&config, &repository, &path))
        }

        Commands::RemoteIndex { remote } => {
            runtime()?.block_on(commands::remote_index::run(&config, &remote))
        }

        Commands::Daemon => runtime()?.block_on(commands::daemon::run(config)),
    }
}

fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Runtime::new()
        .map_err(|e| CliError::internal(format!("Failed to create async runtime: {}", e)))
}
