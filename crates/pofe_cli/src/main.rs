//! Diagnostic entry point for the context store.
//!
//! # Responsibility
//! - Open the store described by `POFE_*` variables and report its state.
//! - Expose export and traversal for quick local inspection.

use clap::{Parser, Subcommand};
use log::error;
use pofe_core::{
    core_version, init_logging, open_store, ContextService, DocumentStore, SqliteDocumentStore,
    StoreConfig,
};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "pofe_cli")]
#[command(about = "Inspect a layered project context store")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Print version, database path and per-layer item counts
    Status,
    /// Write every layer document to `<dir>/<layer>.json`
    Export {
        /// Target directory
        dir: PathBuf,
    },
    /// Print the traversal bundle rooted at a uid
    Gather {
        uid: String,
        /// Maximum number of hops from the root
        #[arg(short, long, default_value_t = 1)]
        depth: usize,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli.command.unwrap_or(Commands::Status)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            error!("event=cli_run module=cli status=error");
            eprintln!("pofe_cli: {message}");
            ExitCode::FAILURE
        }
    }
}

fn run(command: Commands) -> Result<(), String> {
    let config = StoreConfig::from_env().map_err(|err| err.to_string())?;
    let log_dir = std::env::current_dir()
        .map_err(|err| err.to_string())?
        .join(&config.context_dir)
        .join("logs");
    init_logging(&config.log_level, &log_dir).map_err(|err| err.to_string())?;

    let store = open_store(&config).map_err(|err| err.to_string())?;
    match command {
        Commands::Status => print_status(&config, &store),
        Commands::Export { dir } => {
            let written = ContextService::new(&store)
                .export(&dir)
                .map_err(|err| err.to_string())?;
            for path in written {
                println!("{}", path.display());
            }
            Ok(())
        }
        Commands::Gather { uid, depth } => {
            let bundle = ContextService::new(&store)
                .gather(&uid, depth)
                .map_err(|err| err.to_string())?;
            let rendered = serde_json::to_string_pretty(&bundle).map_err(|err| err.to_string())?;
            println!("{rendered}");
            Ok(())
        }
    }
}

fn print_status(config: &StoreConfig, store: &SqliteDocumentStore) -> Result<(), String> {
    println!("pofe_core version={}", core_version());
    println!("db_path={}", config.db_path().display());
    let entries = store.entries().map_err(|err| err.to_string())?;
    for layer in store.list().map_err(|err| err.to_string())? {
        let items = entries.iter().filter(|entry| entry.layer == layer).count();
        println!("layer={layer} items={items}");
    }
    Ok(())
}
