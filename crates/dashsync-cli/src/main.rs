mod commands;
mod config;
mod workspace;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use dashsync_connectors::builtin_registry;
use tracing_subscriber::EnvFilter;

use crate::workspace::Workspace;

#[derive(Parser)]
#[command(name = "dashsync")]
#[command(about = "Sync dashboard data sources into a local data directory")]
struct Cli {
    /// Config file (defaults to ~/.config/dashsync/dashsync.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List available connectors and their settings
    Connectors,
    /// List configured sources
    Sources,
    /// Sync every active source, or only the named destination files
    Sync {
        /// Destination filenames of the sources to sync
        filenames: Vec<String>,
    },
    /// List files in the data directory
    Files,
    /// List transform handlers
    Handlers,
    /// Run a handler over a data file in place, keeping the original
    Transform {
        /// Data file name
        file: String,
        /// Handler file name
        handler: String,
    },
    /// Put back the original of a transformed data file
    Restore {
        /// Data file name
        file: String,
    },
    /// Delete a data file and its saved original
    Delete {
        /// Data file name
        file: String,
    },
    /// Show dashboard pages with their charts and data files
    Charts,
    /// Link a chart module to data files; no files removes the links
    Link {
        /// Chart module file name
        chart: String,
        /// Data file names
        files: Vec<String>,
    },
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let app_config = config::load_config(cli.config.as_deref());
    let workspace = Workspace::from_config(&app_config);

    match cli.command {
        Command::Connectors => {
            commands::connectors::run(&builtin_registry().discover());
            Ok(())
        }
        Command::Sources => {
            commands::sources::run(&workspace.documents.load_sources());
            Ok(())
        }
        Command::Sync { filenames } => {
            let failed = commands::sync::run(&workspace, &filenames).await?;
            if failed > 0 {
                anyhow::bail!("{failed} source(s) failed to sync");
            }
            Ok(())
        }
        Command::Files => commands::artifacts::list(&workspace),
        Command::Handlers => {
            commands::artifacts::handlers(&workspace);
            Ok(())
        }
        Command::Transform { file, handler } => {
            commands::artifacts::transform(&workspace, &file, &handler).await
        }
        Command::Restore { file } => commands::artifacts::restore(&workspace, &file),
        Command::Delete { file } => commands::artifacts::delete(&workspace, &file),
        Command::Charts => {
            commands::charts::run(&workspace);
            Ok(())
        }
        Command::Link { chart, files } => commands::charts::link(&workspace, &chart, files),
    }
}
