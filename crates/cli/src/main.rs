//! filescope CLI: the main entry point.
//!
//! Commands:
//! - `scan`    : List the project files a model may see
//! - `select`  : Run one context-selection turn
//! - `session` : Interactive selection loop sharing one cache
//! - `status`  : Show effective configuration
//! - `init`    : Write a default config file

use clap::{Parser, Subcommand};
use filescope_config::AppConfig;
use std::path::PathBuf;

mod commands;
mod project;

#[derive(Parser)]
#[command(
    name = "filescope",
    about = "filescope: context-selection cache for AI pair programming",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file to use instead of ~/.filescope/config.toml
    #[arg(short, long, global = true, env = "FILESCOPE_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// List the non-ignored files of a project
    Scan {
        /// Project root
        #[arg(short, long, default_value = ".")]
        root: PathBuf,
    },

    /// Select the context files for one message
    Select {
        /// Project root
        #[arg(short, long, default_value = ".")]
        root: PathBuf,

        /// The user message
        #[arg(short, long)]
        message: String,

        /// Precomputed conversation summary
        #[arg(short, long)]
        summary: Option<String>,

        /// Paths already in context, oldest first
        #[arg(short, long)]
        buffer: Vec<String>,

        /// Print the outcome and metrics as JSON
        #[arg(long)]
        json: bool,
    },

    /// Interactive loop: one message per line, shared cache and buffer
    Session {
        /// Project root
        #[arg(short, long, default_value = ".")]
        root: PathBuf,
    },

    /// Show effective configuration
    Status,

    /// Write a default config file
    Init,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => AppConfig::load_with_env(path),
        None => AppConfig::load(),
    }
    .map_err(|e| format!("Failed to load config: {e}"))?;

    init_tracing(cli.verbose, &config);

    match cli.command {
        Commands::Scan { root } => commands::scan::run(&config, &root)?,
        Commands::Select {
            root,
            message,
            summary,
            buffer,
            json,
        } => {
            let args = commands::select::SelectArgs {
                root,
                message,
                summary,
                buffer,
                json,
            };
            commands::select::run(&config, args).await?
        }
        Commands::Session { root } => commands::session::run(&config, &root).await?,
        Commands::Status => commands::status::run(&config, cli.config.as_deref())?,
        Commands::Init => commands::init::run(cli.config.as_deref())?,
    }

    Ok(())
}

/// `RUST_LOG` wins; otherwise `debug` under `--verbose`, else the config level.
fn init_tracing(verbose: bool, config: &AppConfig) {
    let level = if verbose { "debug" } else { config.log.level.as_str() };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    if config.log.json {
        builder.json().init();
    } else {
        builder.init();
    }
}
