//! Pathoscope CLI - zero-shot disease classification of images with CLIP.
//!
//! Pathoscope ranks the entries of a disease catalogue against an image and
//! prints the top matches with their confidence, description, symptoms,
//! treatment and prevalence as JSON.
//!
//! # Usage
//!
//! ```bash
//! # Fetch the CLIP model
//! pathoscope models download
//!
//! # Classify an image
//! pathoscope classify lesion.jpg
//!
//! # List the diseases in the catalogue
//! pathoscope diseases
//!
//! # View configuration
//! pathoscope config show
//! ```

use clap::{Parser, Subcommand};

mod cli;
mod logging;

/// Pathoscope - zero-shot disease classification of images with CLIP.
#[derive(Parser, Debug)]
#[command(name = "pathoscope")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose (debug) logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output logs in JSON format
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Classify an image against the disease catalogue
    Classify(cli::classify::ClassifyArgs),

    /// List the diseases in the catalogue
    Diseases(cli::diseases::DiseasesArgs),

    /// Manage the CLIP model files (download, list, etc.)
    Models(cli::models::ModelsArgs),

    /// View and manage configuration
    Config(cli::config::ConfigArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logging isn't initialized yet, so config warnings go through eprintln.
    let config = match pathoscope_core::Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!(
                "Warning: Failed to load config: {e}\n  \
                 Using default configuration. Check your config file with `pathoscope config path`."
            );
            pathoscope_core::Config::default()
        }
    };
    logging::init_from_config(&config, cli.verbose, cli.json_logs);

    tracing::debug!("Pathoscope v{}", pathoscope_core::VERSION);

    match cli.command {
        Commands::Classify(args) => cli::classify::execute(args, config).await,
        Commands::Diseases(args) => cli::diseases::execute(args, &config),
        Commands::Models(args) => cli::models::execute(args, &config).await,
        Commands::Config(args) => cli::config::execute(args),
    }
}
