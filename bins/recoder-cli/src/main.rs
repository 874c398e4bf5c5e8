mod commands;
mod generator;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use recoder_common::challenges::{self, ChallengeCatalog};
use recoder_common::config::Settings;
use recoder_validator::{Validator, ValidatorConfig};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "recoder-cli")]
#[command(about = "Recoder CLI - Fix today's buggy function and keep your streak", long_about = None)]
struct Cli {
    /// Challenge catalog file (defaults to RECODER_CATALOG, then the built-in catalog)
    #[arg(long, global = true)]
    catalog: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the daily challenge
    Today {
        /// Day to show (YYYY-MM-DD), defaults to today (UTC)
        #[arg(short, long)]
        date: Option<NaiveDate>,
    },

    /// List every challenge in the catalog
    List,

    /// Show one challenge
    Show {
        /// Challenge id (e.g., day-1)
        #[arg(short, long)]
        id: String,
    },

    /// Run a solution file against a challenge's test cases
    Check {
        /// File containing the fixed function
        #[arg(short, long)]
        file: PathBuf,

        /// Challenge id, defaults to today's challenge
        #[arg(short, long)]
        challenge: Option<String>,

        /// Progress file (defaults to ~/.recoder/progress.json)
        #[arg(short, long)]
        progress_file: Option<PathBuf>,
    },

    /// Show streak and completed challenges
    Progress {
        /// Progress file (defaults to ~/.recoder/progress.json)
        #[arg(short, long)]
        progress_file: Option<PathBuf>,
    },

    /// Check that every buggy snippet fails and every reference solution passes
    VerifyCatalog,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Validator diagnostics go to stderr when RUST_LOG asks for them
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let settings = Settings::from_env();

    let catalog_path = cli.catalog.or(settings.catalog_path);
    let catalog = ChallengeCatalog::load_or_builtin(catalog_path.as_deref())
        .context("Failed to load challenge catalog")?;

    let today = challenges::today();

    match cli.command {
        Commands::Today { date } => {
            commands::show_today(&catalog, date.unwrap_or(today));
        }
        Commands::List => {
            commands::list_challenges(&catalog, today);
        }
        Commands::Show { id } => {
            commands::show_challenge(&catalog, &id)?;
        }
        Commands::Check {
            file,
            challenge,
            progress_file,
        } => {
            let validator = build_validator()?;
            let progress_file = progress_file.unwrap_or_else(commands::default_progress_path);
            let solved = commands::check_solution(
                &catalog,
                &validator,
                &file,
                challenge.as_deref(),
                &progress_file,
                today,
            )
            .await?;
            if !solved {
                std::process::exit(1);
            }
        }
        Commands::Progress { progress_file } => {
            let progress_file = progress_file.unwrap_or_else(commands::default_progress_path);
            commands::show_progress(&progress_file, today).await?;
        }
        Commands::VerifyCatalog => {
            let validator = build_validator()?;
            commands::verify_catalog(&catalog, &validator).await?;
        }
    }

    Ok(())
}

fn build_validator() -> Result<Validator> {
    let config = ValidatorConfig::from_env().context("Invalid validator configuration")?;
    Ok(Validator::from_config(&config))
}
