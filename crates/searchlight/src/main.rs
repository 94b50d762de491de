use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use colored::*;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

use searchlight::{view, Config, FailureMode, SearchResultController, SupabaseBackend};

#[derive(Parser)]
#[command(name = "searchlight")]
#[command(about = "Searchlight - product search results\nShow a submitted search and trigger scraping for it")]
#[command(version = concat!(env!("CARGO_PKG_VERSION"), ", courtesy of Kernelle Software"))]
struct Cli {
  /// Configuration file path
  #[arg(short, long, global = true)]
  config: Option<PathBuf>,

  /// Enable verbose logging
  #[arg(short, long, global = true)]
  verbose: bool,

  /// Show failed loads as errors instead of a loading indicator
  #[arg(long, global = true)]
  surface_errors: bool,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand)]
enum Command {
  /// Show a search and the products found for it
  Show {
    /// Search identifier
    id: String,
  },
  /// Ask the backend to start scraping a search
  Scrape {
    /// Search identifier
    id: String,
  },
}

fn init_logging(verbose: bool) {
  let default = if verbose { "searchlight=debug,warn" } else { "searchlight=warn,error" };
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

  tracing_subscriber::registry().with(fmt::layer().with_writer(std::io::stderr)).with(filter).init();
}

fn build_controller(cli: &Cli) -> Result<SearchResultController> {
  let mut config = Config::load(cli.config.as_deref()).context("Failed to load configuration")?;
  if cli.surface_errors {
    config.failure_mode = FailureMode::Surface;
  }

  let backend = SupabaseBackend::new(&config.backend)
    .context("Set SEARCHLIGHT_URL or add a backend url to .searchlight.json")?;

  Ok(SearchResultController::new(Arc::new(backend)).with_failure_mode(config.failure_mode))
}

async fn show(controller: &SearchResultController, id: &str) -> Result<()> {
  let state = controller.activate(id).await;
  println!("{}", view::render(&state, Utc::now()));
  Ok(())
}

async fn scrape(controller: &SearchResultController, id: &str) -> Result<()> {
  let state = controller.activate(id).await;
  println!("{}", view::render(&state, Utc::now()));

  let outcome = controller
    .request_scraping()
    .await
    .map_err(|_| anyhow!("Search '{id}' could not be loaded, not starting scraping"))?;

  println!();
  match (&outcome.error, &outcome.data) {
    (Some(error), _) => println!("{} {error}", "Scraping request failed:".red().bold()),
    (None, Some(data)) => println!("{} {data}", "Scraping requested:".green().bold()),
    (None, None) => println!("{}", "Scraping requested".green().bold()),
  }

  Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
  let cli = Cli::parse();
  init_logging(cli.verbose);

  let controller = build_controller(&cli)?;

  match &cli.command {
    Command::Show { id } => show(&controller, id).await,
    Command::Scrape { id } => scrape(&controller, id).await,
  }
}
