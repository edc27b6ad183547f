//! CLI commands for f1-api.
//!
//! Supports API server mode and the ingestion pipeline (single race, season,
//! several seasons), plus schedule inspection.

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::AppConfig;
use crate::load::Loader;
use crate::pipeline::{print_season_summary, Pipeline};
use crate::provider::OpenF1Client;
use crate::storage::Repository;

#[derive(Parser)]
#[command(name = "f1-api")]
#[command(version, about = "F1 telemetry pipeline and analytics API", long_about = None)]
pub struct Cli {
    /// Database path override
    #[arg(long, global = true)]
    pub database: Option<PathBuf>,

    /// Provider cache directory override
    #[arg(long, global = true)]
    pub cache_dir: Option<PathBuf>,

    /// Disable the provider response cache
    #[arg(long, global = true)]
    pub no_cache: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the API server
    Serve {
        /// Host to bind to
        #[arg(short = 'H', long)]
        host: Option<String>,

        /// Port to bind to
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Load a single race
    Load {
        /// Season year
        year: i32,

        /// Event name, location or country (e.g. "Monaco")
        race: String,
    },

    /// Load a season's races
    Season {
        /// Season year
        year: i32,

        /// Races to load instead of the full schedule
        #[arg(short, long, value_delimiter = ',')]
        races: Vec<String>,
    },

    /// Load several full seasons in order
    Seasons {
        /// Season years
        #[arg(required = true)]
        years: Vec<i32>,
    },

    /// Print the championship rounds of a season
    Schedule {
        /// Season year
        year: i32,
    },

    /// Delete all cached provider responses
    ClearCache,
}

impl Cli {
    /// Load configuration and apply global CLI overrides
    pub fn config(&self) -> anyhow::Result<AppConfig> {
        let mut config = AppConfig::load()?;

        if let Some(path) = &self.database {
            config.database.path = path.clone();
        }
        if let Some(dir) = &self.cache_dir {
            config.provider.cache_dir = dir.clone();
        }
        if self.no_cache {
            config.provider.cache_enabled = false;
        }

        Ok(config)
    }
}

fn build_pipeline(config: &AppConfig) -> anyhow::Result<Pipeline<OpenF1Client>> {
    let repo = Repository::new(&config.database.path)?;
    let loader = Loader::new(repo, config.loader.lap_batch_size);
    let client =
        OpenF1Client::from_config(&config.provider).context("Failed to build provider client")?;

    tracing::info!(
        "Database: {}, provider cache: {}",
        config.database.path.display(),
        if client.cache().is_enabled() {
            client.cache().base_dir().display().to_string()
        } else {
            "disabled".to_string()
        }
    );

    Pipeline::new(client, loader, &config.pipeline.exclude_pattern)
}

/// Load one race.
pub async fn run_load(config: AppConfig, year: i32, race: String) -> anyhow::Result<()> {
    let mut pipeline = build_pipeline(&config)?;

    if !pipeline.run_one(year, &race).await {
        anyhow::bail!("Failed to load {} {}", year, race);
    }

    let repo = pipeline.loader().repository();
    println!(
        "Loaded {} {} (database: {} races, {} drivers, {} results, {} sprint results, {} laps)",
        year,
        race,
        repo.race_count()?,
        repo.driver_count()?,
        repo.result_count()?,
        repo.sprint_result_count()?,
        repo.lap_count()?
    );
    Ok(())
}

/// Load a season, or the given races of it.
pub async fn run_season(config: AppConfig, year: i32, races: Vec<String>) -> anyhow::Result<()> {
    let mut pipeline = build_pipeline(&config)?;

    let races = if races.is_empty() { None } else { Some(races) };
    let summary = pipeline.run_season(year, races).await;
    print_season_summary(&summary);

    Ok(())
}

/// Load several seasons.
pub async fn run_seasons(config: AppConfig, years: Vec<i32>) -> anyhow::Result<()> {
    let mut pipeline = build_pipeline(&config)?;

    let summaries = pipeline.run_many_seasons(&years).await;
    for summary in &summaries {
        print_season_summary(summary);
    }

    let total: usize = summaries.iter().map(|s| s.outcomes.len()).sum();
    let failed: usize = summaries.iter().map(|s| s.failed()).sum();
    println!("Overall: {} races, {} failed", total, failed);

    Ok(())
}

/// Print a season's championship rounds.
pub async fn run_schedule(config: AppConfig, year: i32) -> anyhow::Result<()> {
    let pipeline = build_pipeline(&config)?;
    let events = pipeline.season_events(year).await?;

    println!("=== {} Schedule ===", year);
    println!();
    println!("  {:>3} {:12} {:40} {:14}", "#", "Date", "Event", "Format");
    println!("  {}", "-".repeat(72));
    for (i, event) in events.iter().enumerate() {
        println!(
            "  {:>3} {:12} {:40} {:14}",
            i + 1,
            event
                .date
                .map(|d| d.to_string())
                .unwrap_or_else(|| "-".to_string()),
            event.name,
            event.format.as_str()
        );
    }

    Ok(())
}

/// Delete cached provider responses.
pub fn run_clear_cache(config: AppConfig) -> anyhow::Result<()> {
    let client = OpenF1Client::from_config(&config.provider)?;
    client.cache().clear_all()?;
    println!("Cleared cache at {}", client.cache().base_dir().display());
    Ok(())
}
