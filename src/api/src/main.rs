//! F1 telemetry pipeline and analytics API
//!
//! CLI for loading race weekends from the upstream provider into SQLite, and
//! a read-only REST API over the loaded data.

mod cli;
mod config;
mod extract;
mod load;
mod pipeline;
mod provider;
mod routes;
mod stats;
mod storage;
mod transform;
mod types;

use axum::{routing::get, Router};
use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::{Cli, Commands};
use crate::config::AppConfig;
use crate::routes::AppState;
use crate::storage::Repository;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "f1_api=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = cli.config()?;

    match cli.command {
        Commands::Serve { host, port } => run_server(config, host, port).await,
        Commands::Load { year, race } => cli::run_load(config, year, race).await,
        Commands::Season { year, races } => cli::run_season(config, year, races).await,
        Commands::Seasons { years } => cli::run_seasons(config, years).await,
        Commands::Schedule { year } => cli::run_schedule(config, year).await,
        Commands::ClearCache => cli::run_clear_cache(config),
    }
}

/// Build the API router.
fn app(state: Arc<AppState>) -> Router {
    let api = Router::new()
        .route("/", get(routes::root))
        .route("/health", get(routes::health))
        .route("/drivers", get(routes::list_drivers))
        .route("/drivers/compare", get(routes::compare_drivers))
        .route("/drivers/{code}", get(routes::get_driver))
        .route("/drivers/{code}/stats", get(routes::get_driver_stats))
        .route("/drivers/{code}/races", get(routes::get_driver_races))
        .route("/races", get(routes::list_races))
        .route("/races/{race_id}", get(routes::get_race))
        .route("/races/{race_id}/results", get(routes::get_race_results))
        .route("/races/{race_id}/sprint", get(routes::get_sprint_results))
        .route("/races/{race_id}/laps", get(routes::get_race_laps))
        .route("/laps/fastest", get(routes::get_fastest_laps))
        .route("/team/{team}/performance", get(routes::get_team_performance))
        .route("/team/{team}/pit-stops", get(routes::get_team_pit_stops));

    Router::new()
        .nest("/api/v1", api)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Run the API server.
async fn run_server(
    mut config: AppConfig,
    host: Option<String>,
    port: Option<u16>,
) -> anyhow::Result<()> {
    // Override with CLI args
    if let Some(h) = host {
        config.server.host = h;
    }
    if let Some(p) = port {
        config.server.port = p;
    }

    tracing::info!("Configuration loaded");
    tracing::info!("Database path: {}", config.database.path.display());

    let repo = Repository::new(&config.database.path)?;
    tracing::info!(
        "Database opened: {} races, {} drivers",
        repo.race_count()?,
        repo.driver_count()?
    );

    let addr = SocketAddr::new(config.server.host.parse()?, config.server.port);
    let state = Arc::new(AppState::new(repo, config));

    tracing::info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app(state)).await?;

    Ok(())
}
