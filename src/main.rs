//! CLI entry point for the ride notifier API.
//!
//! `serve` runs the HTTP backend. The other subcommands call the transit
//! service once and log the normalized result, which is handy when checking
//! what the upstream currently returns.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use ride_notifier::api;
use ride_notifier::config::{StoreConfig, TransitConfig, port_from_env};
use ride_notifier::infra::supabase::SupabaseClient;
use ride_notifier::infra::umoiq::UmoIqClient;
use ride_notifier::services::transit::{BundleOrder, TransitService};
use ride_notifier::state::AppState;
use serde::Serialize;
use std::ffi::OsStr;
use std::path::Path;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "ride_notifier")]
#[command(about = "Ride schedule and transit prediction API", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP API
    Serve {
        /// Port to listen on (defaults to $PORT, then 3000)
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Show the configured agency
    Agency,
    /// List routes of the agency
    Routes,
    /// List stops of a route
    Stops {
        #[arg(value_name = "ROUTE_ID")]
        route: String,
    },
    /// Search stops by name across all routes
    Search {
        #[arg(value_name = "QUERY")]
        query: String,
    },
    /// Show predictions for a stop
    Predictions {
        #[arg(value_name = "STOP_ID")]
        stop: String,

        /// Narrow predictions to one route
        #[arg(short, long)]
        route: Option<String>,
    },
    /// Show predictions near a coordinate, soonest first
    Near {
        #[arg(allow_negative_numbers = true)]
        lat: f64,
        #[arg(allow_negative_numbers = true)]
        lon: f64,

        /// Keep only the first N bundles
        #[arg(short, long)]
        limit: Option<usize>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path =
        std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| "logs/ride_notifier.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("ride_notifier.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse()?));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse()?));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();
    let transit_config = TransitConfig::from_env()?;

    match cli.command {
        Commands::Serve { port } => serve(transit_config, port).await?,
        command => {
            let api = UmoIqClient::new(&transit_config).context("building UmoIQ client")?;
            let transit = TransitService::new(Arc::new(api), &transit_config);
            run_once(&transit, command).await?;
        }
    }

    Ok(())
}

/// Runs the HTTP API until Ctrl+C.
#[tracing::instrument(skip(transit_config))]
async fn serve(transit_config: TransitConfig, port: Option<u16>) -> Result<()> {
    let store_config = StoreConfig::from_env()?;
    let port = match port {
        Some(port) => port,
        None => port_from_env()?,
    };

    let transit_api = UmoIqClient::new(&transit_config).context("building UmoIQ client")?;
    let supabase =
        Arc::new(SupabaseClient::new(&store_config).context("building Supabase client")?);
    let state = Arc::new(AppState::new(
        Arc::new(transit_api),
        supabase.clone(),
        supabase,
        &transit_config,
    ));

    let app = api::router(state);
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port))
        .await
        .with_context(|| format!("binding port {port}"))?;

    info!(port, agency = %transit_config.agency, "API server running on http://localhost:{port}");
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
            info!("Shutting down");
        })
        .await?;
    Ok(())
}

fn log_json<T: Serialize>(value: &T) -> Result<()> {
    info!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn run_once(transit: &TransitService, command: Commands) -> Result<()> {
    match command {
        Commands::Agency => log_json(&transit.agency().await?),
        Commands::Routes => {
            let routes = transit.routes().await?;
            info!(total = routes.len(), "Routes fetched");
            log_json(&routes)
        }
        Commands::Stops { route } => log_json(&transit.stops(Some(&route)).await?),
        Commands::Search { query } => log_json(&transit.search_stops(Some(&query)).await?),
        Commands::Predictions { stop, route } => log_json(
            &transit
                .predictions(Some(&stop), route.as_deref())
                .await?,
        ),
        Commands::Near { lat, lon, limit } => {
            let (lat, lon) = (lat.to_string(), lon.to_string());
            log_json(
                &transit
                    .predictions_near(Some(&lat), Some(&lon), BundleOrder::Soonest, limit)
                    .await?,
            )
        }
        Commands::Serve { .. } => anyhow::bail!("serve is not a one-shot command"),
    }
}
