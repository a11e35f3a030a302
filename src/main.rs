//! Govplan - Government Plan Tracker
//!
//! Tracks the commitments a government made (coalition agreements and other
//! planning documents) and how far each has been implemented. Editors record
//! dated updates that move a plan's status and rating; the public site and a
//! read-only REST API show the result.
//!
//! The binary serves the HTTP application by default and also carries the
//! maintenance commands: schema migration, CSV import and account creation.

mod auth;
mod config;
mod db;
mod error;
mod importer;
mod links;
mod models;
mod routes;
mod sanitize;
mod search;
mod state;

use crate::config::Settings;
use crate::db::users::NewUser;
use crate::importer::{ColumnMapping, PgImportTarget, PlanImporter};
use crate::routes::create_router;
use crate::state::AppState;
use anyhow::Context;
use clap::{Parser, Subcommand};
use deadpool_postgres::Pool;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "govplan", version, about = "Government plan tracker")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP server (default)
    Serve,
    /// Create missing tables and indexes
    Migrate,
    /// Import plans of a government from a CSV file
    Import {
        /// Slug of the government the plans belong to
        government: String,
        /// JSON file mapping plan fields to CSV columns
        mapping: PathBuf,
        /// CSV file with one plan per row
        csv: PathBuf,
    },
    /// Create an account for the admin API
    CreateUser {
        #[arg(long)]
        email: String,
        #[arg(long, env = "GOVPLAN_USER_PASSWORD")]
        password: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        staff: bool,
        /// May edit every plan, government and section
        #[arg(long)]
        manage_plans: bool,
        /// Editor group, created when missing; may be repeated
        #[arg(long = "group", value_name = "NAME")]
        groups: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing subscriber for structured logging
    init_tracing();

    let cli = Cli::parse();
    let settings = Settings::load().context("Failed to load configuration")?;
    info!("Configuration loaded successfully");

    let pool = db::connect(&settings.database)
        .await
        .context("Failed to connect to the database")?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(pool, settings).await,
        Command::Migrate => {
            db::schema::migrate(&pool, &settings.site.search_language).await?;
            Ok(())
        }
        Command::Import {
            government,
            mapping,
            csv,
        } => import(&pool, &government, &mapping, &csv).await,
        Command::CreateUser {
            email,
            password,
            name,
            staff,
            manage_plans,
            groups,
        } => {
            auth::check_password_strength(&password)?;
            let user = db::UserService::new(pool)
                .create(&NewUser {
                    email,
                    password_hash: auth::hash_password(&password)?,
                    name,
                    is_staff: staff,
                    can_manage_plans: manage_plans,
                    groups,
                })
                .await?;
            println!("Created user {} ({})", user.email, user.id);
            Ok(())
        }
    }
}

async fn serve(pool: Pool, settings: Settings) -> anyhow::Result<()> {
    info!("Starting govplan");
    db::schema::migrate(&pool, &settings.site.search_language).await?;

    let state = Arc::new(AppState::new(pool, &settings));
    let app = create_router(state, &settings);

    let addr = SocketAddr::from((settings.server.host, settings.server.port));
    info!(%addr, base_path = %settings.site.base_path, "Server listening");

    // Create TCP listener and serve
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

async fn import(
    pool: &Pool,
    government_slug: &str,
    mapping_path: &Path,
    csv_path: &Path,
) -> anyhow::Result<()> {
    let government = db::GovernmentService::new(pool.clone())
        .get_by_slug(government_slug)
        .await?
        .with_context(|| format!("No government with slug '{}'", government_slug))?;

    let mapping_file = std::fs::read_to_string(mapping_path)
        .with_context(|| format!("Failed to read {}", mapping_path.display()))?;
    let mapping: serde_json::Value =
        serde_json::from_str(&mapping_file).context("Column mapping is not valid JSON")?;
    let mapping = ColumnMapping::from_json(&mapping)?;

    let file = std::fs::File::open(csv_path)
        .with_context(|| format!("Failed to open {}", csv_path.display()))?;

    let mut client = pool.get().await?;
    let mut target = PgImportTarget::new(client.transaction().await?);
    let summary = PlanImporter::new(government, mapping)
        .import_rows(file, &mut target)
        .await?;
    target.commit().await?;

    println!("Import done. {}", summary);
    Ok(())
}

/// Initialize tracing with structured logging
///
/// `LOG_FORMAT=json` switches to one JSON object per line.
fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,govplan=debug,tower_http=debug"));

    let json = std::env::var("LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json"));
    let registry = tracing_subscriber::registry().with(env_filter);
    if json {
        registry.with(fmt::layer().json().with_target(true)).init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_level(true)
                    .with_thread_ids(true)
                    .with_file(true)
                    .with_line_number(true)
                    .compact(),
            )
            .init();
    }
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal, initiating graceful shutdown...");
        },
        _ = terminate => {
            info!("Received terminate signal, initiating graceful shutdown...");
        },
    }
}
