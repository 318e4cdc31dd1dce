//! lms-server - Course catalog and learning records service
//!
//! `serve` (the default) starts the HTTP API. `repair` runs one repair routine,
//! or all of them, directly against the database and prints the reports as
//! JSON.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use lms_common::config::{database_path, resolve_root_folder, ServiceConfig, ROOT_ENV_VAR};
use lms_common::db::init_database;
use lms_common::reconcile::{Reconciler, RepairRoutine};
use lms_server::{build_router, AppState};
use tracing::info;

/// Command-line arguments for lms-server
#[derive(Parser, Debug)]
#[command(name = "lms-server")]
#[command(about = "Course catalog and learning records service")]
#[command(version)]
struct Args {
    /// Root folder holding lms.db and config.toml
    #[arg(long, global = true)]
    root_folder: Option<String>,

    /// Address to bind (overrides config.toml)
    #[arg(long, global = true)]
    host: Option<String>,

    /// Port to listen on (overrides config.toml)
    #[arg(short, long, global = true)]
    port: Option<u16>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP server
    Serve,
    /// Recompute denormalized values and fix drift
    Repair {
        /// Routine name, or `all` to run every routine in order
        routine: String,
        /// Report drift without writing
        #[arg(long)]
        dry_run: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "lms_server=info,lms_common=info,tower_http=info".into()),
        )
        .init();

    info!(
        "Starting LMS server (lms-server) v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let args = Args::parse();

    let root_folder = resolve_root_folder(args.root_folder.as_deref(), ROOT_ENV_VAR);
    std::fs::create_dir_all(&root_folder)
        .with_context(|| format!("Failed to create root folder {}", root_folder.display()))?;
    info!("Root folder: {}", root_folder.display());

    let mut config = ServiceConfig::load(&root_folder)?;
    if let Some(host) = args.host {
        config.host = host;
    }
    if let Some(port) = args.port {
        config.port = port;
    }

    let db_path = database_path(&root_folder);
    let pool = init_database(&db_path)
        .await
        .with_context(|| format!("Failed to open database {}", db_path.display()))?;

    match args.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(pool, config).await,
        Command::Repair { routine, dry_run } => repair(pool, &routine, dry_run).await,
    }
}

async fn serve(pool: sqlx::SqlitePool, config: ServiceConfig) -> Result<()> {
    let addr = format!("{}:{}", config.host, config.port);
    let app = build_router(AppState::new(pool, config));

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    info!("lms-server listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app).await?;
    Ok(())
}

async fn repair(pool: sqlx::SqlitePool, routine: &str, dry_run: bool) -> Result<()> {
    let reconciler = Reconciler::new(pool);
    let reports = if routine == "all" {
        reconciler.repair_all(dry_run).await?
    } else {
        let routine: RepairRoutine = routine.parse()?;
        vec![reconciler.run(routine, dry_run).await?]
    };

    println!("{}", serde_json::to_string_pretty(&reports)?);
    Ok(())
}
