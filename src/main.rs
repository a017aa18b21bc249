use std::sync::Arc;

use chrono::Utc;
use sea_orm::Database;
use sea_orm_migration::MigratorTrait;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use zcash_pulse::config::Settings;
use zcash_pulse::jobs::metrics_refresh::start_metrics_refresh_job;
use zcash_pulse::services::refresh::RefreshPipeline;
use zcash_pulse::{AppState, build_router};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,zcash_pulse=debug,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load environment variables
    dotenvy::dotenv().ok();

    let settings = match Settings::from_env() {
        Ok(settings) => Arc::new(settings),
        Err(e) => {
            tracing::error!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };
    settings.log_summary();

    // Connect to database
    tracing::info!("Connecting to database...");
    let db = Database::connect(&settings.database_url).await?;

    // Run migrations
    tracing::info!("Running migrations...");
    migration::Migrator::up(&db, None).await?;

    // Start background refresh
    let pipeline = Arc::new(RefreshPipeline::from_settings(db.clone(), &settings)?);
    tracing::info!(
        "Starting metrics refresh job (every {}s, first run {})",
        settings.refresh_interval.as_secs(),
        Utc::now().format("%Y-%m-%d %H:%M:%S")
    );
    start_metrics_refresh_job(pipeline, settings.refresh_interval).await;

    let state = AppState {
        db,
        settings: settings.clone(),
    };
    let app = build_router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&settings.bind_addr).await?;
    tracing::info!("Server listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;
    Ok(())
}
