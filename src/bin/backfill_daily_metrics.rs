use std::env;
use std::sync::Arc;

use chrono::{Duration, Utc};
use sea_orm::Database;
use sea_orm_migration::MigratorTrait;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use zcash_pulse::config::Settings;
use zcash_pulse::services::coingecko::CoinGeckoService;
use zcash_pulse::services::ingestion::{IngestionOutcome, Ingestor};
use zcash_pulse::services::sync_status::{self, jobs};
use zcash_pulse::services::zchain::ZchainClient;

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
    let settings = Settings::from_env()?;

    // Number of days ending today, defaults to BACKFILL_DAYS
    let args: Vec<String> = env::args().collect();
    let days: u32 = match args.get(1) {
        Some(raw) => match raw.parse() {
            Ok(days) if days > 0 => days,
            _ => {
                eprintln!("Usage: cargo run --bin backfill_daily_metrics [days]");
                eprintln!("Example: cargo run --bin backfill_daily_metrics 30");
                std::process::exit(1);
            }
        },
        None => settings.backfill_days,
    };

    tracing::info!("Connecting to database...");
    let db = Database::connect(&settings.database_url).await?;
    migration::Migrator::up(&db, None).await?;

    let chain = ZchainClient::new(&settings.zchain_api_url)?;
    let prices = CoinGeckoService::new(&settings.coingecko_api_url, settings.coingecko_api_key.clone())?;
    let ingestor = Ingestor::new(Arc::new(chain), Some(Arc::new(prices)), days);

    let today = Utc::now().date_naive();
    let dates: Vec<_> = (0..days as i64).rev().map(|back| today - Duration::days(back)).collect();
    tracing::info!("🚀 Backfilling {} days ending {}", dates.len(), today);

    let outcome = ingestor.ingest_dates(&db, &dates).await?;
    match &outcome {
        IngestionOutcome::Failed { reason } => {
            sync_status::record_failure(&db, jobs::METRICS_BACKFILL, reason).await?;
            tracing::error!("❌ Backfill failed: {}", reason);
            std::process::exit(1);
        }
        IngestionOutcome::Degraded { reason, .. } => {
            tracing::warn!("Some days were skipped: {}", reason);
        }
        IngestionOutcome::Live { .. } => {}
    }

    sync_status::record_success(&db, jobs::METRICS_BACKFILL, outcome.label(), outcome.written()).await?;
    tracing::info!("✅ Backfill complete: {}/{} days written", outcome.written(), dates.len());
    Ok(())
}
