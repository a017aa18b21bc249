use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{MissedTickBehavior, interval};

use crate::services::refresh::RefreshPipeline;

/// Spawns the periodic refresh loop. The first cycle runs immediately.
///
/// Each tick starts its cycle in a separate task; a tick that lands while the
/// previous cycle is still running is dropped by the pipeline's in-flight
/// guard rather than queued.
pub async fn start_metrics_refresh_job(pipeline: Arc<RefreshPipeline>, every: Duration) {
    tokio::spawn(async move {
        let mut interval = interval(every);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            interval.tick().await;
            tracing::info!("Starting scheduled metrics refresh");

            let pipeline = pipeline.clone();
            tokio::spawn(async move {
                let today = Utc::now().date_naive();
                match pipeline.run_cycle(today).await {
                    Ok(Some(report)) => tracing::info!(
                        "Metrics refresh complete: {} rows from {}",
                        report.records_written,
                        report.data_source
                    ),
                    Ok(None) => {}
                    Err(e) => tracing::error!(error = %e, "Metrics refresh failed"),
                }
            });
        }
    });
}
