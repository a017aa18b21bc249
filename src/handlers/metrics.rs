use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
};
use chrono::{NaiveTime, TimeZone, Utc};

use crate::{
    AppState,
    handlers::{ApiError, error_response, internal_error},
    models::{
        metrics::{
            DailyRecord, KpiResponse, MetadataResponse, MetricsPayload, MetricsSummary,
            MomentumResponse, NetworkHealthDetailed, PoolMigrationResponse, PrivacyMetricsResponse,
        },
        query::{DaysQuery, LimitQuery},
    },
    services::{
        metrics::{self, LONG_WINDOW},
        store,
        sync_status::{self, jobs},
    },
};

const DEFAULT_DAILY_LIMIT: u64 = 30;
const MAX_DAYS: u64 = 1000;

fn no_data() -> ApiError {
    error_response(StatusCode::NOT_FOUND, "No daily metrics available yet")
}

async fn load_recent(state: &AppState, limit: u64) -> Result<Vec<DailyRecord>, ApiError> {
    store::recent_daily_records(&state.db, limit)
        .await
        .map_err(internal_error)
}

fn window(days: Option<u64>) -> u64 {
    days.unwrap_or(LONG_WINDOW as u64).clamp(1, MAX_DAYS)
}

/// Handler for GET /api/metrics/daily
pub async fn get_daily_metrics(
    State(state): State<AppState>,
    Query(query): Query<LimitQuery>,
) -> Result<Json<MetricsPayload>, ApiError> {
    let limit = query.limit.unwrap_or(DEFAULT_DAILY_LIMIT).clamp(1, MAX_DAYS);
    let data = load_recent(&state, limit).await?;
    Ok(Json(MetricsPayload { data }))
}

/// Handler for GET /api/metrics/kpis
/// Headline cards comparing the latest day with the day before
pub async fn get_kpis(State(state): State<AppState>) -> Result<Json<KpiResponse>, ApiError> {
    let records = load_recent(&state, 2).await?;
    if records.is_empty() {
        return Err(no_data());
    }
    Ok(Json(KpiResponse {
        cards: metrics::kpi_cards(&records),
    }))
}

/// Handler for GET /api/metrics/summary
pub async fn get_summary(State(state): State<AppState>) -> Result<Json<MetricsSummary>, ApiError> {
    let records = load_recent(&state, LONG_WINDOW as u64).await?;
    metrics::summarize(&records).map(Json).ok_or_else(no_data)
}

/// Handler for GET /api/metrics/privacy
pub async fn get_privacy_metrics(
    State(state): State<AppState>,
    Query(query): Query<DaysQuery>,
) -> Result<Json<PrivacyMetricsResponse>, ApiError> {
    let records = load_recent(&state, window(query.days)).await?;
    metrics::privacy_metrics(&records).map(Json).ok_or_else(no_data)
}

/// Handler for GET /api/metrics/health
pub async fn get_network_health(
    State(state): State<AppState>,
) -> Result<Json<NetworkHealthDetailed>, ApiError> {
    let records = load_recent(&state, LONG_WINDOW as u64).await?;
    let summary = metrics::summarize(&records).ok_or_else(no_data)?;
    Ok(Json(metrics::network_health(&summary)))
}

/// Handler for GET /api/metrics/momentum
pub async fn get_momentum(State(state): State<AppState>) -> Result<Json<MomentumResponse>, ApiError> {
    let records = load_recent(&state, LONG_WINDOW as u64).await?;
    if records.is_empty() {
        return Err(no_data());
    }
    Ok(Json(metrics::momentum(&records)))
}

/// Handler for GET /api/metrics/pool-migration
pub async fn get_pool_migration(
    State(state): State<AppState>,
    Query(query): Query<DaysQuery>,
) -> Result<Json<PoolMigrationResponse>, ApiError> {
    let records = load_recent(&state, window(query.days)).await?;
    metrics::pool_migration(&records).map(Json).ok_or_else(no_data)
}

/// Handler for GET /api/metrics/metadata
/// Dataset freshness and the outcome of the last refresh
pub async fn get_metadata(State(state): State<AppState>) -> Result<Json<MetadataResponse>, ApiError> {
    let latest = load_recent(&state, 1).await?.pop().ok_or_else(no_data)?;
    let total_records = store::count_daily_records(&state.db)
        .await
        .map_err(internal_error)?;
    let status = sync_status::latest(&state.db, jobs::METRICS_REFRESH)
        .await
        .map_err(internal_error)?;

    let last_refresh_at = status.as_ref().and_then(|s| s.last_attempt_at);
    let next_refresh = state.settings.enable_live_data.then(|| {
        let interval = chrono::Duration::from_std(state.settings.refresh_interval)
            .unwrap_or_else(|_| chrono::Duration::minutes(5));
        last_refresh_at.unwrap_or_else(Utc::now) + interval
    });

    Ok(Json(MetadataResponse {
        last_updated: Utc.from_utc_datetime(&latest.date.and_time(NaiveTime::MIN)),
        data_source: state.settings.data_source_label().to_string(),
        next_refresh,
        total_records,
        last_refresh_at,
        last_refresh_error: status.and_then(|s| s.last_error),
    }))
}
