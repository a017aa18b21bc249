use axum::{
    Json,
    extract::{Query, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
};

use crate::{
    AppState,
    handlers::{ApiError, error_response, internal_error},
    models::{
        alert::Alert,
        metrics::DailyRecord,
        query::{DateRange, ExportQuery},
    },
    services::{export, store},
};

/// Validates both bounds before any query runs
fn parse_range(query: &ExportQuery) -> Result<DateRange, ApiError> {
    query
        .date_range()
        .map_err(|e| error_response(StatusCode::BAD_REQUEST, e))
}

const METRICS_ATTACHMENT: &str = "attachment; filename=\"zcash_metrics.csv\"";
const ALERTS_ATTACHMENT: &str = "attachment; filename=\"zcash_alerts.csv\"";

fn csv_headers(disposition: &'static str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("text/csv; charset=utf-8"));
    headers.insert(header::CONTENT_DISPOSITION, HeaderValue::from_static(disposition));
    headers
}

async fn metrics_in_range(state: &AppState, query: &ExportQuery) -> Result<Vec<DailyRecord>, ApiError> {
    let range = parse_range(query)?;
    tracing::info!("Exporting metrics (start: {:?}, end: {:?})", range.start, range.end);
    store::daily_records_between(&state.db, &range)
        .await
        .map_err(internal_error)
}

async fn alerts_in_range(state: &AppState, query: &ExportQuery) -> Result<Vec<Alert>, ApiError> {
    let range = parse_range(query)?;
    tracing::info!("Exporting alerts (start: {:?}, end: {:?})", range.start, range.end);
    store::alerts_between(&state.db, &range)
        .await
        .map_err(internal_error)
}

/// Handler for GET /api/export/metrics/csv
pub async fn export_metrics_csv(
    State(state): State<AppState>,
    Query(query): Query<ExportQuery>,
) -> Result<(HeaderMap, String), ApiError> {
    let records = metrics_in_range(&state, &query).await?;
    Ok((csv_headers(METRICS_ATTACHMENT), export::metrics_csv(&records)))
}

/// Handler for GET /api/export/metrics/json
pub async fn export_metrics_json(
    State(state): State<AppState>,
    Query(query): Query<ExportQuery>,
) -> Result<Json<Vec<DailyRecord>>, ApiError> {
    Ok(Json(metrics_in_range(&state, &query).await?))
}

/// Handler for GET /api/export/alerts/csv
pub async fn export_alerts_csv(
    State(state): State<AppState>,
    Query(query): Query<ExportQuery>,
) -> Result<(HeaderMap, String), ApiError> {
    let alerts = alerts_in_range(&state, &query).await?;
    Ok((csv_headers(ALERTS_ATTACHMENT), export::alerts_csv(&alerts)))
}

/// Handler for GET /api/export/alerts/json
pub async fn export_alerts_json(
    State(state): State<AppState>,
    Query(query): Query<ExportQuery>,
) -> Result<Json<Vec<Alert>>, ApiError> {
    Ok(Json(alerts_in_range(&state, &query).await?))
}
