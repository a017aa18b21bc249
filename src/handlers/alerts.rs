use axum::{
    Json,
    extract::{Query, State},
};

use crate::{
    AppState,
    handlers::{ApiError, internal_error},
    models::{alert::AlertFeed, query::LimitQuery},
    services::store,
};

const DEFAULT_ALERT_LIMIT: u64 = 10;
const MAX_ALERT_LIMIT: u64 = 1000;

/// Handler for GET /api/alerts
/// Most recent alerts, newest first
pub async fn get_alerts(
    State(state): State<AppState>,
    Query(query): Query<LimitQuery>,
) -> Result<Json<AlertFeed>, ApiError> {
    let limit = query.limit.unwrap_or(DEFAULT_ALERT_LIMIT).clamp(1, MAX_ALERT_LIMIT);

    let alerts = store::recent_alerts(&state.db, limit).await.map_err(internal_error)?;
    Ok(Json(AlertFeed { alerts }))
}
