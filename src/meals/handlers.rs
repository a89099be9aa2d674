use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use time::OffsetDateTime;
use tracing::{error, instrument};
use uuid::Uuid;

use super::dto::{HistoryQuery, HistoryResponse, LogMealRequest, LogMealResponse};
use super::services::{log_meal, meal_history, MAX_HISTORY_DAYS};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/users/:user_id/meals", post(create_meal))
        .route("/users/:user_id/meals/history", get(history))
}

#[instrument(skip(state, body))]
pub async fn create_meal(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Json(body): Json<LogMealRequest>,
) -> Result<(StatusCode, Json<LogMealResponse>), (StatusCode, String)> {
    let logged_at = body.logged_at.unwrap_or_else(OffsetDateTime::now_utc);
    let (meal, daily_summary) = log_meal(state.store.as_ref(), user_id, logged_at, &body.analysis)
        .await
        .map_err(internal)?;
    Ok((StatusCode::CREATED, Json(LogMealResponse { meal, daily_summary })))
}

#[instrument(skip(state))]
pub async fn history(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Query(q): Query<HistoryQuery>,
) -> Result<Json<HistoryResponse>, (StatusCode, String)> {
    if !(1..=MAX_HISTORY_DAYS).contains(&q.days) {
        return Err((
            StatusCode::BAD_REQUEST,
            format!("days must be between 1 and {MAX_HISTORY_DAYS}"),
        ));
    }
    let today = OffsetDateTime::now_utc().date();
    let meals = meal_history(state.store.as_ref(), user_id, today, q.days)
        .await
        .map_err(internal)?;
    Ok(Json(HistoryResponse {
        days: q.days,
        count: meals.len(),
        meals,
    }))
}

fn internal(e: anyhow::Error) -> (StatusCode, String) {
    error!(error = %e, "meal storage failed");
    (StatusCode::SERVICE_UNAVAILABLE, "meal storage unavailable, try again".into())
}
