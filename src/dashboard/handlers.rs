use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use time::{macros::format_description, Date, OffsetDateTime};
use tracing::{error, instrument, warn};
use uuid::Uuid;

use super::dto::{
    AggregateReport, DailyDashboard, DailyQuery, DailySummary, GoalsUpdate, InsightsQuery,
    MonthlyDashboard, MonthlyQuery, NutritionInsights, UserGoals, WeeklyQuery,
};
use super::services::{self, InsightPeriod};
use crate::state::AppState;

const UNAVAILABLE: &str = "insights unavailable, try again";

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/users/:user_id/goals", get(get_goals).put(put_goals))
        .route("/users/:user_id/dashboard/daily", get(daily))
        .route("/users/:user_id/dashboard/weekly", get(weekly))
        .route("/users/:user_id/dashboard/monthly", get(monthly))
        .route("/users/:user_id/dashboard/insights", get(insights))
        .route("/users/:user_id/summaries/:date", post(rebuild_summary))
}

fn parse_date(raw: &str) -> Result<Date, (StatusCode, String)> {
    Date::parse(raw.trim(), format_description!("[year]-[month]-[day]"))
        .map_err(|_| (StatusCode::BAD_REQUEST, format!("invalid date '{raw}', expected YYYY-MM-DD")))
}

fn today() -> Date {
    OffsetDateTime::now_utc().date()
}

fn unavailable(e: anyhow::Error) -> (StatusCode, String) {
    error!(error = %e, "storage call failed");
    (StatusCode::SERVICE_UNAVAILABLE, UNAVAILABLE.into())
}

/// Degraded reports keep their shape internally; at the edge they become 503.
fn report_or_unavailable<T>(report: T, error: Option<&str>) -> Result<Json<T>, (StatusCode, String)> {
    match error {
        Some(marker) => {
            warn!(marker, "serving unavailable report");
            Err((StatusCode::SERVICE_UNAVAILABLE, UNAVAILABLE.into()))
        }
        None => Ok(Json(report)),
    }
}

#[instrument(skip(state))]
pub async fn get_goals(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<UserGoals>, (StatusCode, String)> {
    let goals = services::user_goals(state.store.as_ref(), user_id)
        .await
        .map_err(unavailable)?;
    Ok(Json(goals))
}

#[instrument(skip(state, body))]
pub async fn put_goals(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Json(body): Json<GoalsUpdate>,
) -> Result<Json<UserGoals>, (StatusCode, String)> {
    let goals = services::set_user_goals(state.store.as_ref(), user_id, body)
        .await
        .map_err(unavailable)?;
    Ok(Json(goals))
}

#[instrument(skip(state))]
pub async fn daily(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Query(q): Query<DailyQuery>,
) -> Result<Json<DailyDashboard>, (StatusCode, String)> {
    let date = match q.date.as_deref() {
        Some(raw) => parse_date(raw)?,
        None => today(),
    };
    let dashboard = services::daily_dashboard(state.store.as_ref(), user_id, date)
        .await
        .map_err(unavailable)?;
    Ok(Json(dashboard))
}

#[instrument(skip(state))]
pub async fn weekly(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Query(q): Query<WeeklyQuery>,
) -> Result<Json<AggregateReport>, (StatusCode, String)> {
    let start = match q.start_date.as_deref() {
        Some(raw) => parse_date(raw)?,
        None => services::week_start(today()),
    };
    let report = services::weekly_dashboard(state.store.as_ref(), user_id, start).await;
    let marker = report.error.clone();
    report_or_unavailable(report, marker.as_deref())
}

#[instrument(skip(state))]
pub async fn monthly(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Query(q): Query<MonthlyQuery>,
) -> Result<Json<MonthlyDashboard>, (StatusCode, String)> {
    let now = today();
    let year = q.year.unwrap_or(now.year());
    let month = q.month.unwrap_or(now.month() as u8);
    let Some(dashboard) = services::monthly_dashboard(state.store.as_ref(), user_id, year, month).await
    else {
        return Err((StatusCode::BAD_REQUEST, "month must be between 1 and 12".into()));
    };
    let marker = dashboard.report.error.clone();
    report_or_unavailable(dashboard, marker.as_deref())
}

#[instrument(skip(state))]
pub async fn insights(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Query(q): Query<InsightsQuery>,
) -> Result<Json<NutritionInsights>, (StatusCode, String)> {
    let period = InsightPeriod::parse(q.period.as_deref());
    let insights = services::nutrition_insights(state.store.as_ref(), user_id, today(), period).await;
    let marker = insights.report.error.clone();
    report_or_unavailable(insights, marker.as_deref())
}

#[instrument(skip(state))]
pub async fn rebuild_summary(
    State(state): State<AppState>,
    Path((user_id, date)): Path<(Uuid, String)>,
) -> Result<Json<DailySummary>, (StatusCode, String)> {
    let date = parse_date(&date)?;
    let summary = services::build_daily_summary(state.store.as_ref(), user_id, date)
        .await
        .map_err(unavailable)?;
    Ok(Json(summary))
}
