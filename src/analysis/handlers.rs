use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use time::{format_description::well_known::Rfc3339, OffsetDateTime};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::dto::{
    AnalysisBody, AnalysisRecord, AnalysisResponse, AnalyzeTextRequest, MarkdownResponse,
    MealInsights, RefineRequest, SwapsResponse, UserProfile,
};
use super::services;
use crate::ai::ImageInput;
use crate::meals::services::log_meal;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/users/:user_id/analysis/text", post(analyze_text))
        .route(
            "/users/:user_id/analysis/image",
            post(analyze_image).layer(DefaultBodyLimit::max(20 * 1024 * 1024)), // 20MB
        )
        .route("/analysis/refine", post(refine))
        .route("/analysis/insights", post(insights))
        .route("/analysis/swaps", post(swaps))
        .route("/analysis/recipe", post(recipe))
        .route("/meal-plan", post(meal_plan))
}

/// Questions only accompany records that asked for them. With `log` set and
/// at least one item, the meal is stored straight away at `logged_at`.
async fn respond(
    state: &AppState,
    user_id: Uuid,
    analysis: AnalysisRecord,
    log: bool,
    logged_at: Option<OffsetDateTime>,
) -> AnalysisResponse {
    let questions = if analysis.need_clarification {
        services::clarifying_questions(&analysis)
    } else {
        Vec::new()
    };
    let mut response = AnalysisResponse {
        analysis,
        questions,
        meal_id: None,
        daily_summary: None,
    };
    if log && response.analysis.has_items() {
        match log_meal(
            state.store.as_ref(),
            user_id,
            logged_at.unwrap_or_else(OffsetDateTime::now_utc),
            &response.analysis,
        )
        .await
        {
            Ok((meal, summary)) => {
                response.meal_id = Some(meal.id);
                response.daily_summary = summary;
            }
            // the analysis is still worth returning
            Err(e) => warn!(error = %e, %user_id, "analysis not logged"),
        }
    }
    response
}

#[instrument(skip(state, body))]
pub async fn analyze_text(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Json(body): Json<AnalyzeTextRequest>,
) -> Json<AnalysisResponse> {
    let analysis =
        services::analyze_text(state.ai.as_ref(), &body.text, body.diet_preference.as_deref()).await;
    info!(items = analysis.items.len(), calories = analysis.total_calories, "text analysed");
    Json(respond(&state, user_id, analysis, body.log, body.logged_at).await)
}

fn parse_logged_at(raw: &str) -> Result<OffsetDateTime, (StatusCode, String)> {
    OffsetDateTime::parse(raw.trim(), &Rfc3339).map_err(|_| {
        (
            StatusCode::BAD_REQUEST,
            format!("invalid logged_at '{raw}', expected RFC 3339"),
        )
    })
}

/// Multipart fields: `file` (required, image/*), `diet_preference`, `log`,
/// `logged_at` (RFC 3339, local offset).
#[instrument(skip(state, mp))]
pub async fn analyze_image(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    mut mp: Multipart,
) -> Result<Json<AnalysisResponse>, (StatusCode, String)> {
    let mut image: Option<ImageInput> = None;
    let mut diet_preference: Option<String> = None;
    let mut log = false;
    let mut logged_at: Option<OffsetDateTime> = None;

    while let Some(field) = mp.next_field().await.map_err(bad_request)? {
        match field.name() {
            Some("file") => {
                let mime_type = field
                    .content_type()
                    .map(str::to_owned)
                    .unwrap_or_else(|| "application/octet-stream".into());
                if !mime_type.starts_with("image/") {
                    return Err((StatusCode::BAD_REQUEST, "file must be an image".into()));
                }
                let data = field.bytes().await.map_err(bad_request)?;
                image = Some(ImageInput { data, mime_type });
            }
            Some("diet_preference") => {
                let text = field.text().await.map_err(bad_request)?;
                diet_preference = Some(text).filter(|t| !t.trim().is_empty());
            }
            Some("log") => {
                let text = field.text().await.map_err(bad_request)?;
                log = matches!(text.trim(), "true" | "1" | "yes");
            }
            Some("logged_at") => {
                let text = field.text().await.map_err(bad_request)?;
                if !text.trim().is_empty() {
                    logged_at = Some(parse_logged_at(&text)?);
                }
            }
            _ => {}
        }
    }

    let Some(image) = image else {
        return Err((StatusCode::BAD_REQUEST, "file is required".into()));
    };
    if image.data.is_empty() {
        return Err((StatusCode::BAD_REQUEST, "file is empty".into()));
    }

    let analysis =
        services::analyze_image(state.ai.as_ref(), &image, diet_preference.as_deref()).await;
    info!(
        bytes = image.data.len(),
        items = analysis.items.len(),
        calories = analysis.total_calories,
        "image analysed"
    );
    Ok(Json(respond(&state, user_id, analysis, log, logged_at).await))
}

#[instrument(skip(state, body))]
pub async fn refine(
    State(state): State<AppState>,
    Json(body): Json<RefineRequest>,
) -> Json<AnalysisResponse> {
    let analysis = services::refine_with_answers(
        state.ai.as_ref(),
        &body.analysis,
        &body.questions,
        &body.answers,
    )
    .await;
    let questions = if analysis.need_clarification {
        services::clarifying_questions(&analysis)
    } else {
        Vec::new()
    };
    Json(AnalysisResponse {
        analysis,
        questions,
        meal_id: None,
        daily_summary: None,
    })
}

#[instrument(skip(state, body))]
pub async fn insights(
    State(state): State<AppState>,
    Json(body): Json<AnalysisBody>,
) -> Json<MealInsights> {
    Json(services::meal_insights(state.ai.as_ref(), &body.analysis).await)
}

#[instrument(skip(state, body))]
pub async fn swaps(
    State(state): State<AppState>,
    Json(body): Json<AnalysisBody>,
) -> Json<SwapsResponse> {
    let swaps = services::healthy_swaps(state.ai.as_ref(), &body.analysis).await;
    Json(SwapsResponse { swaps })
}

#[instrument(skip(state, body))]
pub async fn recipe(
    State(state): State<AppState>,
    Json(body): Json<AnalysisBody>,
) -> Json<MarkdownResponse> {
    let markdown = services::generate_recipe(state.ai.as_ref(), &body.analysis).await;
    Json(MarkdownResponse { markdown })
}

#[instrument(skip(state, profile))]
pub async fn meal_plan(
    State(state): State<AppState>,
    Json(profile): Json<UserProfile>,
) -> Json<MarkdownResponse> {
    let markdown = services::generate_meal_plan(state.ai.as_ref(), &profile).await;
    Json(MarkdownResponse { markdown })
}

fn bad_request<E: std::error::Error>(e: E) -> (StatusCode, String) {
    (StatusCode::BAD_REQUEST, e.to_string())
}
