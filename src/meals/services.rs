use anyhow::Context;
use time::{Duration, OffsetDateTime, Time};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::repo_types::{MealRecord, MealType, NutrientTotals};
use crate::analysis::dto::AnalysisRecord;
use crate::dashboard::{dto::DailySummary, services::build_daily_summary};
use crate::storage::NutritionStore;

pub const MAX_HISTORY_DAYS: u16 = 365;

/// Buckets a local time of day: breakfast [05, 11), lunch [11, 16),
/// dinner [16, 21), snack otherwise.
pub fn classify_meal_time(at: Time) -> MealType {
    match at.hour() {
        5..=10 => MealType::Breakfast,
        11..=15 => MealType::Lunch,
        16..=20 => MealType::Dinner,
        _ => MealType::Snack,
    }
}

/// Builds a record from an analysis, stamping date, weekday and meal type
/// from `logged_at` in its own offset.
pub fn new_meal_record(
    user_id: Uuid,
    logged_at: OffsetDateTime,
    analysis: &AnalysisRecord,
) -> MealRecord {
    MealRecord {
        id: Uuid::new_v4(),
        user_id,
        date: logged_at.date(),
        logged_at,
        day_of_week: logged_at.weekday().to_string(),
        meal_type: classify_meal_time(logged_at.time()),
        items: analysis.items.clone(),
        totals: NutrientTotals {
            calories: analysis.total_calories,
            protein: analysis.total_protein,
            carbs: analysis.total_carbs,
            fat: analysis.total_fat,
            fiber: analysis.total_fiber,
        },
    }
}

/// Persists the meal and refreshes that date's summary.
///
/// Only a failed insert is an error. Once the meal is stored a failed summary
/// refresh yields `None`; window reports rebuild the day from its meals.
#[instrument(skip(store, analysis))]
pub async fn log_meal(
    store: &dyn NutritionStore,
    user_id: Uuid,
    logged_at: OffsetDateTime,
    analysis: &AnalysisRecord,
) -> anyhow::Result<(MealRecord, Option<DailySummary>)> {
    let meal = new_meal_record(user_id, logged_at, analysis);
    store.insert_meal(&meal).await.context("insert meal")?;
    let summary = match build_daily_summary(store, user_id, meal.date).await {
        Ok(summary) => Some(summary),
        Err(e) => {
            warn!(error = %e, meal_id = %meal.id, "meal stored but summary not refreshed");
            None
        }
    };
    info!(
        meal_id = %meal.id,
        meal_type = meal.meal_type.as_str(),
        calories = meal.totals.calories,
        "meal logged"
    );
    Ok((meal, summary))
}

/// Meals from `today - days` through `today`, newest first.
#[instrument(skip(store))]
pub async fn meal_history(
    store: &dyn NutritionStore,
    user_id: Uuid,
    today: time::Date,
    days: u16,
) -> anyhow::Result<Vec<MealRecord>> {
    let start = today - Duration::days(i64::from(days));
    let mut meals = store
        .meals_between(user_id, start, today)
        .await
        .context("load meal history")?;
    meals.sort_by(|a, b| b.logged_at.cmp(&a.logged_at));
    Ok(meals)
}
