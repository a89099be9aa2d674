use std::collections::{BTreeMap, BTreeSet};

use anyhow::Context;
use time::{macros::format_description, Date, Duration, Month};
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use super::aggregate::{fold_daily_summary, fold_window, month_chunks, DateWindow};
use super::dto::{
    AggregateReport, DailyDashboard, DailySummary, GoalsUpdate, MealBreakdown, MonthlyDashboard,
    NutritionInsights, UserGoals,
};
use crate::meals::repo_types::{MealRecord, MealType};
use crate::storage::NutritionStore;

/// Error marker carried by reports built while storage was failing.
pub const STORAGE_UNAVAILABLE: &str = "storage unavailable";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsightPeriod {
    Week,
    Month,
    Quarter,
}

impl InsightPeriod {
    /// Unknown or missing periods read as the 7-day window.
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            Some("1m" | "1month") => Self::Month,
            Some("3m" | "3months") => Self::Quarter,
            _ => Self::Week,
        }
    }

    pub const fn days(self) -> u16 {
        match self {
            Self::Week => 7,
            Self::Month => 30,
            Self::Quarter => 90,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Week => "7d",
            Self::Month => "1m",
            Self::Quarter => "3m",
        }
    }
}

/// Monday of the week containing `date`.
pub fn week_start(date: Date) -> Date {
    date - Duration::days(i64::from(date.weekday().number_days_from_monday()))
}

pub async fn user_goals(store: &dyn NutritionStore, user_id: Uuid) -> anyhow::Result<UserGoals> {
    let goals = store.goals(user_id).await.context("load goals")?;
    Ok(goals.unwrap_or_default())
}

#[instrument(skip(store, update))]
pub async fn set_user_goals(
    store: &dyn NutritionStore,
    user_id: Uuid,
    update: GoalsUpdate,
) -> anyhow::Result<UserGoals> {
    let goals = update.into_goals();
    store.set_goals(user_id, &goals).await.context("save goals")?;
    info!(%user_id, calories = goals.calories, protein = goals.protein, "goals updated");
    Ok(goals)
}

async fn refresh_summary(
    store: &dyn NutritionStore,
    user_id: Uuid,
    date: Date,
    goals: &UserGoals,
) -> anyhow::Result<(DailySummary, Vec<MealRecord>)> {
    let meals = store
        .meals_between(user_id, date, date)
        .await
        .context("load meals for summary")?;
    let summary = fold_daily_summary(user_id, date, &meals, goals);
    store
        .upsert_summary(&summary)
        .await
        .context("upsert daily summary")?;
    Ok((summary, meals))
}

/// Recomputes the date's summary from its meals and stores it, replacing
/// whatever was there.
#[instrument(skip(store))]
pub async fn build_daily_summary(
    store: &dyn NutritionStore,
    user_id: Uuid,
    date: Date,
) -> anyhow::Result<DailySummary> {
    let goals = user_goals(store, user_id).await?;
    let (summary, _) = refresh_summary(store, user_id, date, &goals).await?;
    Ok(summary)
}

/// Stored summaries for the window, with every date that has meals refolded
/// from those meals. Missing or stale rows are rewritten when storage allows.
async fn window_summaries(
    store: &dyn NutritionStore,
    user_id: Uuid,
    window: &DateWindow,
    goals: &UserGoals,
) -> anyhow::Result<Vec<DailySummary>> {
    let stored = store
        .summaries_between(user_id, window.start(), window.end())
        .await
        .context("load window summaries")?;
    let meals = store
        .meals_between(user_id, window.start(), window.end())
        .await
        .context("load window meals")?;

    let mut by_date: BTreeMap<Date, DailySummary> =
        stored.into_iter().map(|s| (s.date, s)).collect();
    let meal_dates: BTreeSet<Date> = meals.iter().map(|m| m.date).collect();
    for date in meal_dates {
        let fresh = fold_daily_summary(user_id, date, &meals, goals);
        if by_date.get(&date) == Some(&fresh) {
            continue;
        }
        if let Err(e) = store.upsert_summary(&fresh).await {
            warn!(error = %e, %user_id, %date, "stale summary not rewritten");
        }
        by_date.insert(date, fresh);
    }
    Ok(by_date.into_values().collect())
}

/// Folds the window's summaries, rebuilt from meals where needed. Storage
/// failures come back as a zeroed report with `error` set.
#[instrument(skip(store, goals))]
pub async fn build_window_report(
    store: &dyn NutritionStore,
    user_id: Uuid,
    window: &DateWindow,
    goals: &UserGoals,
) -> AggregateReport {
    match window_summaries(store, user_id, window, goals).await {
        Ok(summaries) => fold_window(window, &summaries, goals),
        Err(e) => {
            error!(error = %e, %user_id, "window report degraded");
            AggregateReport::unavailable(window, goals, STORAGE_UNAVAILABLE)
        }
    }
}

async fn goals_for_report(
    store: &dyn NutritionStore,
    user_id: Uuid,
) -> Result<UserGoals, UserGoals> {
    user_goals(store, user_id).await.map_err(|e| {
        error!(error = %e, %user_id, "goals unavailable for report");
        UserGoals::default()
    })
}

fn meal_breakdown(meals: &[MealRecord]) -> MealBreakdown {
    let mut breakdown = MealBreakdown::default();
    for meal in meals {
        let slot = match meal.meal_type {
            MealType::Breakfast => &mut breakdown.breakfast,
            MealType::Lunch => &mut breakdown.lunch,
            MealType::Dinner => &mut breakdown.dinner,
            MealType::Snack => &mut breakdown.snack,
        };
        slot.count += 1;
        slot.calories += meal.totals.calories;
    }
    breakdown
}

fn long_date(date: Date) -> String {
    date.format(format_description!("[month repr:long] [day padding:none], [year]"))
        .unwrap_or_else(|_| date.to_string())
}

#[instrument(skip(store))]
pub async fn daily_dashboard(
    store: &dyn NutritionStore,
    user_id: Uuid,
    date: Date,
) -> anyhow::Result<DailyDashboard> {
    let goals = user_goals(store, user_id).await?;
    let (summary, meals) = refresh_summary(store, user_id, date, &goals).await?;
    Ok(DailyDashboard {
        summary,
        goals,
        meal_breakdown: meal_breakdown(&meals),
        day_of_week: date.weekday().to_string(),
        date_formatted: long_date(date),
    })
}

#[instrument(skip(store))]
pub async fn weekly_dashboard(
    store: &dyn NutritionStore,
    user_id: Uuid,
    start: Date,
) -> AggregateReport {
    let window = DateWindow::week_from(start);
    match goals_for_report(store, user_id).await {
        Ok(goals) => build_window_report(store, user_id, &window, &goals).await,
        Err(goals) => AggregateReport::unavailable(&window, &goals, STORAGE_UNAVAILABLE),
    }
}

/// `None` when the year/month pair is not a real calendar month.
#[instrument(skip(store))]
pub async fn monthly_dashboard(
    store: &dyn NutritionStore,
    user_id: Uuid,
    year: i32,
    month: u8,
) -> Option<MonthlyDashboard> {
    let month = Month::try_from(month).ok()?;
    let window = DateWindow::month(year, month)?;

    let loaded = match goals_for_report(store, user_id).await {
        Ok(goals) => match window_summaries(store, user_id, &window, &goals).await {
            Ok(summaries) => Ok((goals, summaries)),
            Err(e) => {
                error!(error = %e, %user_id, "monthly summaries unavailable");
                Err(goals)
            }
        },
        Err(goals) => Err(goals),
    };
    let (report, weekly_data) = match loaded {
        Ok((goals, summaries)) => (
            fold_window(&window, &summaries, &goals),
            month_chunks(&window, &summaries),
        ),
        Err(goals) => (
            AggregateReport::unavailable(&window, &goals, STORAGE_UNAVAILABLE),
            Vec::new(),
        ),
    };

    Some(MonthlyDashboard {
        year,
        month: month as u8,
        month_name: month.to_string(),
        days_in_month: month.length(year),
        report,
        weekly_data,
    })
}

#[instrument(skip(store))]
pub async fn nutrition_insights(
    store: &dyn NutritionStore,
    user_id: Uuid,
    today: Date,
    period: InsightPeriod,
) -> NutritionInsights {
    let Some(window) = DateWindow::lookback(today, period.days()) else {
        warn!(%today, period = period.as_str(), "lookback window out of range");
        return NutritionInsights {
            period: period.as_str(),
            report: AggregateReport::unavailable(
                &DateWindow::day(today),
                &UserGoals::default(),
                "date out of range",
            ),
        };
    };
    let report = match goals_for_report(store, user_id).await {
        Ok(goals) => build_window_report(store, user_id, &window, &goals).await,
        Err(goals) => AggregateReport::unavailable(&window, &goals, STORAGE_UNAVAILABLE),
    };
    NutritionInsights {
        period: period.as_str(),
        report,
    }
}
