use std::collections::BTreeMap;

use time::{Date, Duration, Month};
use uuid::Uuid;

use super::dto::{
    AggregateReport, DailySummary, Deficiency, GoalAchievement, GoalFlags, MacroPercentages,
    Severity, TrendPoint, UserGoals, WeekChunk, WindowAverages, WindowTotals,
};
use crate::meals::repo_types::MealRecord;

/// Share of a goal that counts as "achieved" for a day.
pub const ACHIEVED_RATIO: f64 = 0.9;
pub const PROTEIN_DEFICIT_RATIO: f64 = 0.8;
pub const PROTEIN_SEVERE_RATIO: f64 = 0.6;
pub const FIBER_DEFICIT_RATIO: f64 = 0.7;
pub const CALORIE_LOW_RATIO: f64 = 0.8;
pub const CALORIE_HIGH_RATIO: f64 = 1.2;

pub const KCAL_PER_G_PROTEIN: f64 = 4.0;
pub const KCAL_PER_G_CARBS: f64 = 4.0;
pub const KCAL_PER_G_FAT: f64 = 9.0;

/// Inclusive calendar range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateWindow {
    start: Date,
    end: Date,
}

impl DateWindow {
    /// `None` when `end` precedes `start`.
    pub fn new(start: Date, end: Date) -> Option<Self> {
        (start <= end).then_some(Self { start, end })
    }

    pub fn day(date: Date) -> Self {
        Self { start: date, end: date }
    }

    pub fn week_from(start: Date) -> Self {
        Self {
            start,
            end: start.saturating_add(Duration::days(6)),
        }
    }

    pub fn month(year: i32, month: Month) -> Option<Self> {
        let start = Date::from_calendar_date(year, month, 1).ok()?;
        let end = Date::from_calendar_date(year, month, month.length(year)).ok()?;
        Some(Self { start, end })
    }

    /// `days` calendar days ending on (and including) `end`.
    pub fn lookback(end: Date, days: u16) -> Option<Self> {
        if days == 0 {
            return None;
        }
        let start = end.checked_sub(Duration::days(i64::from(days) - 1))?;
        Some(Self { start, end })
    }

    pub fn start(&self) -> Date {
        self.start
    }

    pub fn end(&self) -> Date {
        self.end
    }

    pub fn contains(&self, date: Date) -> bool {
        self.start <= date && date <= self.end
    }

    pub fn days_count(&self) -> u32 {
        u32::try_from((self.end - self.start).whole_days() + 1).unwrap_or(0)
    }

    pub fn dates(&self) -> impl Iterator<Item = Date> {
        let end = self.end;
        std::iter::successors(Some(self.start), move |d| d.next_day().filter(|n| *n <= end))
    }
}

fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

fn percent(part: u32, whole: u32) -> f64 {
    if whole == 0 {
        0.0
    } else {
        round1(f64::from(part) / f64::from(whole) * 100.0)
    }
}

/// Folds one date's meals into its summary. Meals on other dates are ignored,
/// so the result depends only on the set of meals for `date`.
pub fn fold_daily_summary(
    user_id: Uuid,
    date: Date,
    meals: &[MealRecord],
    goals: &UserGoals,
) -> DailySummary {
    let mut summary = DailySummary {
        user_id,
        date,
        total_calories: 0.0,
        total_protein: 0.0,
        total_carbs: 0.0,
        total_fat: 0.0,
        total_fiber: 0.0,
        meals_count: 0,
        goal_calories_achieved: false,
        goal_protein_achieved: false,
    };
    for meal in meals.iter().filter(|m| m.user_id == user_id && m.date == date) {
        summary.total_calories += meal.totals.calories;
        summary.total_protein += meal.totals.protein;
        summary.total_carbs += meal.totals.carbs;
        summary.total_fat += meal.totals.fat;
        summary.total_fiber += meal.totals.fiber;
        summary.meals_count += 1;
    }
    summary.goal_calories_achieved = summary.total_calories >= goals.calories * ACHIEVED_RATIO;
    summary.goal_protein_achieved = summary.total_protein >= goals.protein * ACHIEVED_RATIO;
    summary
}

/// One summary per tracked date inside the window; a later duplicate replaces
/// an earlier one. Summaries with no meals behind them are not tracked days.
fn index_by_date<'a>(
    window: &DateWindow,
    summaries: &'a [DailySummary],
) -> BTreeMap<Date, &'a DailySummary> {
    summaries
        .iter()
        .filter(|s| window.contains(s.date) && s.meals_count > 0)
        .map(|s| (s.date, s))
        .collect()
}

/// Every date in the window exactly once, zero-filled where nothing was logged.
pub fn fill_trend(window: &DateWindow, summaries: &[DailySummary]) -> Vec<TrendPoint> {
    let by_date = index_by_date(window, summaries);
    window
        .dates()
        .map(|date| {
            let s = by_date.get(&date);
            TrendPoint {
                date,
                day_name: date.weekday().to_string(),
                calories: s.map_or(0.0, |s| s.total_calories),
                protein: s.map_or(0.0, |s| s.total_protein),
                carbs: s.map_or(0.0, |s| s.total_carbs),
                fat: s.map_or(0.0, |s| s.total_fat),
                fiber: s.map_or(0.0, |s| s.total_fiber),
                meals_count: s.map_or(0, |s| s.meals_count),
                goals_achieved: GoalFlags {
                    calories: s.is_some_and(|s| s.goal_calories_achieved),
                    protein: s.is_some_and(|s| s.goal_protein_achieved),
                },
            }
        })
        .collect()
}

/// Caloric share of each macro; all zero when there are no macro calories.
pub fn macro_percentages(protein_g: f64, carbs_g: f64, fat_g: f64) -> MacroPercentages {
    let protein = protein_g * KCAL_PER_G_PROTEIN;
    let carbs = carbs_g * KCAL_PER_G_CARBS;
    let fat = fat_g * KCAL_PER_G_FAT;
    let total = protein + carbs + fat;
    if total <= 0.0 {
        return MacroPercentages::default();
    }
    MacroPercentages {
        protein: protein / total * 100.0,
        carbs: carbs / total * 100.0,
        fat: fat / total * 100.0,
    }
}

/// Independent threshold checks on unrounded averages.
pub fn detect_deficiencies(averages: &WindowAverages, goals: &UserGoals) -> Vec<Deficiency> {
    let mut out = Vec::new();
    let share = |avg: f64, goal: f64| if goal > 0.0 { round1(avg / goal * 100.0) } else { 0.0 };

    if averages.protein < goals.protein * PROTEIN_DEFICIT_RATIO {
        let severity = if averages.protein < goals.protein * PROTEIN_SEVERE_RATIO {
            Severity::High
        } else {
            Severity::Moderate
        };
        out.push(Deficiency {
            nutrient: "protein",
            severity,
            average: round1(averages.protein),
            goal: goals.protein,
            percent_of_goal: share(averages.protein, goals.protein),
            message: "Protein intake is below target. Add dal, paneer, eggs, legumes or nuts to your meals."
                .into(),
        });
    }

    if averages.fiber < goals.fiber * FIBER_DEFICIT_RATIO {
        out.push(Deficiency {
            nutrient: "fiber",
            severity: Severity::Moderate,
            average: round1(averages.fiber),
            goal: goals.fiber,
            percent_of_goal: share(averages.fiber, goals.fiber),
            message: "Fiber intake is low. Include more vegetables, whole grains, fruit and pulses."
                .into(),
        });
    }

    let (low, high) = (
        goals.calories * CALORIE_LOW_RATIO,
        goals.calories * CALORIE_HIGH_RATIO,
    );
    let calorie_message = if averages.calories < low {
        Some("Average calories are well below your goal. Make sure you are eating enough balanced meals.")
    } else if averages.calories > high {
        Some("Average calories are well above your goal. Consider smaller portions and lighter evening meals.")
    } else {
        None
    };
    if let Some(message) = calorie_message {
        out.push(Deficiency {
            nutrient: "calories",
            severity: Severity::Moderate,
            average: round1(averages.calories),
            goal: goals.calories,
            percent_of_goal: share(averages.calories, goals.calories),
            message: message.into(),
        });
    }

    out
}

/// Sums and per-tracked-day averages over the window, plus the gap-filled trend.
pub fn fold_window(
    window: &DateWindow,
    summaries: &[DailySummary],
    goals: &UserGoals,
) -> AggregateReport {
    let by_date = index_by_date(window, summaries);
    let days_tracked = u32::try_from(by_date.len()).unwrap_or(u32::MAX);

    let mut totals = WindowTotals::default();
    let mut achievement = GoalAchievement {
        total_days: days_tracked,
        ..GoalAchievement::default()
    };
    for s in by_date.values() {
        totals.calories += s.total_calories;
        totals.protein += s.total_protein;
        totals.carbs += s.total_carbs;
        totals.fat += s.total_fat;
        totals.fiber += s.total_fiber;
        totals.meals += s.meals_count;
        achievement.calories_days += u32::from(s.goal_calories_achieved);
        achievement.protein_days += u32::from(s.goal_protein_achieved);
    }
    achievement.calories_percentage = percent(achievement.calories_days, days_tracked);
    achievement.protein_percentage = percent(achievement.protein_days, days_tracked);

    let averages = if days_tracked == 0 {
        WindowAverages::default()
    } else {
        let n = f64::from(days_tracked);
        WindowAverages {
            calories: totals.calories / n,
            protein: totals.protein / n,
            carbs: totals.carbs / n,
            fat: totals.fat / n,
            fiber: totals.fiber / n,
        }
    };

    // no tracked days means no evidence either way
    let deficiencies = if days_tracked == 0 {
        Vec::new()
    } else {
        detect_deficiencies(&averages, goals)
    };

    AggregateReport {
        start_date: window.start(),
        end_date: window.end(),
        days_count: window.days_count(),
        days_tracked,
        totals,
        averages: WindowAverages {
            calories: round1(averages.calories),
            protein: round1(averages.protein),
            carbs: round1(averages.carbs),
            fat: round1(averages.fat),
            fiber: round1(averages.fiber),
        },
        goal_achievement: achievement,
        macro_percentages: macro_percentages(totals.protein, totals.carbs, totals.fat),
        deficiencies,
        daily_trend: fill_trend(window, summaries),
        goals: *goals,
        error: None,
    }
}

impl AggregateReport {
    /// Zeroed report carrying an error marker, used when storage fails.
    pub fn unavailable(window: &DateWindow, goals: &UserGoals, reason: impl Into<String>) -> Self {
        Self {
            start_date: window.start(),
            end_date: window.end(),
            days_count: window.days_count(),
            days_tracked: 0,
            totals: WindowTotals::default(),
            averages: WindowAverages::default(),
            goal_achievement: GoalAchievement::default(),
            macro_percentages: MacroPercentages::default(),
            deficiencies: Vec::new(),
            daily_trend: Vec::new(),
            goals: *goals,
            error: Some(reason.into()),
        }
    }
}

/// Splits the window into consecutive ≤7-day chunks from its first day.
pub fn month_chunks(window: &DateWindow, summaries: &[DailySummary]) -> Vec<WeekChunk> {
    let by_date = index_by_date(window, summaries);
    let mut chunks = Vec::new();
    let mut chunk_start = Some(window.start());
    let mut week_number = 1;

    while let Some(start) = chunk_start.filter(|d| *d <= window.end()) {
        let end = start.saturating_add(Duration::days(6)).min(window.end());
        let mut chunk = WeekChunk {
            week_number,
            start_date: start,
            end_date: end,
            calories: 0.0,
            protein: 0.0,
            meals: 0,
            days_tracked: 0,
        };
        for (_, s) in by_date.range(start..=end) {
            chunk.calories += s.total_calories;
            chunk.protein += s.total_protein;
            chunk.meals += s.meals_count;
            chunk.days_tracked += 1;
        }
        chunks.push(chunk);
        chunk_start = end.next_day();
        week_number += 1;
    }
    chunks
}
