use serde::{Deserialize, Serialize};
use time::Date;
use uuid::Uuid;

fn default_calories() -> f64 {
    2000.0
}
fn default_protein() -> f64 {
    50.0
}
fn default_carbs() -> f64 {
    250.0
}
fn default_fat() -> f64 {
    65.0
}
fn default_fiber() -> f64 {
    25.0
}

/// Daily nutrient targets. Absent keys deserialize to their defaults.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UserGoals {
    #[serde(default = "default_calories")]
    pub calories: f64,
    #[serde(default = "default_protein")]
    pub protein: f64,
    #[serde(default = "default_carbs")]
    pub carbs: f64,
    #[serde(default = "default_fat")]
    pub fat: f64,
    #[serde(default = "default_fiber")]
    pub fiber: f64,
}

impl Default for UserGoals {
    fn default() -> Self {
        Self {
            calories: default_calories(),
            protein: default_protein(),
            carbs: default_carbs(),
            fat: default_fat(),
            fiber: default_fiber(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct GoalsUpdate {
    pub calories: Option<f64>,
    pub protein: Option<f64>,
    pub carbs: Option<f64>,
    pub fat: Option<f64>,
    pub fiber: Option<f64>,
}

impl GoalsUpdate {
    /// Absent or non-positive fields fall back to the defaults, not to the
    /// previously stored values.
    pub fn into_goals(self) -> UserGoals {
        let d = UserGoals::default();
        let pick = |v: Option<f64>, default: f64| v.filter(|x| x.is_finite() && *x > 0.0).unwrap_or(default);
        UserGoals {
            calories: pick(self.calories, d.calories),
            protein: pick(self.protein, d.protein),
            carbs: pick(self.carbs, d.carbs),
            fat: pick(self.fat, d.fat),
            fiber: pick(self.fiber, d.fiber),
        }
    }
}

/// Per-day fold of a user's meals. Always derived, never edited directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailySummary {
    pub user_id: Uuid,
    pub date: Date,
    pub total_calories: f64,
    pub total_protein: f64,
    pub total_carbs: f64,
    pub total_fat: f64,
    pub total_fiber: f64,
    pub meals_count: u32,
    pub goal_calories_achieved: bool,
    pub goal_protein_achieved: bool,
}

#[derive(Debug, sqlx::FromRow)]
pub struct DailySummaryRow {
    pub user_id: Uuid,
    pub summary_date: Date,
    pub total_calories: f64,
    pub total_protein: f64,
    pub total_carbs: f64,
    pub total_fat: f64,
    pub total_fiber: f64,
    pub meals_count: i32,
    pub goal_calories_achieved: bool,
    pub goal_protein_achieved: bool,
}

impl From<DailySummaryRow> for DailySummary {
    fn from(r: DailySummaryRow) -> Self {
        Self {
            user_id: r.user_id,
            date: r.summary_date,
            total_calories: r.total_calories,
            total_protein: r.total_protein,
            total_carbs: r.total_carbs,
            total_fat: r.total_fat,
            total_fiber: r.total_fiber,
            meals_count: u32::try_from(r.meals_count).unwrap_or(0),
            goal_calories_achieved: r.goal_calories_achieved,
            goal_protein_achieved: r.goal_protein_achieved,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct GoalFlags {
    pub calories: bool,
    pub protein: bool,
}

/// One charted day; zeros when nothing was logged.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendPoint {
    pub date: Date,
    pub day_name: String,
    pub calories: f64,
    pub protein: f64,
    pub carbs: f64,
    pub fat: f64,
    pub fiber: f64,
    pub meals_count: u32,
    pub goals_achieved: GoalFlags,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct WindowTotals {
    pub calories: f64,
    pub protein: f64,
    pub carbs: f64,
    pub fat: f64,
    pub fiber: f64,
    pub meals: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct WindowAverages {
    pub calories: f64,
    pub protein: f64,
    pub carbs: f64,
    pub fat: f64,
    pub fiber: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct GoalAchievement {
    pub calories_days: u32,
    pub protein_days: u32,
    pub total_days: u32,
    pub calories_percentage: f64,
    pub protein_percentage: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct MacroPercentages {
    pub protein: f64,
    pub carbs: f64,
    pub fat: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Moderate,
    High,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Deficiency {
    pub nutrient: &'static str,
    pub severity: Severity,
    pub average: f64,
    pub goal: f64,
    pub percent_of_goal: f64,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateReport {
    pub start_date: Date,
    pub end_date: Date,
    pub days_count: u32,
    pub days_tracked: u32,
    pub totals: WindowTotals,
    pub averages: WindowAverages,
    pub goal_achievement: GoalAchievement,
    pub macro_percentages: MacroPercentages,
    pub deficiencies: Vec<Deficiency>,
    pub daily_trend: Vec<TrendPoint>,
    pub goals: UserGoals,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// ≤7-day slice of a month, counted from day 1.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeekChunk {
    pub week_number: u32,
    pub start_date: Date,
    pub end_date: Date,
    pub calories: f64,
    pub protein: f64,
    pub meals: u32,
    pub days_tracked: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct MealTypeStats {
    pub count: u32,
    pub calories: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct MealBreakdown {
    pub breakfast: MealTypeStats,
    pub lunch: MealTypeStats,
    pub dinner: MealTypeStats,
    pub snack: MealTypeStats,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyDashboard {
    #[serde(flatten)]
    pub summary: DailySummary,
    pub goals: UserGoals,
    pub meal_breakdown: MealBreakdown,
    pub day_of_week: String,
    pub date_formatted: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlyDashboard {
    pub year: i32,
    pub month: u8,
    pub month_name: String,
    pub days_in_month: u8,
    #[serde(flatten)]
    pub report: AggregateReport,
    pub weekly_data: Vec<WeekChunk>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NutritionInsights {
    pub period: &'static str,
    #[serde(flatten)]
    pub report: AggregateReport,
}

// --- query strings ---

#[derive(Debug, Deserialize)]
pub struct DailyQuery {
    pub date: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct WeeklyQuery {
    pub start_date: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct MonthlyQuery {
    pub year: Option<i32>,
    pub month: Option<u8>,
}

#[derive(Debug, Deserialize)]
pub struct InsightsQuery {
    #[serde(default)]
    pub period: Option<String>,
}
