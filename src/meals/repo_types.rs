use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use time::{Date, OffsetDateTime};
use uuid::Uuid;

use super::services::classify_meal_time;
use crate::analysis::dto::NutritionItem;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MealType {
    Breakfast,
    Lunch,
    Dinner,
    Snack,
}

impl MealType {
    pub const ALL: [MealType; 4] = [Self::Breakfast, Self::Lunch, Self::Dinner, Self::Snack];

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Breakfast => "breakfast",
            Self::Lunch => "lunch",
            Self::Dinner => "dinner",
            Self::Snack => "snack",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s.trim()))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct NutrientTotals {
    pub calories: f64,
    pub protein: f64,
    pub carbs: f64,
    pub fat: f64,
    pub fiber: f64,
}

/// A logged meal; calendar fields are fixed when it is created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MealRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub date: Date,
    #[serde(with = "time::serde::rfc3339")]
    pub logged_at: OffsetDateTime,
    pub day_of_week: String,
    pub meal_type: MealType,
    pub items: Vec<NutritionItem>,
    pub totals: NutrientTotals,
}

#[derive(Debug, sqlx::FromRow)]
pub struct MealRecordRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub meal_date: Date,
    pub logged_at: OffsetDateTime,
    pub day_of_week: String,
    pub meal_type: Option<String>,
    pub items: Json<Vec<NutritionItem>>,
    pub total_calories: f64,
    pub total_protein: f64,
    pub total_carbs: f64,
    pub total_fat: f64,
    pub total_fiber: f64,
}

impl From<MealRecordRow> for MealRecord {
    fn from(r: MealRecordRow) -> Self {
        // older rows may predate the stamp
        let meal_type = r
            .meal_type
            .as_deref()
            .and_then(MealType::parse)
            .unwrap_or_else(|| classify_meal_time(r.logged_at.time()));
        Self {
            id: r.id,
            user_id: r.user_id,
            date: r.meal_date,
            logged_at: r.logged_at,
            day_of_week: r.day_of_week,
            meal_type,
            items: r.items.0,
            totals: NutrientTotals {
                calories: r.total_calories,
                protein: r.total_protein,
                carbs: r.total_carbs,
                fat: r.total_fat,
                fiber: r.total_fiber,
            },
        }
    }
}

#[cfg(test)]
mod repo_types_tests {
    use super::*;
    use time::macros::{date, datetime};

    fn row(meal_type: Option<&str>) -> MealRecordRow {
        MealRecordRow {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            meal_date: date!(2025 - 01 - 10),
            logged_at: datetime!(2025-01-10 19:30 UTC),
            day_of_week: "Friday".into(),
            meal_type: meal_type.map(str::to_owned),
            items: Json(Vec::new()),
            total_calories: 700.0,
            total_protein: 15.0,
            total_carbs: 80.0,
            total_fat: 20.0,
            total_fiber: 4.0,
        }
    }

    #[test]
    fn stored_meal_type_wins() {
        let meal = MealRecord::from(row(Some("Lunch")));
        assert_eq!(meal.meal_type, MealType::Lunch);
        assert_eq!(meal.totals.calories, 700.0);
    }

    #[test]
    fn missing_meal_type_is_classified_from_time() {
        assert_eq!(MealRecord::from(row(None)).meal_type, MealType::Dinner);
        assert_eq!(MealRecord::from(row(Some("brunch"))).meal_type, MealType::Dinner);
    }

    #[test]
    fn meal_type_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&MealType::Snack).unwrap(), "\"snack\"");
    }
}
