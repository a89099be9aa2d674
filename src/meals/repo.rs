use anyhow::Context;
use sqlx::{types::Json, PgPool};
use time::Date;
use uuid::Uuid;

use super::repo_types::{MealRecord, MealRecordRow};

pub async fn insert(db: &PgPool, meal: &MealRecord) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO meal_records (
            id, user_id, meal_date, logged_at, day_of_week, meal_type, items,
            total_calories, total_protein, total_carbs, total_fat, total_fiber
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
        "#,
    )
    .bind(meal.id)
    .bind(meal.user_id)
    .bind(meal.date)
    .bind(meal.logged_at)
    .bind(&meal.day_of_week)
    .bind(meal.meal_type.as_str())
    .bind(Json(&meal.items))
    .bind(meal.totals.calories)
    .bind(meal.totals.protein)
    .bind(meal.totals.carbs)
    .bind(meal.totals.fat)
    .bind(meal.totals.fiber)
    .execute(db)
    .await
    .context("insert meal_records")?;
    Ok(())
}

pub async fn list_between(
    db: &PgPool,
    user_id: Uuid,
    start: Date,
    end: Date,
) -> anyhow::Result<Vec<MealRecord>> {
    let rows = sqlx::query_as::<_, MealRecordRow>(
        r#"
        SELECT id, user_id, meal_date, logged_at, day_of_week, meal_type, items,
               total_calories, total_protein, total_carbs, total_fat, total_fiber
        FROM meal_records
        WHERE user_id = $1 AND meal_date BETWEEN $2 AND $3
        ORDER BY logged_at DESC
        "#,
    )
    .bind(user_id)
    .bind(start)
    .bind(end)
    .fetch_all(db)
    .await
    .context("select meal_records")?;
    Ok(rows.into_iter().map(MealRecord::from).collect())
}
