use anyhow::Context;
use sqlx::{types::Json, PgPool};
use time::Date;
use uuid::Uuid;

use super::dto::{DailySummary, DailySummaryRow, UserGoals};

pub async fn upsert(db: &PgPool, s: &DailySummary) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO daily_summaries (
            user_id, summary_date, total_calories, total_protein, total_carbs,
            total_fat, total_fiber, meals_count, goal_calories_achieved,
            goal_protein_achieved, updated_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, now())
        ON CONFLICT (user_id, summary_date) DO UPDATE SET
            total_calories = EXCLUDED.total_calories,
            total_protein = EXCLUDED.total_protein,
            total_carbs = EXCLUDED.total_carbs,
            total_fat = EXCLUDED.total_fat,
            total_fiber = EXCLUDED.total_fiber,
            meals_count = EXCLUDED.meals_count,
            goal_calories_achieved = EXCLUDED.goal_calories_achieved,
            goal_protein_achieved = EXCLUDED.goal_protein_achieved,
            updated_at = now()
        "#,
    )
    .bind(s.user_id)
    .bind(s.date)
    .bind(s.total_calories)
    .bind(s.total_protein)
    .bind(s.total_carbs)
    .bind(s.total_fat)
    .bind(s.total_fiber)
    .bind(i32::try_from(s.meals_count).unwrap_or(i32::MAX))
    .bind(s.goal_calories_achieved)
    .bind(s.goal_protein_achieved)
    .execute(db)
    .await
    .context("upsert daily_summaries")?;
    Ok(())
}

pub async fn list_between(
    db: &PgPool,
    user_id: Uuid,
    start: Date,
    end: Date,
) -> anyhow::Result<Vec<DailySummary>> {
    let rows = sqlx::query_as::<_, DailySummaryRow>(
        r#"
        SELECT user_id, summary_date, total_calories, total_protein, total_carbs,
               total_fat, total_fiber, meals_count, goal_calories_achieved,
               goal_protein_achieved
        FROM daily_summaries
        WHERE user_id = $1 AND summary_date BETWEEN $2 AND $3
        ORDER BY summary_date
        "#,
    )
    .bind(user_id)
    .bind(start)
    .bind(end)
    .fetch_all(db)
    .await
    .context("select daily_summaries")?;
    Ok(rows.into_iter().map(DailySummary::from).collect())
}

pub async fn get_goals(db: &PgPool, user_id: Uuid) -> anyhow::Result<Option<UserGoals>> {
    let row: Option<(Json<UserGoals>,)> =
        sqlx::query_as("SELECT goals FROM user_goals WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(db)
            .await
            .context("select user_goals")?;
    Ok(row.map(|(Json(goals),)| goals))
}

pub async fn put_goals(db: &PgPool, user_id: Uuid, goals: &UserGoals) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO user_goals (user_id, goals, updated_at)
        VALUES ($1, $2, now())
        ON CONFLICT (user_id) DO UPDATE SET goals = EXCLUDED.goals, updated_at = now()
        "#,
    )
    .bind(user_id)
    .bind(Json(goals))
    .execute(db)
    .await
    .context("upsert user_goals")?;
    Ok(())
}
