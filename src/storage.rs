use async_trait::async_trait;
use sqlx::PgPool;
use time::Date;
use uuid::Uuid;

use crate::dashboard::{
    dto::{DailySummary, UserGoals},
    repo as summary_repo,
};
use crate::meals::{repo as meal_repo, repo_types::MealRecord};

/// Persistence seen by the services. Every failure surfaces as an error,
/// never as an empty result.
#[async_trait]
pub trait NutritionStore: Send + Sync {
    async fn insert_meal(&self, meal: &MealRecord) -> anyhow::Result<()>;
    /// Meals whose calendar date falls in `start..=end`.
    async fn meals_between(&self, user_id: Uuid, start: Date, end: Date) -> anyhow::Result<Vec<MealRecord>>;
    async fn summaries_between(
        &self,
        user_id: Uuid,
        start: Date,
        end: Date,
    ) -> anyhow::Result<Vec<DailySummary>>;
    /// Replaces any summary already stored for the same user and date.
    async fn upsert_summary(&self, summary: &DailySummary) -> anyhow::Result<()>;
    async fn goals(&self, user_id: Uuid) -> anyhow::Result<Option<UserGoals>>;
    async fn set_goals(&self, user_id: Uuid, goals: &UserGoals) -> anyhow::Result<()>;
}

#[derive(Clone)]
pub struct PgStore {
    db: PgPool,
}

impl PgStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl NutritionStore for PgStore {
    async fn insert_meal(&self, meal: &MealRecord) -> anyhow::Result<()> {
        meal_repo::insert(&self.db, meal).await
    }

    async fn meals_between(&self, user_id: Uuid, start: Date, end: Date) -> anyhow::Result<Vec<MealRecord>> {
        meal_repo::list_between(&self.db, user_id, start, end).await
    }

    async fn summaries_between(
        &self,
        user_id: Uuid,
        start: Date,
        end: Date,
    ) -> anyhow::Result<Vec<DailySummary>> {
        summary_repo::list_between(&self.db, user_id, start, end).await
    }

    async fn upsert_summary(&self, summary: &DailySummary) -> anyhow::Result<()> {
        summary_repo::upsert(&self.db, summary).await
    }

    async fn goals(&self, user_id: Uuid) -> anyhow::Result<Option<UserGoals>> {
        summary_repo::get_goals(&self.db, user_id).await
    }

    async fn set_goals(&self, user_id: Uuid, goals: &UserGoals) -> anyhow::Result<()> {
        summary_repo::put_goals(&self.db, user_id, goals).await
    }
}

#[cfg(test)]
pub mod memory {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    use super::*;

    /// In-process store for service tests; `failing()` makes every call error.
    #[derive(Default)]
    pub struct MemoryStore {
        meals: Mutex<Vec<MealRecord>>,
        summaries: Mutex<HashMap<(Uuid, Date), DailySummary>>,
        goals: Mutex<HashMap<Uuid, UserGoals>>,
        fail: AtomicBool,
        fail_summary_writes: AtomicBool,
    }

    impl MemoryStore {
        pub fn failing() -> Self {
            let store = Self::default();
            store.set_failing(true);
            store
        }

        pub fn set_failing(&self, fail: bool) {
            self.fail.store(fail, Ordering::SeqCst);
        }

        /// Only `upsert_summary` errors; reads and meal inserts still work.
        pub fn rejecting_summary_writes() -> Self {
            let store = Self::default();
            store.fail_summary_writes.store(true, Ordering::SeqCst);
            store
        }

        pub fn summary(&self, user_id: Uuid, date: Date) -> Option<DailySummary> {
            self.summaries.lock().unwrap().get(&(user_id, date)).cloned()
        }

        pub fn seed_summary(&self, summary: DailySummary) {
            self.summaries
                .lock()
                .unwrap()
                .insert((summary.user_id, summary.date), summary);
        }

        pub fn seed_meal(&self, meal: MealRecord) {
            self.meals.lock().unwrap().push(meal);
        }

        fn check(&self) -> anyhow::Result<()> {
            if self.fail.load(Ordering::SeqCst) {
                anyhow::bail!("storage offline");
            }
            Ok(())
        }
    }

    #[async_trait]
    impl NutritionStore for MemoryStore {
        async fn insert_meal(&self, meal: &MealRecord) -> anyhow::Result<()> {
            self.check()?;
            self.meals.lock().unwrap().push(meal.clone());
            Ok(())
        }

        async fn meals_between(&self, user_id: Uuid, start: Date, end: Date) -> anyhow::Result<Vec<MealRecord>> {
            self.check()?;
            Ok(self
                .meals
                .lock()
                .unwrap()
                .iter()
                .filter(|m| m.user_id == user_id && start <= m.date && m.date <= end)
                .cloned()
                .collect())
        }

        async fn summaries_between(
            &self,
            user_id: Uuid,
            start: Date,
            end: Date,
        ) -> anyhow::Result<Vec<DailySummary>> {
            self.check()?;
            let mut out: Vec<_> = self
                .summaries
                .lock()
                .unwrap()
                .values()
                .filter(|s| s.user_id == user_id && start <= s.date && s.date <= end)
                .cloned()
                .collect();
            out.sort_by_key(|s| s.date);
            Ok(out)
        }

        async fn upsert_summary(&self, summary: &DailySummary) -> anyhow::Result<()> {
            self.check()?;
            if self.fail_summary_writes.load(Ordering::SeqCst) {
                anyhow::bail!("summary table read-only");
            }
            self.seed_summary(summary.clone());
            Ok(())
        }

        async fn goals(&self, user_id: Uuid) -> anyhow::Result<Option<UserGoals>> {
            self.check()?;
            Ok(self.goals.lock().unwrap().get(&user_id).copied())
        }

        async fn set_goals(&self, user_id: Uuid, goals: &UserGoals) -> anyhow::Result<()> {
            self.check()?;
            self.goals.lock().unwrap().insert(user_id, *goals);
            Ok(())
        }
    }
}
