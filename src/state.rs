use std::sync::Arc;

use crate::ai::{AiClient, GeminiClient};
use crate::config::AppConfig;
use crate::db;
use crate::storage::{NutritionStore, PgStore};

/// Shared collaborators, built once at start-up and cloned into handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn NutritionStore>,
    pub ai: Arc<dyn AiClient>,
}

impl AppState {
    pub async fn init(config: AppConfig) -> anyhow::Result<Self> {
        let pool = db::connect(&config).await?;
        db::migrate(&pool).await;

        let store = Arc::new(PgStore::new(pool)) as Arc<dyn NutritionStore>;
        let ai = Arc::new(GeminiClient::new(&config.gemini)?) as Arc<dyn AiClient>;

        Ok(Self::from_parts(Arc::new(config), store, ai))
    }

    pub fn from_parts(
        config: Arc<AppConfig>,
        store: Arc<dyn NutritionStore>,
        ai: Arc<dyn AiClient>,
    ) -> Self {
        Self { config, store, ai }
    }
}
