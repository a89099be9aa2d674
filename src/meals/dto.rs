use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use super::repo_types::MealRecord;
use crate::analysis::dto::AnalysisRecord;
use crate::dashboard::dto::DailySummary;

#[derive(Debug, Deserialize)]
pub struct LogMealRequest {
    pub analysis: AnalysisRecord,
    /// Defaults to now (UTC). The offset decides the meal's calendar date.
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub logged_at: Option<OffsetDateTime>,
}

#[derive(Debug, Serialize)]
pub struct LogMealResponse {
    pub meal: MealRecord,
    /// Absent when the meal was stored but its day could not be refreshed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub daily_summary: Option<DailySummary>,
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    #[serde(default = "default_days")]
    pub days: u16,
}
fn default_days() -> u16 { 30 }

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub days: u16,
    pub count: usize,
    pub meals: Vec<MealRecord>,
}

#[cfg(test)]
mod dto_tests {
    use super::*;
    use serde_json::json;
    use time::macros::datetime;

    #[test]
    fn logged_at_is_optional_rfc3339() {
        let analysis = serde_json::to_value(AnalysisRecord::fallback("x")).unwrap();
        let req: LogMealRequest = serde_json::from_value(json!({ "analysis": analysis.clone() })).unwrap();
        assert!(req.logged_at.is_none());

        let req: LogMealRequest = serde_json::from_value(json!({
            "analysis": analysis,
            "logged_at": "2025-01-10T08:15:00+05:30"
        }))
        .unwrap();
        assert_eq!(req.logged_at, Some(datetime!(2025-01-10 08:15 +05:30)));
    }

    #[test]
    fn history_defaults_to_thirty_days() {
        let q: HistoryQuery = serde_json::from_value(json!({})).unwrap();
        assert_eq!(q.days, 30);
    }
}
