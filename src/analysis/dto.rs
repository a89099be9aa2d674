use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::ai::ParsedRecord;
use crate::dashboard::dto::DailySummary;

// --- field coercion for model-produced objects ---

fn number(value: Option<&Value>) -> f64 {
    let n = match value {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) => s.trim().parse::<f64>().unwrap_or(0.0),
        _ => 0.0,
    };
    if n.is_finite() && n > 0.0 {
        n
    } else {
        0.0
    }
}

fn confidence(value: Option<&Value>) -> f64 {
    number(value).min(100.0)
}

fn text(value: Option<&Value>, default: &str) -> String {
    match value {
        Some(Value::String(s)) if !s.trim().is_empty() => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        _ => default.to_string(),
    }
}

fn flag(value: Option<&Value>) -> bool {
    match value {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => s.eq_ignore_ascii_case("true"),
        _ => false,
    }
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|v| match v {
                Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}

/// One recognised food with its macros.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NutritionItem {
    pub name: String,
    #[serde(default)]
    pub quantity: String,
    #[serde(default)]
    pub calories: f64,
    #[serde(default)]
    pub protein: f64,
    #[serde(default)]
    pub carbs: f64,
    #[serde(default)]
    pub fat: f64,
    #[serde(default)]
    pub fiber: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
}

impl NutritionItem {
    /// Non-object entries yield `None`; every missing field is defaulted.
    pub fn from_value(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;
        Some(Self {
            name: text(obj.get("name"), "Unknown food"),
            quantity: text(obj.get("quantity"), ""),
            calories: number(obj.get("calories")),
            protein: number(obj.get("protein")),
            carbs: number(obj.get("carbs")),
            fat: number(obj.get("fat")),
            fiber: number(obj.get("fiber")),
            confidence: obj.get("confidence").map(|v| confidence(Some(v))),
        })
    }
}

/// Typed view of a food-analysis reply.
///
/// Deserialization always goes through [`AnalysisRecord::from_parsed`], so
/// records posted by clients get the same coercion as model replies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "ParsedRecord")]
pub struct AnalysisRecord {
    pub items: Vec<NutritionItem>,
    pub total_calories: f64,
    pub total_protein: f64,
    pub total_carbs: f64,
    pub total_fat: f64,
    pub total_fiber: f64,
    pub confidence_overall: f64,
    pub need_clarification: bool,
    pub unclear_items: Vec<String>,
}

impl From<ParsedRecord> for AnalysisRecord {
    fn from(parsed: ParsedRecord) -> Self {
        Self::from_parsed(&parsed)
    }
}

impl AnalysisRecord {
    pub fn from_parsed(parsed: &ParsedRecord) -> Self {
        let items: Vec<NutritionItem> = match parsed.get("items") {
            Some(Value::Array(values)) => values.iter().filter_map(NutritionItem::from_value).collect(),
            _ => Vec::new(),
        };

        let mut record = Self {
            items,
            total_calories: number(parsed.get("total_calories")),
            total_protein: number(parsed.get("total_protein")),
            total_carbs: number(parsed.get("total_carbs")),
            total_fat: number(parsed.get("total_fat")),
            total_fiber: number(parsed.get("total_fiber")),
            confidence_overall: confidence(parsed.get("confidence_overall")),
            need_clarification: flag(parsed.get("need_clarification")),
            unclear_items: string_list(parsed.get("unclear_items")),
        };
        if !record.items.is_empty() {
            record.recompute_totals();
        }
        record
    }

    /// Substitute used whenever the model reply is unusable.
    pub fn fallback(reason: &str) -> Self {
        Self {
            items: Vec::new(),
            total_calories: 0.0,
            total_protein: 0.0,
            total_carbs: 0.0,
            total_fat: 0.0,
            total_fiber: 0.0,
            confidence_overall: 0.0,
            need_clarification: true,
            unclear_items: vec![format!("Analysis failed: {reason}. Please try again.")],
        }
    }

    /// Totals become the exact sum of the items.
    pub fn recompute_totals(&mut self) {
        self.total_calories = self.items.iter().map(|i| i.calories).sum();
        self.total_protein = self.items.iter().map(|i| i.protein).sum();
        self.total_carbs = self.items.iter().map(|i| i.carbs).sum();
        self.total_fat = self.items.iter().map(|i| i.fat).sum();
        self.total_fiber = self.items.iter().map(|i| i.fiber).sum();
    }

    pub fn has_items(&self) -> bool {
        !self.items.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MacroBalance {
    pub status: String,
    pub details: String,
    pub recommendations: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Micronutrients {
    pub highlights: Vec<String>,
    pub deficiencies: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MealInsights {
    pub macro_balance: MacroBalance,
    pub micronutrients: Micronutrients,
    pub health_benefits: Vec<String>,
    pub concerns: Vec<String>,
    pub recommendations: Vec<String>,
}

impl MealInsights {
    pub fn from_parsed(parsed: &ParsedRecord) -> Self {
        let macro_balance = match parsed.get("macro_balance").and_then(Value::as_object) {
            Some(mb) => MacroBalance {
                status: text(mb.get("status"), "unknown"),
                details: text(mb.get("details"), "Analysis completed"),
                recommendations: string_list(mb.get("recommendations")),
            },
            None => MacroBalance {
                status: "unknown".into(),
                details: "Analysis failed".into(),
                recommendations: Vec::new(),
            },
        };
        let micronutrients = parsed
            .get("micronutrients")
            .and_then(Value::as_object)
            .map(|m| Micronutrients {
                highlights: string_list(m.get("highlights")),
                deficiencies: string_list(m.get("deficiencies")),
            })
            .unwrap_or_default();
        let recommendations = match parsed.get("recommendations") {
            Some(v) => string_list(Some(v)),
            None => vec!["Unable to analyze nutrition data".into()],
        };

        Self {
            macro_balance,
            micronutrients,
            health_benefits: string_list(parsed.get("health_benefits")),
            concerns: string_list(parsed.get("concerns")),
            recommendations,
        }
    }

    pub fn unavailable() -> Self {
        Self {
            macro_balance: MacroBalance {
                status: "unknown".into(),
                details: "Analysis failed".into(),
                recommendations: Vec::new(),
            },
            micronutrients: Micronutrients::default(),
            health_benefits: Vec::new(),
            concerns: Vec::new(),
            recommendations: vec!["Unable to analyze nutrition data".into()],
        }
    }

    pub fn service_error(detail: &str) -> Self {
        Self {
            macro_balance: MacroBalance {
                status: "error".into(),
                details: format!("Analysis failed: {detail}"),
                recommendations: Vec::new(),
            },
            micronutrients: Micronutrients::default(),
            health_benefits: Vec::new(),
            concerns: vec!["Service temporarily unavailable".into()],
            recommendations: vec!["Please try again later".into()],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthySwap {
    pub original: String,
    pub swap: String,
    pub reason: String,
    pub cultural_benefit: String,
}

impl HealthySwap {
    pub fn from_value(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;
        Some(Self {
            original: text(obj.get("original"), "Unknown food"),
            swap: text(obj.get("swap"), "Healthier alternative"),
            reason: text(obj.get("reason"), "Better nutritional profile"),
            cultural_benefit: text(
                obj.get("cultural_benefit").or_else(|| obj.get("indian_benefit")),
                "Culturally appropriate",
            ),
        })
    }

    pub fn generic() -> Self {
        Self {
            original: "Current choice".into(),
            swap: "Healthier alternative".into(),
            reason: "Better nutrition profile".into(),
            cultural_benefit: "Follows traditional nutrition principles".into(),
        }
    }
}

/// Free-form profile used to personalise prompts.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserProfile {
    #[serde(default)]
    pub diet_preference: Option<String>,
    #[serde(default)]
    pub goal: Option<String>,
    #[serde(default)]
    pub activity: Option<String>,
    #[serde(default)]
    pub allergies: Vec<String>,
}

// --- requests / responses ---

#[derive(Debug, Deserialize)]
pub struct AnalyzeTextRequest {
    pub text: String,
    #[serde(default)]
    pub diet_preference: Option<String>,
    #[serde(default)]
    pub log: bool,
    /// Used when `log` is set; its offset decides the meal type.
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub logged_at: Option<time::OffsetDateTime>,
}

#[derive(Debug, Deserialize)]
pub struct RefineRequest {
    pub analysis: AnalysisRecord,
    pub questions: Vec<String>,
    pub answers: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct AnalysisBody {
    pub analysis: AnalysisRecord,
}

#[derive(Debug, Serialize)]
pub struct AnalysisResponse {
    pub analysis: AnalysisRecord,
    pub questions: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meal_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub daily_summary: Option<DailySummary>,
}

#[derive(Debug, Serialize)]
pub struct SwapsResponse {
    pub swaps: Vec<HealthySwap>,
}

#[derive(Debug, Serialize)]
pub struct MarkdownResponse {
    pub markdown: String,
}

#[cfg(test)]
mod dto_tests {
    use super::*;
    use crate::ai::extract_json;
    use serde_json::json;

    fn parsed(value: Value) -> ParsedRecord {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn totals_are_recomputed_from_items() {
        let record = AnalysisRecord::from_parsed(&parsed(json!({
            "items": [
                {"name": "Dosa", "quantity": "1", "calories": 170, "protein": 4, "carbs": 30, "fat": 4},
                {"name": "Sambar", "quantity": "1 cup", "calories": "130", "protein": 6.5, "carbs": 18, "fat": 3, "fiber": 5}
            ],
            "total_calories": 9999,
            "confidence_overall": 80
        })));
        assert_eq!(record.items.len(), 2);
        assert_eq!(record.total_calories, 300.0);
        assert_eq!(record.total_protein, 10.5);
        assert_eq!(record.total_fiber, 5.0);
        assert_eq!(record.confidence_overall, 80.0);
        assert!(!record.need_clarification);
    }

    #[test]
    fn missing_fields_take_defaults() {
        let record = AnalysisRecord::from_parsed(&parsed(json!({
            "items": [{"calories": -50}, "not an object", {"name": "Tea", "confidence": 250}]
        })));
        assert_eq!(record.items.len(), 2);
        assert_eq!(record.items[0].name, "Unknown food");
        assert_eq!(record.items[0].calories, 0.0);
        assert_eq!(record.items[0].confidence, None);
        assert_eq!(record.items[1].confidence, Some(100.0));
        assert!(record.unclear_items.is_empty());
    }

    #[test]
    fn stated_totals_kept_when_no_items() {
        let record = AnalysisRecord::from_parsed(&parsed(json!({
            "total_calories": 420,
            "need_clarification": true,
            "unclear_items": ["How much rice", 3, ""]
        })));
        assert_eq!(record.total_calories, 420.0);
        assert!(record.need_clarification);
        assert_eq!(record.unclear_items, vec!["How much rice".to_string()]);
    }

    #[test]
    fn fallback_asks_for_clarification() {
        let record = AnalysisRecord::fallback("JSON parsing failed");
        assert!(record.items.is_empty());
        assert!(record.need_clarification);
        assert_eq!(
            record.unclear_items,
            vec!["Analysis failed: JSON parsing failed. Please try again.".to_string()]
        );
    }

    #[test]
    fn insights_fill_missing_sections() {
        let insights = MealInsights::from_parsed(&parsed(json!({
            "macro_balance": {"status": "good"},
            "health_benefits": ["High fiber"]
        })));
        assert_eq!(insights.macro_balance.status, "good");
        assert_eq!(insights.macro_balance.details, "Analysis completed");
        assert_eq!(insights.health_benefits, vec!["High fiber".to_string()]);
        assert_eq!(
            insights.recommendations,
            vec!["Unable to analyze nutrition data".to_string()]
        );
    }

    #[test]
    fn insights_with_non_object_macro_balance() {
        let insights = MealInsights::from_parsed(&parsed(json!({"macro_balance": "fine"})));
        assert_eq!(insights.macro_balance.status, "unknown");
        assert_eq!(insights.macro_balance.details, "Analysis failed");
    }

    #[test]
    fn swap_accepts_legacy_benefit_key() {
        let swap = HealthySwap::from_value(&json!({
            "original": "White rice",
            "swap": "Brown rice",
            "indian_benefit": "Traditional in the south"
        }))
        .unwrap();
        assert_eq!(swap.cultural_benefit, "Traditional in the south");
        assert_eq!(swap.reason, "Better nutritional profile");
        assert!(HealthySwap::from_value(&json!("nope")).is_none());
    }

    #[test]
    fn client_records_are_coerced_on_deserialize() {
        let record: AnalysisRecord = serde_json::from_value(json!({
            "items": [{"name": "Ghee", "calories": -500, "protein": -10, "fat": 10}],
            "total_calories": -500,
            "total_protein": -10,
            "confidence_overall": 400
        }))
        .unwrap();
        assert_eq!(record.items[0].calories, 0.0);
        assert_eq!(record.total_calories, 0.0);
        assert_eq!(record.total_protein, 0.0);
        assert_eq!(record.total_fat, 10.0);
        assert_eq!(record.confidence_overall, 100.0);

        let body: AnalysisBody = serde_json::from_value(json!({
            "analysis": {"items": [{"name": "Rice", "calories": 200}], "total_calories": 9000}
        }))
        .unwrap();
        assert_eq!(body.analysis.total_calories, 200.0);
    }

    #[test]
    fn serialized_record_reads_back_unchanged() {
        let record = AnalysisRecord::from_parsed(&parsed(json!({
            "items": [{"name": "Idli", "quantity": "2", "calories": 120, "protein": 4, "confidence": 90}],
            "confidence_overall": 85,
            "need_clarification": true,
            "unclear_items": ["Chutney amount"]
        })));
        let back: AnalysisRecord = serde_json::from_value(serde_json::to_value(&record).unwrap()).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn record_from_fenced_model_output() {
        let raw = "```json\n{\"items\": [{\"name\": \"Paratha\", \"calories\": 260, \"protein\": 5}]}\n```";
        let record = AnalysisRecord::from_parsed(&extract_json(raw).unwrap());
        assert_eq!(record.items[0].name, "Paratha");
        assert_eq!(record.total_calories, 260.0);
    }
}
