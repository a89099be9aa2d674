use tracing::{error, instrument, warn};

use super::dto::{AnalysisRecord, HealthySwap, MealInsights, UserProfile};
use crate::ai::{extract_json, prompts, AiClient, ImageInput};

const RECIPE_SECTIONS: [&str; 5] = [
    "### Ingredients",
    "### Instructions",
    "### Nutrition Info",
    "### Health Benefits",
    "### Regional Variations",
];

const RECIPE_FAILED: &str = "## Recipe Generation Failed\n### Ingredients\n- No ingredients available\n\
### Instructions\n1. Recipe generation failed\n### Nutrition Info\nNot available\n\
### Health Benefits\nNot available\n### Regional Variations\nNot available";

const MEAL_PLAN_FAILED: &str = "Meal plan generation failed. Please try again later.";

pub async fn analyze_text(
    ai: &dyn AiClient,
    description: &str,
    diet_preference: Option<&str>,
) -> AnalysisRecord {
    if description.trim().is_empty() {
        return AnalysisRecord::fallback("Empty text provided");
    }
    let prompt = prompts::analyze_text(description.trim(), diet_preference);
    run_analysis(ai, &prompt, None).await
}

pub async fn analyze_image(
    ai: &dyn AiClient,
    image: &ImageInput,
    diet_preference: Option<&str>,
) -> AnalysisRecord {
    if image.data.is_empty() {
        return AnalysisRecord::fallback("Empty image provided");
    }
    let prompt = prompts::analyze_image(diet_preference);
    run_analysis(ai, &prompt, Some(image)).await
}

#[instrument(skip_all, fields(with_image = image.is_some()))]
async fn run_analysis(
    ai: &dyn AiClient,
    prompt: &str,
    image: Option<&ImageInput>,
) -> AnalysisRecord {
    let raw = match ai.generate(prompt, image).await {
        Ok(raw) => raw,
        Err(e) => {
            error!(error = %e, "food analysis call failed");
            return AnalysisRecord::fallback(&format!("Analysis service error: {e}"));
        }
    };
    match extract_json(&raw) {
        Ok(parsed) => AnalysisRecord::from_parsed(&parsed),
        Err(e) => {
            warn!(error = %e, "food analysis reply was not a record");
            AnalysisRecord::fallback("JSON parsing failed")
        }
    }
}

/// At most three questions, each ending in `?`.
pub fn clarifying_questions(record: &AnalysisRecord) -> Vec<String> {
    if record.unclear_items.is_empty() {
        return vec!["Can you provide more details about the food items?".into()];
    }
    record
        .unclear_items
        .iter()
        .take(3)
        .map(|item| {
            if item.ends_with('?') {
                item.clone()
            } else {
                format!("{item}?")
            }
        })
        .collect()
}

/// Any failure returns `original` untouched.
#[instrument(skip_all, fields(questions = questions.len()))]
pub async fn refine_with_answers(
    ai: &dyn AiClient,
    original: &AnalysisRecord,
    questions: &[String],
    answers: &[String],
) -> AnalysisRecord {
    let qa: Vec<(String, String)> = questions
        .iter()
        .cloned()
        .zip(answers.iter().cloned())
        .collect();
    let original_json = match serde_json::to_string_pretty(original) {
        Ok(json) => json,
        Err(e) => {
            error!(error = %e, "serialize analysis for refinement");
            return original.clone();
        }
    };

    match ai.generate(&prompts::refine(&original_json, &qa), None).await {
        Ok(raw) => match extract_json(&raw) {
            Ok(parsed) => AnalysisRecord::from_parsed(&parsed),
            Err(e) => {
                warn!(error = %e, "refinement reply was not a record");
                original.clone()
            }
        },
        Err(e) => {
            error!(error = %e, "refinement call failed");
            original.clone()
        }
    }
}

#[instrument(skip_all)]
pub async fn meal_insights(ai: &dyn AiClient, record: &AnalysisRecord) -> MealInsights {
    let analysis_json = serde_json::to_string(record).unwrap_or_default();
    match ai.generate(&prompts::meal_insights(&analysis_json), None).await {
        Ok(raw) => match extract_json(&raw) {
            Ok(parsed) => MealInsights::from_parsed(&parsed),
            Err(e) => {
                warn!(error = %e, "insights reply was not a record");
                MealInsights::unavailable()
            }
        },
        Err(e) => {
            error!(error = %e, "insights call failed");
            MealInsights::service_error(&e.to_string())
        }
    }
}

#[instrument(skip_all)]
pub async fn healthy_swaps(ai: &dyn AiClient, record: &AnalysisRecord) -> Vec<HealthySwap> {
    let items_json = serde_json::to_string(&record.items).unwrap_or_else(|_| "[]".into());
    let raw = match ai.generate(&prompts::healthy_swaps(&items_json), None).await {
        Ok(raw) => raw,
        Err(e) => {
            error!(error = %e, "healthy swaps call failed");
            return vec![HealthySwap::generic()];
        }
    };
    let parsed = match extract_json(&raw) {
        Ok(parsed) => parsed,
        Err(e) => {
            warn!(error = %e, "swaps reply was not a record");
            return Vec::new();
        }
    };
    match parsed.get("swaps").and_then(|v| v.as_array()) {
        Some(swaps) => swaps.iter().filter_map(HealthySwap::from_value).collect(),
        None => {
            warn!("swaps reply has no swaps array");
            Vec::new()
        }
    }
}

/// Appends any missing section header with "Not available".
fn complete_recipe(text: &str) -> String {
    let mut out = text.trim().to_string();
    if !out.contains("## ") {
        out = format!("## Generated Recipe\n{out}");
    }
    for section in RECIPE_SECTIONS {
        if !out.contains(section) {
            out.push_str(&format!("\n{section}\nNot available"));
        }
    }
    out
}

#[instrument(skip_all)]
pub async fn generate_recipe(ai: &dyn AiClient, record: &AnalysisRecord) -> String {
    let analysis_json = serde_json::to_string(record).unwrap_or_default();
    match ai.generate(&prompts::recipe(&analysis_json), None).await {
        Ok(text) if !text.trim().is_empty() => complete_recipe(&text),
        Ok(_) => RECIPE_FAILED.to_string(),
        Err(e) => {
            error!(error = %e, "recipe call failed");
            RECIPE_FAILED.to_string()
        }
    }
}

#[instrument(skip_all)]
pub async fn generate_meal_plan(ai: &dyn AiClient, profile: &UserProfile) -> String {
    let profile_json = serde_json::to_string(profile).unwrap_or_default();
    match ai.generate(&prompts::meal_plan(&profile_json), None).await {
        Ok(text) if !text.trim().is_empty() => text,
        Ok(_) => MEAL_PLAN_FAILED.to_string(),
        Err(e) => {
            error!(error = %e, "meal plan call failed");
            MEAL_PLAN_FAILED.to_string()
        }
    }
}

#[cfg(test)]
mod analysis_tests {
    use super::*;
    use crate::ai::fake::ScriptedAi;
    use bytes::Bytes;

    const GOOD_REPLY: &str = r#"Here you go:
```json
{"items": [{"name": "Chicken biryani", "quantity": "1 plate", "calories": 480, "protein": 22, "carbs": 60, "fat": 16}],
 "confidence_overall": 82, "need_clarification": false, "unclear_items": []}
```"#;

    #[tokio::test]
    async fn text_analysis_parses_model_reply() {
        let ai = ScriptedAi::replying(GOOD_REPLY);
        let record = analyze_text(&ai, "1 plate chicken biryani", Some("non-vegetarian")).await;
        assert_eq!(record.items.len(), 1);
        assert_eq!(record.total_calories, 480.0);
        assert!(!record.need_clarification);
        assert!(ai.prompts.lock().unwrap()[0].contains("chicken biryani"));
    }

    #[tokio::test]
    async fn blank_text_skips_the_model() {
        let ai = ScriptedAi::replying(GOOD_REPLY);
        let record = analyze_text(&ai, "   ", None).await;
        assert!(record.need_clarification);
        assert!(record.unclear_items[0].contains("Empty text provided"));
        assert_eq!(ai.calls(), 0);
    }

    #[tokio::test]
    async fn prose_reply_degrades_to_fallback() {
        let ai = ScriptedAi::replying("Sorry, I can't tell what that is.");
        let record = analyze_text(&ai, "lunch", None).await;
        assert!(record.items.is_empty());
        assert!(record.unclear_items[0].contains("JSON parsing failed"));
    }

    #[tokio::test]
    async fn model_failure_degrades_to_fallback() {
        let ai = ScriptedAi::failing();
        let image = ImageInput {
            data: Bytes::from_static(b"\x89PNG"),
            mime_type: "image/png".into(),
        };
        let record = analyze_image(&ai, &image, None).await;
        assert!(record.need_clarification);
        assert!(record.unclear_items[0].contains("Analysis service error"));
    }

    #[tokio::test]
    async fn empty_image_skips_the_model() {
        let ai = ScriptedAi::replying(GOOD_REPLY);
        let image = ImageInput {
            data: Bytes::new(),
            mime_type: "image/jpeg".into(),
        };
        let record = analyze_image(&ai, &image, None).await;
        assert!(record.unclear_items[0].contains("Empty image provided"));
        assert_eq!(ai.calls(), 0);
    }

    #[test]
    fn questions_are_capped_and_punctuated() {
        let mut record = AnalysisRecord::fallback("x");
        record.unclear_items = vec![
            "How much rice".into(),
            "Was it fried?".into(),
            "Which curry".into(),
            "Any dessert".into(),
        ];
        assert_eq!(
            clarifying_questions(&record),
            vec!["How much rice?", "Was it fried?", "Which curry?"]
        );
        record.unclear_items.clear();
        assert_eq!(
            clarifying_questions(&record),
            vec!["Can you provide more details about the food items?"]
        );
    }

    #[tokio::test]
    async fn refinement_keeps_original_on_bad_reply() {
        let ai = ScriptedAi::new(vec![Some("no json here"), None]);
        let original = AnalysisRecord::fallback("vague");
        let q = vec!["How much rice?".to_string()];
        let a = vec!["One cup".to_string()];
        assert_eq!(refine_with_answers(&ai, &original, &q, &a).await, original);
        assert_eq!(refine_with_answers(&ai, &original, &q, &a).await, original);
        assert!(ai.prompts.lock().unwrap()[0].contains("A: One cup"));
    }

    #[tokio::test]
    async fn refinement_uses_updated_record() {
        let ai = ScriptedAi::replying(GOOD_REPLY);
        let original = AnalysisRecord::fallback("vague");
        let refined = refine_with_answers(&ai, &original, &[], &[]).await;
        assert_eq!(refined.total_protein, 22.0);
    }

    #[tokio::test]
    async fn insights_fallbacks_differ_by_failure() {
        let record = AnalysisRecord::fallback("x");
        let unavailable = meal_insights(&ScriptedAi::replying("nothing"), &record).await;
        assert_eq!(unavailable, MealInsights::unavailable());

        let errored = meal_insights(&ScriptedAi::failing(), &record).await;
        assert_eq!(errored.macro_balance.status, "error");
        assert_eq!(errored.concerns, vec!["Service temporarily unavailable".to_string()]);
    }

    #[tokio::test]
    async fn swaps_are_validated() {
        let record = AnalysisRecord::fallback("x");
        let ai = ScriptedAi::replying(
            r#"{"swaps": [{"original": "White rice", "swap": "Brown rice"}, 42]}"#,
        );
        let swaps = healthy_swaps(&ai, &record).await;
        assert_eq!(swaps.len(), 1);
        assert_eq!(swaps[0].swap, "Brown rice");
        assert_eq!(swaps[0].cultural_benefit, "Culturally appropriate");

        assert!(healthy_swaps(&ScriptedAi::replying(r#"{"ideas": []}"#), &record)
            .await
            .is_empty());
        assert_eq!(
            healthy_swaps(&ScriptedAi::failing(), &record).await,
            vec![HealthySwap::generic()]
        );
    }

    #[test]
    fn recipe_sections_are_completed() {
        let text = complete_recipe("Tasty dal\n### Ingredients\n- dal");
        assert!(text.starts_with("## Generated Recipe\nTasty dal"));
        for section in RECIPE_SECTIONS {
            assert!(text.contains(section), "missing {section}");
        }
        assert_eq!(text.matches("### Ingredients").count(), 1);
    }

    #[tokio::test]
    async fn recipe_failure_is_a_full_document() {
        let text = generate_recipe(&ScriptedAi::failing(), &AnalysisRecord::fallback("x")).await;
        assert!(text.starts_with("## Recipe Generation Failed"));
        for section in RECIPE_SECTIONS {
            assert!(text.contains(section));
        }
    }

    #[tokio::test]
    async fn meal_plan_passes_text_through() {
        let ai = ScriptedAi::replying("## Weekly Meal Plan\n### Day 1\n- Poha");
        let plan = generate_meal_plan(&ai, &UserProfile::default()).await;
        assert!(plan.contains("Poha"));
        let failed = generate_meal_plan(&ScriptedAi::failing(), &UserProfile::default()).await;
        assert_eq!(failed, MEAL_PLAN_FAILED);
    }
}
